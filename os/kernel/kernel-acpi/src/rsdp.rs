//! # RSDP/XSDP (Root/Extended System Description Pointer)

use crate::sdt::Signature;
use crate::{PhysMapRo, TableError, sum};
use core::ptr::read_unaligned;

/// The eight signature bytes every RSDP starts with.
pub const RSDP_SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Which root table the firmware handed us.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RootTableKind {
    /// ACPI 1.0 root table with 32-bit entries.
    Rsdt,
    /// ACPI 2.0+ root table with 64-bit entries.
    Xsdt,
}

impl RootTableKind {
    /// Size of one physical address entry in the root table body.
    #[must_use]
    pub const fn entry_size(self) -> usize {
        match self {
            Self::Rsdt => 4,
            Self::Xsdt => 8,
        }
    }

    /// Signature the root table header must carry.
    #[must_use]
    pub const fn signature(self) -> Signature {
        match self {
            Self::Rsdt => Signature::RSDT,
            Self::Xsdt => Signature::XSDT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcpiRoots {
    pub rsdp_addr: u64,
    pub revision: u8,
    pub oem_id: [u8; 6],
    pub xsdt_addr: Option<u64>,
    pub rsdt_addr: Option<u64>,
}

/// ACPI 1.0 Root System Description Pointer (RSDP)
#[derive(Clone, Copy)]
#[repr(C, packed)]
struct Rsdp {
    signature: [u8; 8], // "RSD PTR "
    checksum: u8,       // sum of first 20 bytes == 0
    oem_id: [u8; 6],
    revision: u8, // 0 for ACPI 1.0
    rsdt_addr: u32,
}

/// ACPI 2.0 Extended System Description Pointer (XSDP)
#[derive(Clone, Copy)]
#[repr(C, packed)]
struct Xsdp {
    v1: Rsdp,
    length: u32,
    xsdt_addr: u64,
    ext_checksum: u8, // checksum of entire table
    reserved: [u8; 3],
}

const _: () = assert!(size_of::<Rsdp>() == 20);
const _: () = assert!(size_of::<Xsdp>() == 36);

impl AcpiRoots {
    /// Validate the RSDP/XSDP at the given physical address.
    ///
    /// The ACPI 1.0 checksum covers the first 20 bytes; revisions 2 and up
    /// additionally carry an extended checksum over `length` bytes.
    ///
    /// # Errors
    /// Returns a [`TableError`] if the address is null, the signature does not
    /// match, a checksum fails, or neither root table address is populated.
    ///
    /// # Safety
    /// `rsdp_addr` must be the address the firmware reported, and `map` must
    /// be able to map it.
    #[allow(clippy::similar_names)]
    pub unsafe fn parse(map: &impl PhysMapRo, rsdp_addr: u64) -> Result<Self, TableError> {
        if rsdp_addr == 0 {
            return Err(TableError::NullRsdp);
        }

        let v1 = unsafe { map.map_ro(rsdp_addr, size_of::<Rsdp>()) };
        if &v1[0..8] != RSDP_SIGNATURE {
            return Err(TableError::BadRsdpSignature(rsdp_addr));
        }
        if sum(&v1[0..20]) != 0 {
            return Err(TableError::BadRsdpChecksum(rsdp_addr));
        }

        let v1p = unsafe { read_unaligned(v1.as_ptr().cast::<Rsdp>()) };
        let rsdt_addr = Some(u64::from(v1p.rsdt_addr)).filter(|&a| a != 0);

        let mut xsdt_addr = None;
        if v1p.revision >= 2 {
            // Need full v2 to read length + xsdt
            let v2 = unsafe { map.map_ro(rsdp_addr, size_of::<Xsdp>()) };
            let v2p = unsafe { read_unaligned(v2.as_ptr().cast::<Xsdp>()) };
            let len = (v2p.length as usize).max(size_of::<Xsdp>());
            let full = unsafe { map.map_ro(rsdp_addr, len) };
            if sum(full) != 0 {
                return Err(TableError::BadRsdpChecksum(rsdp_addr));
            }
            xsdt_addr = Some(v2p.xsdt_addr).filter(|&a| a != 0);
        }

        if xsdt_addr.is_none() && rsdt_addr.is_none() {
            return Err(TableError::NoRootTable);
        }

        Ok(Self {
            rsdp_addr,
            revision: v1p.revision,
            oem_id: v1p.oem_id,
            xsdt_addr,
            rsdt_addr,
        })
    }

    /// The root table to walk: the XSDT when present, otherwise the RSDT.
    #[must_use]
    pub fn root_table(&self) -> Option<(RootTableKind, u64)> {
        self.xsdt_addr
            .map(|addr| (RootTableKind::Xsdt, addr))
            .or_else(|| self.rsdt_addr.map(|addr| (RootTableKind::Rsdt, addr)))
    }
}
