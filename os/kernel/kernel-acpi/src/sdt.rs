//! # System Description Table header
//!
//! Every ACPI table except the RSDP starts with the same 36-byte header. The
//! `length` field covers the header and the table body, and all bytes in that
//! range sum to zero modulo 256.

use core::fmt;
use core::ptr::read_unaligned;

/// Size of [`SdtHeader`] in bytes.
pub const SDT_HEADER_SIZE: usize = size_of::<SdtHeader>();

/// Four-character table signature, e.g. `APIC` for the MADT.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature([u8; 4]);

impl Signature {
    /// Multiple APIC Description Table.
    pub const MADT: Self = Self(*b"APIC");
    /// Root System Description Table (32-bit entries).
    pub const RSDT: Self = Self(*b"RSDT");
    /// Extended System Description Table (64-bit entries).
    pub const XSDT: Self = Self(*b"XSDT");
    /// Fixed ACPI Description Table.
    pub const FADT: Self = Self(*b"FACP");
    /// PCI Express memory mapped configuration table.
    pub const MCFG: Self = Self(*b"MCFG");

    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '?'
            };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(\"{self}\")")
    }
}

/// Common header of all System Description Tables.
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct SdtHeader {
    pub signature: [u8; 4],
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: u32,
    pub creator_revision: u32,
}

const _: () = assert!(SDT_HEADER_SIZE == 36);

impl SdtHeader {
    /// Copy the header out of the first [`SDT_HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if fewer bytes are available.
    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SDT_HEADER_SIZE {
            return None;
        }
        // SAFETY: length checked above; the struct is packed, so any address works.
        Some(unsafe { read_unaligned(bytes.as_ptr().cast::<Self>()) })
    }

    #[must_use]
    pub const fn signature(&self) -> Signature {
        Signature(self.signature)
    }

    /// Declared table length, header included.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length as usize
    }
}

impl fmt::Debug for SdtHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self.length;
        let revision = self.revision;
        f.debug_struct("SdtHeader")
            .field("signature", &self.signature())
            .field("length", &length)
            .field("revision", &revision)
            .finish_non_exhaustive()
    }
}
