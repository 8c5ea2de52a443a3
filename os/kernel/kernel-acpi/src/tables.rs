//! # Root table locator
//!
//! Walks the RSDT/XSDT named by the RSDP and records every table it lists in
//! a fixed number of slots, so firmware tables can be consumed during early
//! boot before any allocator or AML interpreter exists. Tables are only
//! validated (length and checksum) when they are looked up.

use crate::rsdp::AcpiRoots;
use crate::sdt::{SDT_HEADER_SIZE, SdtHeader, Signature};
use crate::{PhysMapRo, TableError, sum};
use log::{trace, warn};

/// Number of table slots in [`RootTables`].
///
/// Enough for the tables of typical platforms; anything beyond is skipped.
pub const ROOT_TABLE_CAPACITY: usize = 16;

/// A validated firmware table: its physical address, its header and the
/// mapped bytes covering exactly the declared table length.
///
/// The memory is owned by the firmware and never released.
#[derive(Copy, Clone)]
pub struct TableHandle {
    phys_addr: u64,
    header: SdtHeader,
    bytes: &'static [u8],
}

impl TableHandle {
    #[must_use]
    pub const fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    /// Declared table length in bytes (at least [`SDT_HEADER_SIZE`]).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The whole table, header included.
    #[must_use]
    pub const fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    #[must_use]
    pub const fn header(&self) -> SdtHeader {
        self.header
    }

    #[must_use]
    pub fn signature(&self) -> Signature {
        self.header().signature()
    }
}

impl PartialEq for TableHandle {
    fn eq(&self, other: &Self) -> bool {
        self.phys_addr == other.phys_addr && self.bytes.len() == other.bytes.len()
    }
}

impl Eq for TableHandle {}

impl core::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableHandle")
            .field("signature", &self.signature())
            .field("phys_addr", &format_args!("{:#x}", self.phys_addr))
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One slot of the locator: what the root table said, before validation.
#[derive(Copy, Clone)]
struct RootEntry {
    signature: Signature,
    phys_addr: u64,
    declared_len: usize,
    bytes: &'static [u8],
}

/// The firmware's table list as seen through the RSDT/XSDT.
pub struct RootTables {
    roots: AcpiRoots,
    entries: [Option<RootEntry>; ROOT_TABLE_CAPACITY],
    count: usize,
    skipped: usize,
}

impl RootTables {
    /// Parse the RSDP, validate the root table it names and record the
    /// tables it lists.
    ///
    /// # Errors
    /// Any failure here leaves the kernel without firmware tables and is
    /// reported as a [`TableError`]: a bad RSDP, or a root table with the
    /// wrong signature, a short length or a bad checksum.
    ///
    /// # Safety
    /// `map` must map firmware memory for the lifetime of the kernel, since
    /// the recorded slices are `'static`.
    pub unsafe fn acquire(map: &impl PhysMapRo, rsdp_addr: u64) -> Result<Self, TableError> {
        let roots = unsafe { AcpiRoots::parse(map, rsdp_addr)? };
        let (kind, root_addr) = roots.root_table().ok_or(TableError::NoRootTable)?;

        let bad_root = TableError::BadRootTable {
            signature: kind.signature(),
            addr: root_addr,
        };
        let (header, root) = unsafe { map_table(map, root_addr) }.ok_or(bad_root)?;
        if header.signature() != kind.signature()
            || header.length() < SDT_HEADER_SIZE
            || sum(root) != 0
        {
            return Err(bad_root);
        }

        let mut tables = Self {
            roots,
            entries: [None; ROOT_TABLE_CAPACITY],
            count: 0,
            skipped: 0,
        };

        for raw in root[SDT_HEADER_SIZE..].chunks_exact(kind.entry_size()) {
            let mut wide = [0u8; 8];
            wide[..raw.len()].copy_from_slice(raw);
            let phys_addr = u64::from_le_bytes(wide);
            if phys_addr == 0 {
                continue;
            }

            let Some((header, bytes)) = (unsafe { map_table(map, phys_addr) }) else {
                warn!("acpi: unreadable table header at {phys_addr:#x}");
                continue;
            };
            let entry = RootEntry {
                signature: header.signature(),
                phys_addr,
                declared_len: header.length(),
                bytes,
            };
            tables.record(entry);
        }

        Ok(tables)
    }

    fn record(&mut self, entry: RootEntry) {
        if self.count == ROOT_TABLE_CAPACITY {
            warn!(
                "acpi: no slot for table {} at {:#x}",
                entry.signature, entry.phys_addr
            );
            self.skipped += 1;
            return;
        }
        trace!(
            "acpi: table {} at {:#x}, {} bytes",
            entry.signature, entry.phys_addr, entry.declared_len
        );
        self.entries[self.count] = Some(entry);
        self.count += 1;
    }

    /// Look up the `instance`-th table carrying `signature`.
    ///
    /// `Ok(None)` means the firmware simply does not provide the table.
    ///
    /// # Errors
    /// A table that is listed but shorter than its header or fails its
    /// checksum is an error.
    pub fn find(
        &self,
        signature: Signature,
        instance: usize,
    ) -> Result<Option<TableHandle>, TableError> {
        let Some(entry) = self
            .recorded()
            .filter(|e| e.signature == signature)
            .nth(instance)
        else {
            return Ok(None);
        };

        let too_short = TableError::TooShort {
            signature,
            length: entry.declared_len,
            required: SDT_HEADER_SIZE,
        };
        if entry.declared_len < SDT_HEADER_SIZE {
            return Err(too_short);
        }
        let header = SdtHeader::read(entry.bytes).ok_or(too_short)?;
        if sum(entry.bytes) != 0 {
            return Err(TableError::BadChecksum(signature));
        }

        Ok(Some(TableHandle {
            phys_addr: entry.phys_addr,
            header,
            bytes: entry.bytes,
        }))
    }

    /// The RSDP the tables were found through.
    #[must_use]
    pub const fn roots(&self) -> &AcpiRoots {
        &self.roots
    }

    /// Number of recorded tables.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Tables the root table listed but that did not fit.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Signatures and addresses of all recorded tables, in firmware order.
    pub fn iter(&self) -> impl Iterator<Item = (Signature, u64)> + '_ {
        self.recorded().map(|e| (e.signature, e.phys_addr))
    }

    fn recorded(&self) -> impl Iterator<Item = &RootEntry> + '_ {
        self.entries[..self.count].iter().flatten()
    }
}

/// Map a table header, then the table by its declared length.
///
/// Tables that declare less than a header are mapped as a bare header so the
/// length can still be reported.
unsafe fn map_table(map: &impl PhysMapRo, phys_addr: u64) -> Option<(SdtHeader, &'static [u8])> {
    let head = unsafe { map.map_ro(phys_addr, SDT_HEADER_SIZE) };
    let header = SdtHeader::read(head)?;
    let bytes = if header.length() < SDT_HEADER_SIZE {
        head
    } else {
        unsafe { map.map_ro(phys_addr, header.length()) }
    };
    Some((header, bytes))
}
