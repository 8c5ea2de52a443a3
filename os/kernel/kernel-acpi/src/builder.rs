//! # Firmware table builder
//!
//! Synthesizes byte-exact ACPI tables and a small physical memory image
//! (RSDP → RSDT/XSDT → tables) that implements [`PhysMapRo`]. Used by the
//! tests of this workspace and handy for feeding emulated firmware.
//!
//! ```rust,ignore
//! use kernel_acpi::builder::{FirmwareImage, MadtBuilder};
//! use kernel_acpi::{RootTables, Signature};
//!
//! let image = FirmwareImage::builder()
//!     .table(MadtBuilder::new().local_apic(0, 0, true).build())
//!     .build();
//! let tables = unsafe { RootTables::acquire(&image, image.rsdp_addr()) }.unwrap();
//! assert!(tables.find(Signature::MADT, 0).unwrap().is_some());
//! ```

use crate::madt::kind;
use crate::rsdp::RSDP_SIGNATURE;
use crate::sdt::{SDT_HEADER_SIZE, Signature};
use crate::{PhysMapRo, sum};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// Physical address the image is placed at (the legacy BIOS area).
pub const IMAGE_BASE: u64 = 0x000E_0000;

/// Offset of the root table inside the image.
const ROOT_OFFSET: usize = 0x40;

/// Offset of the checksum byte in the SDT header.
const SDT_CHECKSUM_OFFSET: usize = 9;

/// Zero bytes appended to the image so short tables can still be mapped as a header.
const TAIL_PADDING: usize = 64;

fn set_checksum(bytes: &mut [u8], at: usize) {
    bytes[at] = 0;
    bytes[at] = 0u8.wrapping_sub(sum(bytes));
}

#[allow(clippy::cast_possible_truncation)]
const fn len_u32(len: usize) -> u32 {
    len as u32
}

#[allow(clippy::cast_possible_truncation)]
const fn addr_u32(addr: u64) -> u32 {
    addr as u32
}

const fn image_addr(offset: usize) -> u64 {
    IMAGE_BASE + offset as u64
}

/// Build a table from a signature and a body; the header's length and
/// checksum are filled in.
#[must_use]
pub fn sdt(signature: Signature, body: &[u8]) -> Vec<u8> {
    let length = SDT_HEADER_SIZE + body.len();
    let mut table = Vec::with_capacity(length);
    table.extend_from_slice(signature.as_bytes());
    table.extend_from_slice(&len_u32(length).to_le_bytes());
    table.push(1); // revision
    table.push(0); // checksum
    table.extend_from_slice(b"KERNEL");
    table.extend_from_slice(b"PLATFORM");
    table.extend_from_slice(&1u32.to_le_bytes());
    table.extend_from_slice(b"RUST");
    table.extend_from_slice(&1u32.to_le_bytes());
    table.extend_from_slice(body);
    set_checksum(&mut table, SDT_CHECKSUM_OFFSET);
    table
}

/// Builds an MADT record by record, in the order the methods are called.
#[derive(Debug, Clone)]
pub struct MadtBuilder {
    local_apic_address: u32,
    flags: u32,
    records: Vec<u8>,
}

impl Default for MadtBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn enabled_flags(enabled: bool) -> u32 {
    u32::from(enabled)
}

impl MadtBuilder {
    /// An MADT with the usual local APIC address and the PC-AT flag set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            local_apic_address: 0xFEE0_0000,
            flags: 1,
            records: Vec::new(),
        }
    }

    #[must_use]
    pub const fn local_apic_address(mut self, address: u32) -> Self {
        self.local_apic_address = address;
        self
    }

    #[must_use]
    pub fn pcat_compat(mut self, present: bool) -> Self {
        self.flags = u32::from(present);
        self
    }

    fn record(mut self, kind: u8, fields: &[&[u8]]) -> Self {
        let length = 2 + fields.iter().map(|f| f.len()).sum::<usize>();
        self.records.push(kind);
        self.records.push(u8::try_from(length).unwrap_or(u8::MAX));
        for field in fields {
            self.records.extend_from_slice(field);
        }
        self
    }

    #[must_use]
    pub fn local_apic(self, processor_uid: u8, apic_id: u8, enabled: bool) -> Self {
        self.record(
            kind::LOCAL_APIC,
            &[
                &[processor_uid, apic_id],
                &enabled_flags(enabled).to_le_bytes(),
            ],
        )
    }

    #[must_use]
    pub fn local_x2apic(self, processor_uid: u32, x2apic_id: u32, enabled: bool) -> Self {
        self.record(
            kind::LOCAL_X2APIC,
            &[
                &[0, 0],
                &x2apic_id.to_le_bytes(),
                &enabled_flags(enabled).to_le_bytes(),
                &processor_uid.to_le_bytes(),
            ],
        )
    }

    #[must_use]
    pub fn io_apic(self, id: u8, address: u32, gsi_base: u32) -> Self {
        self.record(
            kind::IO_APIC,
            &[&[id, 0], &address.to_le_bytes(), &gsi_base.to_le_bytes()],
        )
    }

    #[must_use]
    pub fn interrupt_override(self, bus: u8, source: u8, gsi: u32, flags: u16) -> Self {
        self.record(
            kind::INTERRUPT_OVERRIDE,
            &[&[bus, source], &gsi.to_le_bytes(), &flags.to_le_bytes()],
        )
    }

    #[must_use]
    pub fn nmi_source(self, flags: u16, gsi: u32) -> Self {
        self.record(
            kind::NMI_SOURCE,
            &[&flags.to_le_bytes(), &gsi.to_le_bytes()],
        )
    }

    #[must_use]
    pub fn local_apic_nmi(self, processor_uid: u8, flags: u16, lint: u8) -> Self {
        self.record(
            kind::LOCAL_APIC_NMI,
            &[&[processor_uid], &flags.to_le_bytes(), &[lint]],
        )
    }

    #[must_use]
    pub fn local_apic_address_override(self, address: u64) -> Self {
        self.record(
            kind::LOCAL_APIC_ADDRESS_OVERRIDE,
            &[&[0, 0], &address.to_le_bytes()],
        )
    }

    #[must_use]
    pub fn local_x2apic_nmi(self, processor_uid: u32, flags: u16, lint: u8) -> Self {
        self.record(
            kind::LOCAL_X2APIC_NMI,
            &[
                &flags.to_le_bytes(),
                &processor_uid.to_le_bytes(),
                &[lint, 0, 0, 0],
            ],
        )
    }

    /// Append bytes verbatim, e.g. a deliberately malformed record.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.records.extend_from_slice(bytes);
        self
    }

    /// The finished table, header and checksum included.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(8 + self.records.len());
        body.extend_from_slice(&self.local_apic_address.to_le_bytes());
        body.extend_from_slice(&self.flags.to_le_bytes());
        body.extend_from_slice(&self.records);
        sdt(Signature::MADT, &body)
    }
}

#[derive(Debug, Default)]
pub struct FirmwareImageBuilder {
    acpi1: bool,
    tables: Vec<Vec<u8>>,
}

impl FirmwareImageBuilder {
    /// Emit an ACPI 1.0 RSDP with an RSDT instead of an XSDP with an XSDT.
    #[must_use]
    pub fn acpi1(mut self) -> Self {
        self.acpi1 = true;
        self
    }

    /// Append a table image as-is; it is listed in the root table in order.
    #[must_use]
    pub fn table(mut self, bytes: Vec<u8>) -> Self {
        self.tables.push(bytes);
        self
    }

    #[must_use]
    pub fn build(self) -> FirmwareImage {
        let entry_size = if self.acpi1 { 4 } else { 8 };
        let root_len = SDT_HEADER_SIZE + entry_size * self.tables.len();

        let mut offsets = Vec::with_capacity(self.tables.len());
        let mut cursor = (ROOT_OFFSET + root_len).next_multiple_of(16);
        for table in &self.tables {
            offsets.push(cursor);
            cursor = (cursor + table.len()).next_multiple_of(16);
        }

        let mut memory = vec![0u8; cursor + TAIL_PADDING];

        let mut root_body = Vec::with_capacity(root_len - SDT_HEADER_SIZE);
        for &offset in &offsets {
            if self.acpi1 {
                root_body.extend_from_slice(&addr_u32(image_addr(offset)).to_le_bytes());
            } else {
                root_body.extend_from_slice(&image_addr(offset).to_le_bytes());
            }
        }
        let root_sig = if self.acpi1 {
            Signature::RSDT
        } else {
            Signature::XSDT
        };
        let root = sdt(root_sig, &root_body);
        memory[ROOT_OFFSET..ROOT_OFFSET + root.len()].copy_from_slice(&root);

        for (table, &offset) in self.tables.iter().zip(&offsets) {
            memory[offset..offset + table.len()].copy_from_slice(table);
        }

        let rsdp = &mut memory[..36];
        rsdp[0..8].copy_from_slice(RSDP_SIGNATURE);
        rsdp[9..15].copy_from_slice(b"KERNEL");
        if self.acpi1 {
            rsdp[15] = 0;
            rsdp[16..20].copy_from_slice(&addr_u32(image_addr(ROOT_OFFSET)).to_le_bytes());
            set_checksum(&mut rsdp[..20], 8);
        } else {
            rsdp[15] = 2;
            rsdp[20..24].copy_from_slice(&36u32.to_le_bytes());
            rsdp[24..32].copy_from_slice(&image_addr(ROOT_OFFSET).to_le_bytes());
            set_checksum(&mut rsdp[..20], 8);
            set_checksum(rsdp, 32);
        }

        FirmwareImage {
            memory: Box::leak(memory.into_boxed_slice()),
            table_addrs: offsets.into_iter().map(image_addr).collect(),
        }
    }
}

/// A leaked region of fake physical memory holding firmware tables.
#[derive(Debug)]
pub struct FirmwareImage {
    memory: &'static mut [u8],
    table_addrs: Vec<u64>,
}

impl FirmwareImage {
    #[must_use]
    pub fn builder() -> FirmwareImageBuilder {
        FirmwareImageBuilder::default()
    }

    #[must_use]
    pub const fn rsdp_addr(&self) -> u64 {
        IMAGE_BASE
    }

    #[must_use]
    pub const fn root_addr(&self) -> u64 {
        image_addr(ROOT_OFFSET)
    }

    /// Physical address of the `index`-th table passed to the builder.
    #[must_use]
    pub fn table_addr(&self, index: usize) -> u64 {
        self.table_addrs[index]
    }

    /// Overwrite one byte of the image, checksums untouched.
    pub fn poke(&mut self, paddr: u64, value: u8) {
        let offset = self.offset_of(paddr, 1);
        self.memory[offset] = value;
    }

    fn offset_of(&self, paddr: u64, len: usize) -> usize {
        let offset = paddr
            .checked_sub(IMAGE_BASE)
            .and_then(|o| usize::try_from(o).ok())
            .filter(|&o| o + len <= self.memory.len());
        match offset {
            Some(offset) => offset,
            None => panic!("{paddr:#x}+{len} lies outside the firmware image"),
        }
    }
}

impl PhysMapRo for FirmwareImage {
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
        let offset = self.offset_of(paddr, len);
        // SAFETY: the memory is leaked and bounds were checked.
        unsafe { core::slice::from_raw_parts(self.memory.as_ptr().add(offset), len) }
    }
}
