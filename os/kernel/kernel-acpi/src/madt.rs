//! # MADT (Multiple APIC Description Table)
//!
//! The MADT (signature `APIC`) lists every processor's local APIC, the I/O
//! APICs, and the ways legacy ISA interrupts and NMIs are wired to global
//! system interrupts (GSIs). Layouts follow ACPI 6.5 §5.2.12.
//!
//! ```text
//! +--------------------+ 0
//! | SDT header         |
//! +--------------------+ 36
//! | local APIC address |  u32
//! | flags              |  u32, bit 0 = PC-AT compatible (dual 8259)
//! +--------------------+ 44
//! | type | len | ...   |  records, each `len` bytes long
//! | type | len | ...   |
//! +--------------------+ length
//! ```

use crate::sdt::{SdtHeader, Signature};
use crate::subtable::{RawSubtable, Subtables, subtables};
use crate::tables::TableHandle;
use crate::{SubtableFault, TableError};
use bitfield_struct::bitfield;
use core::iter::FusedIterator;
use core::ptr::read_unaligned;

/// Size of the MADT's fixed part: SDT header, local APIC address and flags.
pub const MADT_HEADER_SIZE: usize = size_of::<RawMadt>();

/// Record type codes, ACPI 6.5 Table 5.21.
pub mod kind {
    pub const LOCAL_APIC: u8 = 0;
    pub const IO_APIC: u8 = 1;
    pub const INTERRUPT_OVERRIDE: u8 = 2;
    pub const NMI_SOURCE: u8 = 3;
    pub const LOCAL_APIC_NMI: u8 = 4;
    pub const LOCAL_APIC_ADDRESS_OVERRIDE: u8 = 5;
    pub const LOCAL_X2APIC: u8 = 9;
    pub const LOCAL_X2APIC_NMI: u8 = 10;
}

/// MADT flag: the platform also has dual 8259 PICs.
const PCAT_COMPAT: u32 = 1 << 0;

#[repr(C, packed)]
struct RawMadt {
    header: SdtHeader,
    local_apic_address: u32,
    flags: u32,
}

#[repr(C, packed)]
struct RawLocalApic {
    entry_type: u8,
    length: u8,
    processor_uid: u8,
    apic_id: u8,
    flags: u32,
}

#[repr(C, packed)]
struct RawIoApic {
    entry_type: u8,
    length: u8,
    io_apic_id: u8,
    reserved: u8,
    address: u32,
    gsi_base: u32,
}

#[repr(C, packed)]
struct RawInterruptOverride {
    entry_type: u8,
    length: u8,
    bus: u8,
    source: u8,
    gsi: u32,
    flags: u16,
}

#[repr(C, packed)]
struct RawNmiSource {
    entry_type: u8,
    length: u8,
    flags: u16,
    gsi: u32,
}

#[repr(C, packed)]
struct RawLocalApicNmi {
    entry_type: u8,
    length: u8,
    processor_uid: u8,
    flags: u16,
    lint: u8,
}

#[repr(C, packed)]
struct RawLocalApicAddressOverride {
    entry_type: u8,
    length: u8,
    reserved: u16,
    address: u64,
}

#[repr(C, packed)]
struct RawLocalX2Apic {
    entry_type: u8,
    length: u8,
    reserved: u16,
    x2apic_id: u32,
    flags: u32,
    processor_uid: u32,
}

#[repr(C, packed)]
struct RawLocalX2ApicNmi {
    entry_type: u8,
    length: u8,
    flags: u16,
    processor_uid: u32,
    lint: u8,
    reserved: [u8; 3],
}

const _: () = assert!(MADT_HEADER_SIZE == 44);
const _: () = assert!(size_of::<RawLocalApic>() == 8);
const _: () = assert!(size_of::<RawIoApic>() == 12);
const _: () = assert!(size_of::<RawInterruptOverride>() == 10);
const _: () = assert!(size_of::<RawNmiSource>() == 8);
const _: () = assert!(size_of::<RawLocalApicNmi>() == 6);
const _: () = assert!(size_of::<RawLocalApicAddressOverride>() == 12);
const _: () = assert!(size_of::<RawLocalX2Apic>() == 16);
const _: () = assert!(size_of::<RawLocalX2ApicNmi>() == 12);

/// Flags of Local APIC and Local x2APIC records.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct LocalApicFlags {
    /// The processor is usable.
    pub enabled: bool,
    /// The processor can be brought online later (only meaningful when not enabled).
    pub online_capable: bool,
    #[bits(30)]
    __: u32,
}

/// The MPS INTI flags of interrupt source overrides and NMI records.
///
/// | Bits | Field    | Values                                          |
/// |------|----------|-------------------------------------------------|
/// | 0–1  | polarity | 00 bus default, 01 high, 10 reserved, 11 low    |
/// | 2–3  | trigger  | 00 bus default, 01 edge, 10 reserved, 11 level  |
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct MpsIntiFlags {
    #[bits(2)]
    pub polarity_bits: u8,
    #[bits(2)]
    pub trigger_bits: u8,
    #[bits(12)]
    __: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Polarity {
    /// Conforms to the specifications of the bus.
    BusDefault,
    ActiveHigh,
    Reserved,
    ActiveLow,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// Conforms to the specifications of the bus.
    BusDefault,
    Edge,
    Reserved,
    Level,
}

impl MpsIntiFlags {
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        match self.polarity_bits() {
            0b00 => Polarity::BusDefault,
            0b01 => Polarity::ActiveHigh,
            0b10 => Polarity::Reserved,
            _ => Polarity::ActiveLow,
        }
    }

    #[must_use]
    pub const fn trigger_mode(&self) -> TriggerMode {
        match self.trigger_bits() {
            0b00 => TriggerMode::BusDefault,
            0b01 => TriggerMode::Edge,
            0b10 => TriggerMode::Reserved,
            _ => TriggerMode::Level,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalApic {
    pub processor_uid: u8,
    pub apic_id: u8,
    pub flags: LocalApicFlags,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IoApic {
    pub id: u8,
    /// Physical MMIO base of the I/O APIC registers.
    pub address: u32,
    /// First GSI this I/O APIC serves.
    pub gsi_base: u32,
}

/// A legacy bus interrupt that does not map 1:1 onto a GSI.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InterruptOverride {
    /// Always 0 (ISA) on conforming firmware.
    pub bus: u8,
    /// Bus-relative IRQ line.
    pub source: u8,
    pub gsi: u32,
    pub flags: MpsIntiFlags,
}

/// A GSI that delivers non-maskable interrupts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NmiSource {
    pub flags: MpsIntiFlags,
    pub gsi: u32,
}

/// A local APIC LINT pin wired to NMI. A UID of `0xFF` means all processors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalApicNmi {
    pub processor_uid: u8,
    pub flags: MpsIntiFlags,
    pub lint: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalX2Apic {
    pub x2apic_id: u32,
    pub flags: LocalApicFlags,
    pub processor_uid: u32,
}

/// Like [`LocalApicNmi`]; a UID of `0xFFFF_FFFF` means all processors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalX2ApicNmi {
    pub processor_uid: u32,
    pub flags: MpsIntiFlags,
    pub lint: u8,
}

/// A decoded MADT record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MadtEntry {
    LocalApic(LocalApic),
    IoApic(IoApic),
    InterruptOverride(InterruptOverride),
    NmiSource(NmiSource),
    LocalApicNmi(LocalApicNmi),
    /// 64-bit local APIC address replacing the one in the MADT header.
    LocalApicAddressOverride { address: u64 },
    LocalX2Apic(LocalX2Apic),
    LocalX2ApicNmi(LocalX2ApicNmi),
    /// A record type this kernel does not interpret.
    Unknown { kind: u8, length: usize },
}

/// Copy a record of type `T` out of `raw`, rejecting records too short for it.
///
/// Firmware may append fields in newer revisions, so longer records are fine.
fn read_record<T>(raw: &RawSubtable<'_>) -> Result<T, TableError> {
    let required = size_of::<T>();
    if raw.len() < required {
        return Err(raw.fault(SubtableFault::ShortPayload {
            kind: raw.kind(),
            length: raw.len(),
            required,
        }));
    }
    // SAFETY: length checked above; `T` is a packed record (alignment 1).
    Ok(unsafe { read_unaligned(raw.bytes().as_ptr().cast::<T>()) })
}

impl MadtEntry {
    /// Decode one record.
    ///
    /// # Errors
    /// A known record type whose length is shorter than its layout.
    pub fn decode(raw: &RawSubtable<'_>) -> Result<Self, TableError> {
        let entry = match raw.kind() {
            kind::LOCAL_APIC => {
                let r = read_record::<RawLocalApic>(raw)?;
                Self::LocalApic(LocalApic {
                    processor_uid: r.processor_uid,
                    apic_id: r.apic_id,
                    flags: LocalApicFlags::from_bits(r.flags),
                })
            }
            kind::IO_APIC => {
                let r = read_record::<RawIoApic>(raw)?;
                Self::IoApic(IoApic {
                    id: r.io_apic_id,
                    address: r.address,
                    gsi_base: r.gsi_base,
                })
            }
            kind::INTERRUPT_OVERRIDE => {
                let r = read_record::<RawInterruptOverride>(raw)?;
                Self::InterruptOverride(InterruptOverride {
                    bus: r.bus,
                    source: r.source,
                    gsi: r.gsi,
                    flags: MpsIntiFlags::from_bits(r.flags),
                })
            }
            kind::NMI_SOURCE => {
                let r = read_record::<RawNmiSource>(raw)?;
                Self::NmiSource(NmiSource {
                    flags: MpsIntiFlags::from_bits(r.flags),
                    gsi: r.gsi,
                })
            }
            kind::LOCAL_APIC_NMI => {
                let r = read_record::<RawLocalApicNmi>(raw)?;
                Self::LocalApicNmi(LocalApicNmi {
                    processor_uid: r.processor_uid,
                    flags: MpsIntiFlags::from_bits(r.flags),
                    lint: r.lint,
                })
            }
            kind::LOCAL_APIC_ADDRESS_OVERRIDE => {
                let r = read_record::<RawLocalApicAddressOverride>(raw)?;
                Self::LocalApicAddressOverride { address: r.address }
            }
            kind::LOCAL_X2APIC => {
                let r = read_record::<RawLocalX2Apic>(raw)?;
                Self::LocalX2Apic(LocalX2Apic {
                    x2apic_id: r.x2apic_id,
                    flags: LocalApicFlags::from_bits(r.flags),
                    processor_uid: r.processor_uid,
                })
            }
            kind::LOCAL_X2APIC_NMI => {
                let r = read_record::<RawLocalX2ApicNmi>(raw)?;
                Self::LocalX2ApicNmi(LocalX2ApicNmi {
                    processor_uid: r.processor_uid,
                    flags: MpsIntiFlags::from_bits(r.flags),
                    lint: r.lint,
                })
            }
            other => Self::Unknown {
                kind: other,
                length: raw.len(),
            },
        };
        Ok(entry)
    }
}

/// A validated MADT.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Madt {
    table: TableHandle,
}

impl Madt {
    /// Wrap a table handle found by the [`Signature::MADT`] signature.
    ///
    /// # Errors
    /// The table is shorter than the MADT's fixed part.
    pub fn new(table: TableHandle) -> Result<Self, TableError> {
        if table.len() < MADT_HEADER_SIZE {
            return Err(TableError::TooShort {
                signature: Signature::MADT,
                length: table.len(),
                required: MADT_HEADER_SIZE,
            });
        }
        Ok(Self { table })
    }

    #[must_use]
    pub const fn handle(&self) -> TableHandle {
        self.table
    }

    fn raw(&self) -> RawMadt {
        // SAFETY: `new` checked the table covers the fixed part.
        unsafe { read_unaligned(self.table.bytes().as_ptr().cast::<RawMadt>()) }
    }

    /// Whether dual 8259 PICs are present and must be masked.
    #[must_use]
    pub fn pcat_compat(&self) -> bool {
        self.raw().flags & PCAT_COMPAT != 0
    }

    /// Physical address of the local APIC register block.
    ///
    /// A Local APIC Address Override record takes precedence over the
    /// 32-bit header field.
    ///
    /// # Errors
    /// The record stream is malformed.
    pub fn local_apic_address(&self) -> Result<u64, TableError> {
        let mut address = u64::from(self.raw().local_apic_address);
        for entry in self.entries() {
            if let MadtEntry::LocalApicAddressOverride { address: wide } = entry? {
                address = wide;
            }
        }
        Ok(address)
    }

    /// Decode the record stream, in table order.
    #[must_use]
    pub fn entries(&self) -> MadtEntries<'static> {
        MadtEntries {
            inner: subtables(self.table.bytes(), MADT_HEADER_SIZE),
            failed: false,
        }
    }
}

/// Iterator over decoded MADT records. Ends after the first error.
#[derive(Debug)]
pub struct MadtEntries<'a> {
    inner: Subtables<'a>,
    failed: bool,
}

impl Iterator for MadtEntries<'_> {
    type Item = Result<MadtEntry, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?.and_then(|raw| MadtEntry::decode(&raw));
        self.failed = item.is_err();
        Some(item)
    }
}

impl FusedIterator for MadtEntries<'_> {}
