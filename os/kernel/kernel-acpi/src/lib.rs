//! # ACPI (Advanced Configuration and Power Interface) Tables
//!
//! This crate reads the firmware's static ACPI tables during early boot,
//! before the kernel has an allocator or an AML interpreter. It locates the
//! root tables, validates them, and decodes the MADT record stream that
//! describes processors and interrupt wiring.
//!
//! ## Architecture
//!
//! ```text
//! UEFI/BIOS Firmware
//!     ↓
//! RSDP/XSDP (Root System Description Pointer)   rsdp
//!     ↓
//! RSDT/XSDT (Root/Extended System Description)  tables::RootTables
//!     ↓
//! MADT, FADT, MCFG, ...                         tables::TableHandle
//!     ↓
//! MADT record stream                            subtable + madt
//! ```
//!
//! ## Key Components
//!
//! ### Physical Memory Mapping ([`PhysMapRo`])
//! Abstract trait for mapping physical memory regions into the kernel's
//! virtual address space. The tables are reached through it regardless of the
//! underlying memory management implementation (HHDM, identity, temporary).
//!
//! ### Root Table Locator ([`RootTables`])
//! * Validates the RSDP (ACPI 1.0) or XSDP (ACPI 2.0+) and picks the XSDT
//!   over the RSDT when both exist
//! * Records up to [`ROOT_TABLE_CAPACITY`] tables in fixed slots
//! * Validates length and checksum when a table is looked up by signature
//!
//! ### Subtables ([`subtable`])
//! A bounded, forward-only walk over the type/length-prefixed records at the
//! end of a table. Records shorter than their own header or overrunning the
//! table end stop the walk with a [`TableError`] instead of reading out of
//! bounds.
//!
//! ### MADT ([`madt`])
//! Decodes local APIC, local x2APIC, I/O APIC, interrupt source override,
//! NMI source and local NMI records into [`MadtEntry`] values.
//!
//! ## Safety Considerations
//!
//! Firmware tables are untrusted input. Everything past the RSDP is read
//! through slices whose length comes from the declared table length, and
//! every packed record is copied out with an unaligned read after a length
//! check.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_acpi::madt::{Madt, MadtEntry};
//! use kernel_acpi::{PhysMapRo, RootTables, Signature};
//!
//! struct MyMapper;
//! impl PhysMapRo for MyMapper {
//!     unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
//!         // Implementation-specific mapping
//!         # unimplemented!()
//!     }
//! }
//!
//! let rsdp_addr = 0x12345000; // From UEFI configuration table
//! let tables = unsafe { RootTables::acquire(&MyMapper, rsdp_addr) }.unwrap();
//! if let Some(handle) = tables.find(Signature::MADT, 0).unwrap() {
//!     let madt = Madt::new(handle).unwrap();
//!     for entry in madt.entries() {
//!         if let Ok(MadtEntry::IoApic(io)) = entry {
//!             println!("I/O APIC at {:#x}", io.address);
//!         }
//!     }
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "table-builder"))]
extern crate alloc;

#[cfg(any(test, feature = "table-builder"))]
pub mod builder;
mod error;
pub mod madt;
pub mod rsdp;
pub mod sdt;
pub mod subtable;
pub mod tables;

pub use error::{SubtableFault, TableError};
pub use madt::{Madt, MadtEntry};
pub use sdt::{SDT_HEADER_SIZE, SdtHeader, Signature};
pub use tables::{ROOT_TABLE_CAPACITY, RootTables, TableHandle};

/// Map a physical region and return a *read-only* byte slice for its contents.
/// You provide the implementation (identity map, kmap, etc.).
pub trait PhysMapRo {
    /// # Safety
    /// The implementor must ensure the returned slice is valid for `len` bytes.
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8];
}

/// Byte sum modulo 256; valid ACPI structures sum to zero.
fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}
