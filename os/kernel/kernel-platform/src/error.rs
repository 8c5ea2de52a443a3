//! # Platform discovery errors
//!
//! Every variant is fatal during boot; the tolerated outcomes (no MADT, no
//! `_PIC`, no `_BBN`) are ordinary `Ok` values and never reach this type.

use crate::firmware::{FirmwareStatus, Stage};
use kernel_acpi::TableError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("too many CPUs (capacity {capacity})")]
    TooManyCpus { capacity: usize },
    #[error("boot processor APIC ID {apic_id:#x} is not listed in the MADT")]
    BootCpuNotFound { apic_id: u32 },
    #[error("unknown bus {bus} for bus-default INTI flags {flags:#06x}")]
    AmbiguousBusDefault { bus: u8, flags: u16 },
    #[error("{stage} failed: {status}")]
    Firmware { stage: Stage, status: FirmwareStatus },
}
