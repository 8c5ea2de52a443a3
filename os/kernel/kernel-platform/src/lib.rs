//! # Platform discovery
//!
//! Turns the firmware's description of the machine into the facts the rest
//! of the kernel boots from: which processors exist and which one is
//! running, how legacy and NMI interrupts are wired to the I/O APICs, and
//! where the PCI root buses start.
//!
//! ## Stages
//!
//! ```text
//! RSDP ─→ root tables ─→ MADT ─┬→ CPU topology        (topology)
//!                              └→ interrupt routing   (routing)
//!
//! AML runtime bring-up (firmware) ─→ PCI root buses   (pci)
//! ```
//!
//! The stages are driven by [`Platform`], which owns the intermediate state.
//! A stage that cannot run, because the firmware lacks a MADT or the AML
//! runtime never came up, reports `Ok(false)` and leaves the fallback to the
//! caller. Everything else that goes wrong is a [`PlatformError`], and the
//! boot path treats those as fatal ([`fatal`]).
//!
//! Discovery runs on the boot processor alone. The results are frozen into
//! a [`PlatformInfo`] and published once for the other processors.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_acpi::PhysMapRo;
//! use kernel_platform::routing::{InterruptController, Irq};
//! use kernel_platform::{DiscoveryConfig, Platform, run_early_boot};
//!
//! struct Hhdm;
//! impl PhysMapRo for Hhdm {
//!     unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
//!         # unimplemented!()
//!     }
//! }
//!
//! struct IoApics;
//! impl InterruptController for IoApics {
//!     fn register_base(&mut self, gsi_base: u32, address: u32) {}
//!     fn register_isa_irq_override(&mut self, isa_line: u8, irq: Irq) {}
//!     fn register_nmi(&mut self, irq: Irq) {}
//! }
//!
//! let mut platform = Platform::new(DiscoveryConfig::default());
//! let found = unsafe { run_early_boot(&mut platform, &Hhdm, 0xE0000, 0, &mut IoApics) };
//! if !found.cpus_from_firmware {
//!     // fall back to the MP tables
//! }
//! let info = platform.freeze().publish();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod config;
mod error;
pub mod firmware;
mod once;
pub mod pci;
mod platform;
pub mod routing;
mod state;
pub mod topology;

pub use config::{DiscoveryConfig, MAX_CPUS};
pub use error::PlatformError;
pub use firmware::{FirmwareRuntime, FirmwareStatus};
pub use once::BootOnce;
pub use pci::{PciRootBus, ScanStatus};
pub use platform::{
    EarlyBoot, Platform, PlatformInfo, fatal, platform_info, run_early_boot,
    run_firmware_bring_up,
};
pub use routing::{InterruptController, Irq};
pub use state::FirmwareSubsystemState;
pub use topology::{CpuDescriptor, CpuTopology};
