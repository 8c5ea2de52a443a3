//! # Firmware runtime bring-up
//!
//! The AML runtime (ACPICA or similar) is reached through the
//! [`FirmwareRuntime`] trait. Bring-up is a fixed sequence; every step must
//! succeed, except that a missing `\_PIC` method is accepted since older
//! firmware does not implement it.
//!
//! ```text
//! initialize_subsystem → load_tables → enable_subsystem
//!     → initialize_objects → \_PIC(1)
//! ```

use crate::PlatformError;
use core::fmt;
use log::{info, warn};

/// Path of the method that selects the interrupt model (ACPI 6.5 §5.8.1).
pub const INTERRUPT_MODEL_METHOD: &str = "\\_PIC";

/// Exception codes reported by the firmware runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareStatus {
    #[error("AE_NOT_FOUND")]
    NotFound,
    #[error("AE_NO_MEMORY")]
    NoMemory,
    #[error("AE_BAD_PARAMETER")]
    BadParameter,
    #[error("AE_NO_ACPI_TABLES")]
    NoTables,
    #[error("AML exception {0:#06x}")]
    Aml(u16),
    #[error("firmware exception {0:#06x}")]
    Other(u32),
}

/// The interrupt models an x86 kernel can declare through `\_PIC`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u64)]
pub enum InterruptModel {
    /// Legacy dual 8259, the firmware's assumption until told otherwise.
    Pic = 0,
    Apic = 1,
}

/// A value passed to or returned from a firmware method.
///
/// Only integers carry their payload; the kernel never reads anything else.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FirmwareValue {
    Integer(u64),
    /// A buffer of the given length.
    Buffer(usize),
    /// A string, package or reference.
    Other,
}

/// Whether a namespace walk goes on after visiting a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

/// The firmware's AML runtime as seen by the kernel.
pub trait FirmwareRuntime {
    /// Reference to a node in the firmware namespace.
    type Handle: Copy + fmt::Debug;

    /// Set up the runtime's internal state.
    fn initialize_subsystem(&mut self) -> Result<(), FirmwareStatus>;

    /// Load the DSDT/SSDTs into the namespace.
    fn load_tables(&mut self) -> Result<(), FirmwareStatus>;

    /// Switch the platform into ACPI mode, hardware and events included.
    fn enable_subsystem(&mut self) -> Result<(), FirmwareStatus>;

    /// Run `_INI`/`_STA` for the namespace's devices and regions.
    fn initialize_objects(&mut self) -> Result<(), FirmwareStatus>;

    /// Evaluate `path`, relative to `scope` or absolute when `scope` is `None`.
    ///
    /// `Ok(None)` means the method returned nothing.
    fn evaluate(
        &self,
        scope: Option<Self::Handle>,
        path: &str,
        args: &[FirmwareValue],
    ) -> Result<Option<FirmwareValue>, FirmwareStatus>;

    /// Visit every device whose `_HID` or `_CID` equals `hid`.
    ///
    /// The walk is depth-first and visits each matching device exactly once;
    /// no other ordering is promised.
    fn walk_devices(
        &self,
        hid: &str,
        visit: &mut dyn FnMut(Self::Handle) -> WalkControl,
    ) -> Result<(), FirmwareStatus>;
}

/// A step of the bring-up sequence, used to tell which one failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    InitializeSubsystem,
    LoadTables,
    EnableSubsystem,
    InitializeObjects,
    DeclareInterruptModel,
    WalkNamespace,
    BaseBusNumber,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InitializeSubsystem => "initializing the firmware subsystem",
            Self::LoadTables => "loading firmware tables",
            Self::EnableSubsystem => "enabling the firmware subsystem",
            Self::InitializeObjects => "initializing firmware objects",
            Self::DeclareInterruptModel => "evaluating \\_PIC",
            Self::WalkNamespace => "walking the firmware namespace",
            Self::BaseBusNumber => "evaluating _BBN",
        })
    }
}

impl Stage {
    /// Attach this stage to a runtime result.
    pub(crate) fn check<T>(self, result: Result<T, FirmwareStatus>) -> Result<T, PlatformError> {
        result.map_err(|status| PlatformError::Firmware {
            stage: self,
            status,
        })
    }
}

/// Run the bring-up sequence and declare APIC mode.
///
/// # Errors
/// The first failing step, as [`PlatformError::Firmware`].
pub fn bring_up<R: FirmwareRuntime + ?Sized>(runtime: &mut R) -> Result<(), PlatformError> {
    info!("acpi: Enabling firmware subsystem");
    Stage::InitializeSubsystem.check(runtime.initialize_subsystem())?;
    Stage::LoadTables.check(runtime.load_tables())?;
    Stage::EnableSubsystem.check(runtime.enable_subsystem())?;
    Stage::InitializeObjects.check(runtime.initialize_objects())?;
    declare_interrupt_model(runtime, InterruptModel::Apic)?;
    Ok(())
}

/// Tell the firmware which interrupt model the kernel uses.
///
/// Returns `false` if the firmware has no `\_PIC` method.
///
/// # Errors
/// Any evaluation failure other than `AE_NOT_FOUND`.
pub fn declare_interrupt_model<R: FirmwareRuntime + ?Sized>(
    runtime: &R,
    model: InterruptModel,
) -> Result<bool, PlatformError> {
    let args = [FirmwareValue::Integer(model as u64)];
    match runtime.evaluate(None, INTERRUPT_MODEL_METHOD, &args) {
        Ok(_) => Ok(true),
        Err(FirmwareStatus::NotFound) => {
            warn!("acpi: firmware has no {INTERRUPT_MODEL_METHOD} method, assuming {model:?} mode");
            Ok(false)
        }
        Err(status) => Err(PlatformError::Firmware {
            stage: Stage::DeclareInterruptModel,
            status,
        }),
    }
}
