//! # PCI root bus enumeration
//!
//! Host bridges are found by walking the firmware namespace for the PCI root
//! hardware id. Each one's first bus number comes from its `_BBN` method.

use crate::PlatformError;
use crate::firmware::{FirmwareRuntime, FirmwareStatus, FirmwareValue, Stage, WalkControl};
use log::{debug, warn};

/// `_HID`/`_CID` of a PCI host bridge.
pub const PCI_ROOT_HID: &str = "PNP0A03";

/// Method returning a root bridge's base bus number.
pub const BASE_BUS_METHOD: &str = "_BBN";

/// A PCI root bus, handed to the bus scanner.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PciRootBus<H> {
    /// First bus number behind the host bridge.
    pub bus: u8,
    /// The host bridge's namespace node, for further method evaluation.
    pub firmware_handle: H,
}

/// Outcome reported by the bus scanner for one root.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Scanned,
    Failed,
}

/// Walk the namespace and call `scan` once for every PCI root bridge.
///
/// A scanner failure is logged and the walk goes on. Returns the number of
/// roots visited.
///
/// # Errors
/// The walk itself failing, or `_BBN` failing for a reason other than
/// being absent.
pub fn enumerate_roots<R: FirmwareRuntime + ?Sized>(
    runtime: &R,
    scan: &mut dyn FnMut(&PciRootBus<R::Handle>) -> ScanStatus,
) -> Result<usize, PlatformError> {
    let mut roots = 0;
    let mut failure = None;

    let walked = runtime.walk_devices(PCI_ROOT_HID, &mut |handle| {
        let bus = match base_bus_number(runtime, handle) {
            Ok(bus) => bus,
            Err(e) => {
                failure = Some(e);
                return WalkControl::Stop;
            }
        };

        let root = PciRootBus {
            bus,
            firmware_handle: handle,
        };
        debug!("acpi: PCI root bus {bus} at {handle:?}");
        if scan(&root) == ScanStatus::Failed {
            warn!("acpi: scanning PCI root bus {bus} failed");
        }
        roots += 1;
        WalkControl::Continue
    });

    if let Some(e) = failure {
        return Err(e);
    }
    Stage::WalkNamespace.check(walked)?;
    Ok(roots)
}

/// Evaluate `_BBN` for a root bridge.
///
/// A missing method means bus 0. Malformed results are logged and also
/// read as bus 0.
///
/// # Errors
/// Evaluation failures other than `AE_NOT_FOUND`.
pub fn base_bus_number<R: FirmwareRuntime + ?Sized>(
    runtime: &R,
    handle: R::Handle,
) -> Result<u8, PlatformError> {
    let value = match runtime.evaluate(Some(handle), BASE_BUS_METHOD, &[]) {
        Ok(value) => value,
        Err(FirmwareStatus::NotFound) => return Ok(0),
        Err(status) => {
            return Err(PlatformError::Firmware {
                stage: Stage::BaseBusNumber,
                status,
            });
        }
    };

    match value {
        Some(FirmwareValue::Integer(n)) => u8::try_from(n).or_else(|_| {
            warn!("acpi: {BASE_BUS_METHOD} returned out-of-range bus {n:#x}");
            Ok(0)
        }),
        None => {
            warn!("acpi: {BASE_BUS_METHOD} method returned void");
            Ok(0)
        }
        Some(other) => {
            warn!("acpi: {BASE_BUS_METHOD} method returned unexpected type {other:?}");
            Ok(0)
        }
    }
}
