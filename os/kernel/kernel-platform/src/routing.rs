//! # Interrupt routing
//!
//! Feeds the MADT's I/O APIC, interrupt source override and NMI source
//! records to the interrupt controller driver.

use crate::PlatformError;
use crate::config::DiscoveryConfig;
use kernel_acpi::madt::{self, Madt, MadtEntry, MpsIntiFlags, Polarity, TriggerMode};
use log::{debug, trace};

/// Bus number of the ISA bus in interrupt source overrides.
pub const ISA_BUS: u8 = 0;

/// A global system interrupt with its electrical characteristics.
///
/// The default is active-high and edge-triggered, as on the ISA bus.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Irq {
    pub gsi: u32,
    pub active_low: bool,
    pub level_triggered: bool,
}

/// A legacy ISA line that is wired to a different GSI, or with different
/// polarity or trigger mode, than the identity mapping suggests.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IrqOverride {
    pub isa_line: u8,
    pub irq: Irq,
}

/// A GSI that delivers an NMI.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NmiSource {
    pub irq: Irq,
}

/// The I/O APIC driver's registration interface.
pub trait InterruptController {
    /// An I/O APIC whose first input is `gsi_base`, mapped at `address`.
    fn register_base(&mut self, gsi_base: u32, address: u32);

    fn register_isa_irq_override(&mut self, isa_line: u8, irq: Irq);

    fn register_nmi(&mut self, irq: Irq);
}

/// What was handed to the controller.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RoutingSummary {
    pub io_apics: usize,
    pub overrides: usize,
    pub nmi_sources: usize,
}

impl RoutingSummary {
    /// Routing is only usable with at least one I/O APIC to route to.
    #[must_use]
    pub const fn usable(&self) -> bool {
        self.io_apics > 0
    }
}

/// Decode MPS INTI flags for an interrupt on `bus`.
///
/// `None` stands for records without a bus (NMI sources), which follow ISA
/// conventions. Bus-default polarity or trigger mode is only defined for
/// ISA: active high, edge triggered.
///
/// # Errors
/// [`PlatformError::AmbiguousBusDefault`] for bus-default flags on any other bus.
pub fn decode_inti_flags(
    bus: Option<u8>,
    gsi: u32,
    flags: MpsIntiFlags,
) -> Result<Irq, PlatformError> {
    let polarity = flags.polarity();
    let trigger = flags.trigger_mode();

    if let Some(bus) = bus.filter(|&b| b != ISA_BUS)
        && (polarity == Polarity::BusDefault || trigger == TriggerMode::BusDefault)
    {
        return Err(PlatformError::AmbiguousBusDefault {
            bus,
            flags: flags.into_bits(),
        });
    }

    Ok(Irq {
        gsi,
        active_low: polarity == Polarity::ActiveLow,
        level_triggered: trigger == TriggerMode::Level,
    })
}

impl IrqOverride {
    /// # Errors
    /// See [`decode_inti_flags`].
    pub fn decode(record: &madt::InterruptOverride) -> Result<Self, PlatformError> {
        Ok(Self {
            isa_line: record.source,
            irq: decode_inti_flags(Some(record.bus), record.gsi, record.flags)?,
        })
    }
}

impl NmiSource {
    /// # Errors
    /// See [`decode_inti_flags`].
    pub fn decode(record: &madt::NmiSource) -> Result<Self, PlatformError> {
        Ok(Self {
            irq: decode_inti_flags(None, record.gsi, record.flags)?,
        })
    }
}

/// Register every I/O APIC, ISA override and NMI source with `controller`,
/// in table order.
///
/// # Errors
/// Ambiguous INTI flags or a malformed record stream.
pub fn discover<C: InterruptController + ?Sized>(
    madt: &Madt,
    controller: &mut C,
    config: &DiscoveryConfig,
) -> Result<RoutingSummary, PlatformError> {
    let mut summary = RoutingSummary::default();
    let verbose = config.verbose();

    for entry in madt.entries() {
        match entry? {
            MadtEntry::IoApic(io) => {
                if verbose {
                    debug!(
                        "acpi: IOAPIC {} at {:#x}, GSI base {}",
                        io.id, io.address, io.gsi_base
                    );
                }
                controller.register_base(io.gsi_base, io.address);
                summary.io_apics += 1;
            }
            MadtEntry::InterruptOverride(record) => {
                let over = IrqOverride::decode(&record)?;
                if verbose {
                    debug!("acpi: ISA IRQ {} -> {:?}", over.isa_line, over.irq);
                }
                controller.register_isa_irq_override(over.isa_line, over.irq);
                summary.overrides += 1;
            }
            MadtEntry::NmiSource(record) => {
                let nmi = NmiSource::decode(&record)?;
                if verbose {
                    debug!("acpi: NMI source {:?}", nmi.irq);
                }
                controller.register_nmi(nmi.irq);
                summary.nmi_sources += 1;
            }
            MadtEntry::Unknown { kind, length } => {
                trace!("acpi: ignoring MADT record type {kind} ({length} bytes)");
            }
            _ => {}
        }
    }

    Ok(summary)
}
