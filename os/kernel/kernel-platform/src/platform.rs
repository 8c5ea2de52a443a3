//! # Boot sequencing
//!
//! [`Platform`] owns everything discovery produces and runs the stages in
//! order:
//!
//! ```text
//! acquire_root_tables → find_multiprocessor_table → discover_cpus
//!     → discover_interrupt_routing → enable_full_subsystem → enumerate_pci_roots
//! ```
//!
//! Each stage returns `Ok(false)` when it has to be skipped and the caller
//! must fall back to a legacy source. Errors are fatal; [`run_early_boot`]
//! and [`run_firmware_bring_up`] halt on them through [`fatal`].
//!
//! Once boot is done the platform is frozen into a [`PlatformInfo`] and
//! published for the rest of the kernel.

use crate::PlatformError;
use crate::config::DiscoveryConfig;
use crate::firmware::{self, FirmwareRuntime};
use crate::once::BootOnce;
use crate::pci::{self, PciRootBus, ScanStatus};
use crate::routing::{self, InterruptController, RoutingSummary};
use crate::state::FirmwareSubsystemState;
use crate::topology::CpuTopology;
use kernel_acpi::{Madt, PhysMapRo, RootTables, Signature, TableHandle};
use log::{error, info};

/// Discovery state, owned by the boot processor while it runs the stages.
pub struct Platform {
    config: DiscoveryConfig,
    state: FirmwareSubsystemState,
    tables: Option<RootTables>,
    madt: Option<Madt>,
    topology: Option<CpuTopology>,
    local_apic_address: Option<u64>,
    routing: Option<RoutingSummary>,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

impl Platform {
    #[must_use]
    pub const fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            state: FirmwareSubsystemState::new(),
            tables: None,
            madt: None,
            topology: None,
            local_apic_address: None,
            routing: None,
        }
    }

    /// Locate and validate the root tables.
    ///
    /// # Errors
    /// Any RSDP or root table defect. Nothing else can run without the
    /// tables, so the caller must treat this as fatal.
    ///
    /// # Safety
    /// `map` must keep firmware memory mapped for the kernel's lifetime.
    pub unsafe fn acquire_root_tables<M: PhysMapRo>(
        &mut self,
        map: &M,
        rsdp_addr: u64,
    ) -> Result<(), PlatformError> {
        let tables = unsafe { RootTables::acquire(map, rsdp_addr)? };
        info!(
            "acpi: {} root tables via {:?} (revision {})",
            tables.len(),
            tables.roots().root_table().map(|(kind, _)| kind),
            tables.roots().revision
        );
        self.tables = Some(tables);
        self.state.mark_tables_available();
        Ok(())
    }

    /// Look up the MADT and keep it for the discovery stages.
    ///
    /// `Ok(None)` if the firmware has no MADT, or the root tables were never
    /// acquired. Repeated calls give the same answer.
    ///
    /// # Errors
    /// A MADT that is listed but invalid.
    pub fn find_multiprocessor_table(&mut self) -> Result<Option<Madt>, PlatformError> {
        let Some(tables) = &self.tables else {
            return Ok(None);
        };
        let madt = tables.find(Signature::MADT, 0)?.map(Madt::new).transpose()?;
        self.madt = madt;
        Ok(madt)
    }

    /// Build the CPU table from the MADT.
    ///
    /// Returns `false` when there is no MADT and the caller has to find the
    /// processors some other way.
    ///
    /// # Errors
    /// See [`CpuTopology::discover`].
    pub fn discover_cpus(&mut self, boot_apic_id: u32) -> Result<bool, PlatformError> {
        let Some(madt) = self.madt else {
            return Ok(false);
        };

        info!("acpi: Initializing CPUs");
        let topology = CpuTopology::discover(&madt, boot_apic_id, &self.config)?;
        let local_apic_address = madt.local_apic_address()?;
        info!(
            "acpi: {} CPUs, local APIC at {local_apic_address:#x}",
            topology.len()
        );

        self.topology = Some(topology);
        self.local_apic_address = Some(local_apic_address);
        Ok(true)
    }

    /// Hand the MADT's interrupt routing to `controller`.
    ///
    /// Returns `false` when there is no MADT or it lists no I/O APIC.
    ///
    /// # Errors
    /// See [`routing::discover`].
    pub fn discover_interrupt_routing<C: InterruptController + ?Sized>(
        &mut self,
        controller: &mut C,
    ) -> Result<bool, PlatformError> {
        let Some(madt) = self.madt else {
            return Ok(false);
        };

        info!("acpi: Initializing IOAPICs");
        let summary = routing::discover(&madt, controller, &self.config)?;
        self.routing = Some(summary);
        Ok(summary.usable())
    }

    /// Bring up the AML runtime.
    ///
    /// Does nothing and returns `false` without root tables.
    ///
    /// # Errors
    /// See [`firmware::bring_up`].
    pub fn enable_full_subsystem<R: FirmwareRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
    ) -> Result<bool, PlatformError> {
        if !self.state.tables_available() {
            return Ok(false);
        }

        firmware::bring_up(runtime)?;
        self.state.mark_subsystem_enabled();
        Ok(true)
    }

    /// Call `scan` once per PCI root bridge in the firmware namespace.
    ///
    /// Returns `false` without calling `scan` if the AML runtime is not up;
    /// the caller then has to probe the buses itself.
    ///
    /// # Errors
    /// See [`pci::enumerate_roots`].
    pub fn enumerate_pci_roots<R: FirmwareRuntime + ?Sized>(
        &self,
        runtime: &R,
        scan: &mut dyn FnMut(&PciRootBus<R::Handle>) -> ScanStatus,
    ) -> Result<bool, PlatformError> {
        if !self.state.subsystem_enabled() {
            return Ok(false);
        }

        info!("acpi: Using ACPI for PCI root enumeration");
        let roots = pci::enumerate_roots(runtime, scan)?;
        info!("acpi: {roots} PCI root buses");
        Ok(true)
    }

    #[must_use]
    pub const fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> FirmwareSubsystemState {
        self.state
    }

    #[must_use]
    pub const fn tables(&self) -> Option<&RootTables> {
        self.tables.as_ref()
    }

    #[must_use]
    pub const fn madt(&self) -> Option<Madt> {
        self.madt
    }

    #[must_use]
    pub const fn topology(&self) -> Option<&CpuTopology> {
        self.topology.as_ref()
    }

    #[must_use]
    pub const fn routing(&self) -> Option<RoutingSummary> {
        self.routing
    }

    /// End discovery and keep only its results.
    #[must_use]
    pub fn freeze(self) -> PlatformInfo {
        PlatformInfo {
            state: self.state,
            madt: self.madt.as_ref().map(Madt::handle),
            pcat_compat: self.madt.is_some_and(|m| m.pcat_compat()),
            local_apic_address: self.local_apic_address,
            topology: self.topology,
            routing: self.routing,
        }
    }
}

/// What discovery found, read-only.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    state: FirmwareSubsystemState,
    madt: Option<TableHandle>,
    pcat_compat: bool,
    local_apic_address: Option<u64>,
    topology: Option<CpuTopology>,
    routing: Option<RoutingSummary>,
}

static PLATFORM: BootOnce<PlatformInfo> = BootOnce::new();

impl PlatformInfo {
    #[must_use]
    pub const fn state(&self) -> FirmwareSubsystemState {
        self.state
    }

    #[must_use]
    pub const fn madt(&self) -> Option<TableHandle> {
        self.madt
    }

    /// The platform also has dual 8259 PICs that need to be masked.
    #[must_use]
    pub const fn pcat_compat(&self) -> bool {
        self.pcat_compat
    }

    /// Physical address of the local APICs, after any 64-bit override.
    #[must_use]
    pub const fn local_apic_address(&self) -> Option<u64> {
        self.local_apic_address
    }

    /// The firmware-derived CPU table, if there was a MADT.
    #[must_use]
    pub const fn topology(&self) -> Option<&CpuTopology> {
        self.topology.as_ref()
    }

    #[must_use]
    pub const fn routing(&self) -> Option<RoutingSummary> {
        self.routing
    }

    /// Make this the platform information every processor sees.
    ///
    /// # Errors
    /// `self`, if platform information was already published.
    pub fn publish(self) -> Result<&'static Self, Self> {
        PLATFORM.publish(self)
    }
}

/// The published platform information.
#[must_use]
pub fn platform_info() -> Option<&'static PlatformInfo> {
    PLATFORM.get()
}

/// Report a discovery failure and stop.
///
/// # Panics
/// Always; the kernel's panic handler halts the processor.
pub fn fatal(err: &PlatformError) -> ! {
    error!("acpi: {err}");
    panic!("platform discovery failed: {err}");
}

/// What the firmware could provide during early boot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EarlyBoot {
    /// The CPU table came from the MADT.
    pub cpus_from_firmware: bool,
    /// Interrupt routing came from the MADT and is usable.
    pub routing_from_firmware: bool,
}

/// Run the table stages: acquire the root tables, find the MADT, discover
/// the processors and the interrupt routing.
///
/// # Panics
/// Through [`fatal`] on any discovery error.
///
/// # Safety
/// See [`Platform::acquire_root_tables`].
pub unsafe fn run_early_boot<M: PhysMapRo, C: InterruptController + ?Sized>(
    platform: &mut Platform,
    map: &M,
    rsdp_addr: u64,
    boot_apic_id: u32,
    controller: &mut C,
) -> EarlyBoot {
    if let Err(e) = unsafe { platform.acquire_root_tables(map, rsdp_addr) } {
        fatal(&e);
    }
    platform
        .find_multiprocessor_table()
        .unwrap_or_else(|e| fatal(&e));

    EarlyBoot {
        cpus_from_firmware: platform
            .discover_cpus(boot_apic_id)
            .unwrap_or_else(|e| fatal(&e)),
        routing_from_firmware: platform
            .discover_interrupt_routing(controller)
            .unwrap_or_else(|e| fatal(&e)),
    }
}

/// Bring up the AML runtime, halting on failure.
///
/// # Panics
/// Through [`fatal`] if a bring-up stage fails.
pub fn run_firmware_bring_up<R: FirmwareRuntime + ?Sized>(
    platform: &mut Platform,
    runtime: &mut R,
) -> bool {
    platform
        .enable_full_subsystem(runtime)
        .unwrap_or_else(|e| fatal(&e))
}
