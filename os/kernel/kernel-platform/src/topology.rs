//! # CPU topology
//!
//! Assigns dense logical CPU ids to the processors the MADT lists. Logical
//! id 0 always belongs to the boot processor (the one running this code),
//! wherever it appears in the table; all other enabled processors get ids
//! 1, 2, ... in table order.

use crate::PlatformError;
use crate::config::{DiscoveryConfig, MAX_CPUS};
use kernel_acpi::madt::{Madt, MadtEntry};
use log::debug;

/// One processor: logical id, APIC id and where it came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CpuDescriptor {
    id: u32,
    apic_id: u32,
    processor_uid: u32,
    x2apic: bool,
    boot: bool,
}

impl CpuDescriptor {
    const VACANT: Self = Self {
        id: 0,
        apic_id: 0,
        processor_uid: 0,
        x2apic: false,
        boot: false,
    };

    /// Dense logical id, `0..count`.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Hardware (x2)APIC id.
    #[must_use]
    pub const fn apic_id(&self) -> u32 {
        self.apic_id
    }

    /// ACPI processor UID, matching the namespace's processor objects.
    #[must_use]
    pub const fn processor_uid(&self) -> u32 {
        self.processor_uid
    }

    /// Listed by a Local x2APIC record rather than a Local APIC record.
    #[must_use]
    pub const fn is_x2apic(&self) -> bool {
        self.x2apic
    }

    #[must_use]
    pub const fn is_boot(&self) -> bool {
        self.boot
    }
}

/// An enabled processor record, whichever flavor it came in.
struct ProcessorRecord {
    apic_id: u32,
    processor_uid: u32,
    x2apic: bool,
}

impl ProcessorRecord {
    fn from_entry(entry: &MadtEntry) -> Option<Self> {
        match entry {
            MadtEntry::LocalApic(lapic) if lapic.flags.enabled() => Some(Self {
                apic_id: u32::from(lapic.apic_id),
                processor_uid: u32::from(lapic.processor_uid),
                x2apic: false,
            }),
            MadtEntry::LocalX2Apic(x2) if x2.flags.enabled() => Some(Self {
                apic_id: x2.x2apic_id,
                processor_uid: x2.processor_uid,
                x2apic: true,
            }),
            _ => None,
        }
    }
}

/// The complete CPU table.
#[derive(Debug, Clone)]
pub struct CpuTopology {
    cpus: [CpuDescriptor; MAX_CPUS],
    count: usize,
}

impl CpuTopology {
    /// Build the CPU table from the MADT.
    ///
    /// `boot_apic_id` is the APIC id of the running processor, read from its
    /// local APIC.
    ///
    /// # Errors
    /// * [`PlatformError::TooManyCpus`] if more enabled processors are listed
    ///   than the configured capacity.
    /// * [`PlatformError::BootCpuNotFound`] if no enabled record carries
    ///   `boot_apic_id`.
    /// * [`PlatformError::Table`] if the record stream is malformed.
    pub fn discover(
        madt: &Madt,
        boot_apic_id: u32,
        config: &DiscoveryConfig,
    ) -> Result<Self, PlatformError> {
        let capacity = config.max_cpus();

        // Slot 0 is reserved for the boot processor.
        let mut topology = Self {
            cpus: [CpuDescriptor::VACANT; MAX_CPUS],
            count: 1,
        };
        let mut found_boot = false;

        for entry in madt.entries() {
            let Some(record) = ProcessorRecord::from_entry(&entry?) else {
                continue;
            };

            let slot = if record.apic_id == boot_apic_id {
                found_boot = true;
                0
            } else {
                if topology.count == capacity {
                    return Err(PlatformError::TooManyCpus { capacity });
                }
                topology.count += 1;
                topology.count - 1
            };

            #[allow(clippy::cast_possible_truncation)]
            let cpu = CpuDescriptor {
                id: slot as u32,
                apic_id: record.apic_id,
                processor_uid: record.processor_uid,
                x2apic: record.x2apic,
                boot: slot == 0,
            };
            topology.cpus[slot] = cpu;

            if config.verbose() {
                debug!("acpi: CPU {} APICID {}", cpu.id, cpu.apic_id);
            }
        }

        if !found_boot {
            return Err(PlatformError::BootCpuNotFound {
                apic_id: boot_apic_id,
            });
        }
        Ok(topology)
    }

    /// Number of processors, the boot processor included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Always `false`: a topology contains at least the boot processor.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// All processors, indexed by logical id.
    #[must_use]
    pub fn cpus(&self) -> &[CpuDescriptor] {
        &self.cpus[..self.count]
    }

    #[must_use]
    pub const fn boot_cpu(&self) -> &CpuDescriptor {
        &self.cpus[0]
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&CpuDescriptor> {
        self.cpus().get(usize::try_from(id).ok()?)
    }

    /// Look up the processor with the given APIC id.
    #[must_use]
    pub fn by_apic_id(&self, apic_id: u32) -> Option<&CpuDescriptor> {
        self.cpus().iter().find(|c| c.apic_id == apic_id)
    }
}
