//! # Discovery configuration

pub use kernel_acpi::ROOT_TABLE_CAPACITY;

/// Capacity of the CPU table. Platforms with more enabled processors
/// cannot be represented and fail discovery.
pub const MAX_CPUS: usize = 256;

/// Runtime knobs for platform discovery.
///
/// The processor limit can only narrow [`MAX_CPUS`], never widen it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    max_cpus: usize,
    verbose: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryConfig {
    /// Full capacity, verbose per-record logging.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_cpus: MAX_CPUS,
            verbose: true,
        }
    }

    /// Limit the number of processors, clamped to `1..=MAX_CPUS`.
    #[must_use]
    pub const fn with_max_cpus(mut self, max_cpus: usize) -> Self {
        self.max_cpus = if max_cpus == 0 {
            1
        } else if max_cpus > MAX_CPUS {
            MAX_CPUS
        } else {
            max_cpus
        };
        self
    }

    /// Log one line per discovered CPU, I/O APIC, override and NMI.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub const fn max_cpus(&self) -> usize {
        self.max_cpus
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_limit_is_clamped() {
        assert_eq!(DiscoveryConfig::new().max_cpus(), MAX_CPUS);
        assert_eq!(DiscoveryConfig::new().with_max_cpus(0).max_cpus(), 1);
        assert_eq!(DiscoveryConfig::new().with_max_cpus(4).max_cpus(), 4);
        assert_eq!(
            DiscoveryConfig::new().with_max_cpus(MAX_CPUS + 1).max_cpus(),
            MAX_CPUS
        );
    }
}
