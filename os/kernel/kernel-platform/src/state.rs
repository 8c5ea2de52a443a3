//! # Firmware subsystem state

/// Lifecycle of the firmware subsystem during boot.
///
/// Both flags start out clear and are only ever set. The subsystem can only
/// be enabled once the root tables are available.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FirmwareSubsystemState {
    tables_available: bool,
    subsystem_enabled: bool,
}

impl FirmwareSubsystemState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables_available: false,
            subsystem_enabled: false,
        }
    }

    /// The root tables were located and validated.
    #[must_use]
    pub const fn tables_available(&self) -> bool {
        self.tables_available
    }

    /// The AML runtime completed bring-up.
    #[must_use]
    pub const fn subsystem_enabled(&self) -> bool {
        self.subsystem_enabled
    }

    pub(crate) const fn mark_tables_available(&mut self) {
        self.tables_available = true;
    }

    pub(crate) fn mark_subsystem_enabled(&mut self) {
        debug_assert!(
            self.tables_available,
            "firmware subsystem enabled without root tables"
        );
        self.subsystem_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_advance() {
        let mut state = FirmwareSubsystemState::new();
        assert!(!state.tables_available());
        assert!(!state.subsystem_enabled());

        state.mark_tables_available();
        state.mark_subsystem_enabled();
        assert!(state.tables_available());
        assert!(state.subsystem_enabled());
    }

    #[test]
    #[should_panic(expected = "without root tables")]
    fn enabling_requires_tables() {
        let mut state = FirmwareSubsystemState::new();
        state.mark_subsystem_enabled();
    }
}
