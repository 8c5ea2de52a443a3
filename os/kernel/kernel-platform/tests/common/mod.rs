#![allow(dead_code)]

use kernel_acpi::builder::{FirmwareImage, MadtBuilder};
use kernel_platform::firmware::{
    FirmwareRuntime, FirmwareStatus, FirmwareValue, INTERRUPT_MODEL_METHOD, Stage, WalkControl,
};
use kernel_platform::pci::{BASE_BUS_METHOD, PCI_ROOT_HID};
use kernel_platform::routing::{InterruptController, Irq};
use std::cell::RefCell;

/// A firmware image whose only table is `madt`.
pub fn image_with(madt: &MadtBuilder) -> FirmwareImage {
    FirmwareImage::builder().table(madt.build()).build()
}

/// Everything the controller was told, in order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Registration {
    Base { gsi_base: u32, address: u32 },
    Override { isa_line: u8, irq: Irq },
    Nmi(Irq),
}

#[derive(Debug, Default)]
pub struct RecordingController {
    pub registrations: Vec<Registration>,
}

impl InterruptController for RecordingController {
    fn register_base(&mut self, gsi_base: u32, address: u32) {
        self.registrations
            .push(Registration::Base { gsi_base, address });
    }

    fn register_isa_irq_override(&mut self, isa_line: u8, irq: Irq) {
        self.registrations
            .push(Registration::Override { isa_line, irq });
    }

    fn register_nmi(&mut self, irq: Irq) {
        self.registrations.push(Registration::Nmi(irq));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    InitializeSubsystem,
    LoadTables,
    EnableSubsystem,
    InitializeObjects,
    Evaluate {
        scope: Option<u32>,
        path: String,
        args: Vec<FirmwareValue>,
    },
    Walk(String),
}

pub type Outcome = Result<Option<FirmwareValue>, FirmwareStatus>;

/// A scripted AML runtime. Namespace handles are plain integers.
#[derive(Debug)]
pub struct MockFirmware {
    pub calls: RefCell<Vec<Call>>,
    /// Bring-up step that fails, and how.
    pub failing: Option<(Stage, FirmwareStatus)>,
    /// Result of `\_PIC`.
    pub pic: Outcome,
    /// PCI root bridges with the result of their `_BBN`.
    pub roots: Vec<(u32, Outcome)>,
    pub walk_status: Result<(), FirmwareStatus>,
}

impl Default for MockFirmware {
    fn default() -> Self {
        Self {
            calls: RefCell::default(),
            failing: None,
            pic: Ok(None),
            roots: Vec::new(),
            walk_status: Ok(()),
        }
    }
}

impl MockFirmware {
    pub fn with_roots(roots: Vec<(u32, Outcome)>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn failing_at(stage: Stage, status: FirmwareStatus) -> Self {
        Self {
            failing: Some((stage, status)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn step(&self, stage: Stage, call: Call) -> Result<(), FirmwareStatus> {
        self.calls.borrow_mut().push(call);
        match self.failing {
            Some((failing, status)) if failing == stage => Err(status),
            _ => Ok(()),
        }
    }
}

impl FirmwareRuntime for MockFirmware {
    type Handle = u32;

    fn initialize_subsystem(&mut self) -> Result<(), FirmwareStatus> {
        self.step(Stage::InitializeSubsystem, Call::InitializeSubsystem)
    }

    fn load_tables(&mut self) -> Result<(), FirmwareStatus> {
        self.step(Stage::LoadTables, Call::LoadTables)
    }

    fn enable_subsystem(&mut self) -> Result<(), FirmwareStatus> {
        self.step(Stage::EnableSubsystem, Call::EnableSubsystem)
    }

    fn initialize_objects(&mut self) -> Result<(), FirmwareStatus> {
        self.step(Stage::InitializeObjects, Call::InitializeObjects)
    }

    fn evaluate(
        &self,
        scope: Option<u32>,
        path: &str,
        args: &[FirmwareValue],
    ) -> Result<Option<FirmwareValue>, FirmwareStatus> {
        self.calls.borrow_mut().push(Call::Evaluate {
            scope,
            path: path.to_string(),
            args: args.to_vec(),
        });

        match (scope, path) {
            (None, INTERRUPT_MODEL_METHOD) => self.pic,
            (Some(handle), BASE_BUS_METHOD) => self
                .roots
                .iter()
                .find(|(h, _)| *h == handle)
                .map_or(Err(FirmwareStatus::NotFound), |(_, outcome)| *outcome),
            _ => Err(FirmwareStatus::NotFound),
        }
    }

    fn walk_devices(
        &self,
        hid: &str,
        visit: &mut dyn FnMut(u32) -> WalkControl,
    ) -> Result<(), FirmwareStatus> {
        self.calls.borrow_mut().push(Call::Walk(hid.to_string()));
        if hid == PCI_ROOT_HID {
            for &(handle, _) in &self.roots {
                if visit(handle) == WalkControl::Stop {
                    break;
                }
            }
        }
        self.walk_status
    }
}
