mod common;

use common::{RecordingController, Registration, image_with};
use kernel_acpi::builder::MadtBuilder;
use kernel_acpi::{Madt, RootTables, Signature, SubtableFault, TableError};
use kernel_platform::routing::{self, RoutingSummary};
use kernel_platform::{DiscoveryConfig, Irq, PlatformError};

const ACTIVE_LOW_LEVEL: u16 = 0b1111;
const ACTIVE_HIGH_EDGE: u16 = 0b0101;

fn route(madt: &MadtBuilder) -> (Result<RoutingSummary, PlatformError>, RecordingController) {
    let image = image_with(madt);
    let tables = unsafe { RootTables::acquire(&image, image.rsdp_addr()) }.unwrap();
    let madt = Madt::new(tables.find(Signature::MADT, 0).unwrap().unwrap()).unwrap();

    let mut controller = RecordingController::default();
    let result = routing::discover(&madt, &mut controller, &DiscoveryConfig::default());
    (result, controller)
}

#[test]
fn registrations_follow_table_order() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .io_apic(0, 0xFEC0_0000, 0)
        .interrupt_override(0, 0, 2, 0)
        .io_apic(1, 0xFEC0_1000, 24)
        .interrupt_override(0, 9, 9, ACTIVE_LOW_LEVEL)
        .nmi_source(ACTIVE_HIGH_EDGE, 30);

    let (result, controller) = route(&madt);

    assert_eq!(
        result.unwrap(),
        RoutingSummary {
            io_apics: 2,
            overrides: 2,
            nmi_sources: 1
        }
    );
    assert_eq!(
        controller.registrations,
        [
            Registration::Base {
                gsi_base: 0,
                address: 0xFEC0_0000
            },
            Registration::Override {
                isa_line: 0,
                irq: Irq {
                    gsi: 2,
                    active_low: false,
                    level_triggered: false
                }
            },
            Registration::Base {
                gsi_base: 24,
                address: 0xFEC0_1000
            },
            Registration::Override {
                isa_line: 9,
                irq: Irq {
                    gsi: 9,
                    active_low: true,
                    level_triggered: true
                }
            },
            Registration::Nmi(Irq {
                gsi: 30,
                active_low: false,
                level_triggered: false
            }),
        ]
    );
}

#[test]
fn without_io_apic_routing_is_unusable() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .interrupt_override(0, 0, 2, 0);

    let (result, controller) = route(&madt);

    let summary = result.unwrap();
    assert!(!summary.usable());
    assert_eq!(controller.registrations.len(), 1);
}

#[test]
fn local_nmi_records_are_not_routed() {
    let madt = MadtBuilder::new()
        .io_apic(0, 0xFEC0_0000, 0)
        .local_apic_nmi(0xFF, 0, 1)
        .local_x2apic_nmi(0xFFFF_FFFF, 0, 1);

    let (result, controller) = route(&madt);

    assert_eq!(result.unwrap().nmi_sources, 0);
    assert_eq!(controller.registrations.len(), 1);
}

#[test]
fn busless_nmi_source_accepts_default_flags() {
    let madt = MadtBuilder::new()
        .io_apic(0, 0xFEC0_0000, 0)
        .nmi_source(0, 5);

    let (result, controller) = route(&madt);

    assert!(result.unwrap().usable());
    assert_eq!(
        controller.registrations.last(),
        Some(&Registration::Nmi(Irq {
            gsi: 5,
            ..Irq::default()
        }))
    );
}

#[test]
fn bus_default_flags_off_isa_stop_routing() {
    let madt = MadtBuilder::new()
        .io_apic(0, 0xFEC0_0000, 0)
        .interrupt_override(1, 11, 11, 0)
        .interrupt_override(0, 9, 9, 0);

    let (result, controller) = route(&madt);

    assert_eq!(
        result.unwrap_err(),
        PlatformError::AmbiguousBusDefault { bus: 1, flags: 0 }
    );
    assert_eq!(controller.registrations.len(), 1);
}

#[test]
fn unknown_records_are_ignored() {
    let madt = MadtBuilder::new()
        .io_apic(0, 0xFEC0_0000, 0)
        .raw(&[0x7F, 4, 0xAA, 0xBB]);

    let (result, controller) = route(&madt);

    assert_eq!(result.unwrap().io_apics, 1);
    assert_eq!(controller.registrations.len(), 1);
}

#[test]
fn one_byte_record_registers_nothing_after_it() {
    let madt = MadtBuilder::new().raw(&[0x20, 0x01, 0x0C, 0, 0, 0, 0, 0xC0, 0xFE, 0, 0, 0, 0]);

    let (result, controller) = route(&madt);

    assert_eq!(
        result.unwrap_err(),
        PlatformError::Table(TableError::MalformedSubtable {
            offset: 44,
            reason: SubtableFault::TooShort { length: 1 },
        })
    );
    assert!(controller.registrations.is_empty());
}
