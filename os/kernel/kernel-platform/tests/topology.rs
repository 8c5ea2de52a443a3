mod common;

use common::image_with;
use kernel_acpi::builder::MadtBuilder;
use kernel_acpi::{Madt, RootTables, Signature, SubtableFault, TableError};
use kernel_platform::{CpuTopology, DiscoveryConfig, MAX_CPUS, PlatformError};

fn discover(
    madt: &MadtBuilder,
    boot: u32,
    config: &DiscoveryConfig,
) -> Result<CpuTopology, PlatformError> {
    let image = image_with(madt);
    let tables = unsafe { RootTables::acquire(&image, image.rsdp_addr()) }.unwrap();
    let handle = tables.find(Signature::MADT, 0).unwrap().unwrap();
    CpuTopology::discover(&Madt::new(handle).unwrap(), boot, config)
}

#[test]
fn boot_processor_gets_id_zero_wherever_it_is_listed() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_apic(1, 2, true)
        .local_apic(2, 4, true)
        .local_apic(3, 6, true);

    let topo = discover(&madt, 4, &DiscoveryConfig::default()).unwrap();

    assert_eq!(topo.len(), 4);
    let boot = topo.boot_cpu();
    assert_eq!(boot.id(), 0);
    assert_eq!(boot.apic_id(), 4);
    assert!(boot.is_boot());

    let ids: Vec<_> = topo.cpus().iter().map(|c| (c.id(), c.apic_id())).collect();
    assert_eq!(ids, [(0, 4), (1, 0), (2, 2), (3, 6)]);
    assert_eq!(topo.cpus().iter().filter(|c| c.is_boot()).count(), 1);
}

#[test]
fn disabled_processors_are_skipped() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_apic(1, 1, false)
        .local_apic(2, 2, true);

    let topo = discover(&madt, 0, &DiscoveryConfig::default()).unwrap();

    assert_eq!(topo.len(), 2);
    assert!(topo.by_apic_id(1).is_none());
    assert_eq!(topo.by_apic_id(2).map(|c| c.id()), Some(1));
}

#[test]
fn x2apic_records_count_as_processors() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_x2apic(0x100, 0x1_0000, true)
        .local_x2apic(0x101, 0x1_0001, false);

    let topo = discover(&madt, 0, &DiscoveryConfig::default()).unwrap();

    assert_eq!(topo.len(), 2);
    let cpu = topo.get(1).unwrap();
    assert_eq!(cpu.apic_id(), 0x1_0000);
    assert_eq!(cpu.processor_uid(), 0x100);
    assert!(cpu.is_x2apic());
    assert!(!topo.boot_cpu().is_x2apic());
}

#[test]
fn boot_processor_may_be_an_x2apic() {
    let madt = MadtBuilder::new()
        .local_apic(0, 1, true)
        .local_x2apic(7, 300, true);

    let topo = discover(&madt, 300, &DiscoveryConfig::default()).unwrap();

    assert_eq!(topo.boot_cpu().apic_id(), 300);
    assert_eq!(topo.boot_cpu().processor_uid(), 7);
    assert_eq!(topo.get(1).map(|c| c.apic_id()), Some(1));
}

#[test]
fn ids_are_dense_for_a_full_table() {
    let mut madt = MadtBuilder::new();
    for apic_id in 0..=u8::MAX {
        madt = madt.local_apic(apic_id, apic_id, true);
    }

    let topo = discover(&madt, 17, &DiscoveryConfig::default()).unwrap();

    assert_eq!(topo.len(), MAX_CPUS);
    for (index, cpu) in topo.cpus().iter().enumerate() {
        assert_eq!(cpu.id() as usize, index);
    }
    assert_eq!(topo.boot_cpu().apic_id(), 17);
}

#[test]
fn missing_boot_processor_is_an_error() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_apic(1, 1, true)
        .local_apic(2, 2, false);

    let err = discover(&madt, 2, &DiscoveryConfig::default()).unwrap_err();
    assert_eq!(err, PlatformError::BootCpuNotFound { apic_id: 2 });
}

#[test]
fn too_many_processors_is_an_error() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_apic(1, 1, true)
        .local_apic(2, 2, true);
    let config = DiscoveryConfig::default().with_max_cpus(2);

    let err = discover(&madt, 0, &config).unwrap_err();
    assert_eq!(err, PlatformError::TooManyCpus { capacity: 2 });
}

#[test]
fn capacity_leaves_room_for_a_late_boot_processor() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .local_apic(1, 1, true);
    let config = DiscoveryConfig::default().with_max_cpus(2);

    let topo = discover(&madt, 1, &config).unwrap();
    assert_eq!(topo.len(), 2);
}

#[test]
fn malformed_record_stream_is_an_error() {
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .raw(&[0x7F, 0]);

    let err = discover(&madt, 0, &DiscoveryConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PlatformError::Table(TableError::MalformedSubtable {
            reason: SubtableFault::TooShort { length: 0 },
            ..
        })
    ));
}

#[test]
fn one_byte_record_is_an_error() {
    // Stepping one byte would decode the length byte as an I/O APIC record.
    let madt = MadtBuilder::new()
        .local_apic(0, 0, true)
        .raw(&[0x20, 0x01, 0x0C, 0, 0, 0, 0, 0xC0, 0xFE, 0, 0, 0, 0]);

    let err = discover(&madt, 0, &DiscoveryConfig::default()).unwrap_err();
    assert_eq!(
        err,
        PlatformError::Table(TableError::MalformedSubtable {
            offset: 52,
            reason: SubtableFault::TooShort { length: 1 },
        })
    );
}
