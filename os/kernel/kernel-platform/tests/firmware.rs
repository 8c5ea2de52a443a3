mod common;

use common::{Call, MockFirmware};
use kernel_platform::firmware::{
    self, FirmwareStatus, FirmwareValue, INTERRUPT_MODEL_METHOD, InterruptModel, Stage,
};
use kernel_platform::PlatformError;

#[test]
fn bring_up_runs_every_stage_in_order() {
    let mut runtime = MockFirmware::default();

    firmware::bring_up(&mut runtime).unwrap();

    assert_eq!(
        runtime.calls(),
        [
            Call::InitializeSubsystem,
            Call::LoadTables,
            Call::EnableSubsystem,
            Call::InitializeObjects,
            Call::Evaluate {
                scope: None,
                path: INTERRUPT_MODEL_METHOD.to_string(),
                args: vec![FirmwareValue::Integer(InterruptModel::Apic as u64)],
            },
        ]
    );
}

#[test]
fn bring_up_stops_at_the_first_failure() {
    let mut runtime = MockFirmware::failing_at(Stage::LoadTables, FirmwareStatus::NoTables);

    let err = firmware::bring_up(&mut runtime).unwrap_err();

    assert_eq!(
        err,
        PlatformError::Firmware {
            stage: Stage::LoadTables,
            status: FirmwareStatus::NoTables
        }
    );
    assert_eq!(runtime.calls(), [Call::InitializeSubsystem, Call::LoadTables]);
}

#[test]
fn not_found_is_fatal_outside_pic() {
    let mut runtime =
        MockFirmware::failing_at(Stage::InitializeObjects, FirmwareStatus::NotFound);

    assert!(matches!(
        firmware::bring_up(&mut runtime),
        Err(PlatformError::Firmware {
            stage: Stage::InitializeObjects,
            status: FirmwareStatus::NotFound
        })
    ));
}

#[test]
fn missing_pic_method_is_tolerated() {
    let runtime = MockFirmware {
        pic: Err(FirmwareStatus::NotFound),
        ..MockFirmware::default()
    };

    assert_eq!(
        firmware::declare_interrupt_model(&runtime, InterruptModel::Apic),
        Ok(false)
    );

    let mut runtime = runtime;
    assert!(firmware::bring_up(&mut runtime).is_ok());
}

#[test]
fn failing_pic_method_is_fatal() {
    let mut runtime = MockFirmware {
        pic: Err(FirmwareStatus::Aml(0x3006)),
        ..MockFirmware::default()
    };

    assert_eq!(
        firmware::bring_up(&mut runtime),
        Err(PlatformError::Firmware {
            stage: Stage::DeclareInterruptModel,
            status: FirmwareStatus::Aml(0x3006)
        })
    );
}

#[test]
fn declared_model_is_passed_as_integer() {
    let runtime = MockFirmware::default();

    assert_eq!(
        firmware::declare_interrupt_model(&runtime, InterruptModel::Pic),
        Ok(true)
    );
    assert_eq!(
        runtime.calls(),
        [Call::Evaluate {
            scope: None,
            path: INTERRUPT_MODEL_METHOD.to_string(),
            args: vec![FirmwareValue::Integer(0)],
        }]
    );
}
