//! Session lifecycle against the in-memory bus model.

use logi_vhid::transport::error::win32;
use logi_vhid::transport::protocol::{ioctl, paths};
use logi_vhid::transport::{shared, RecordingTransport};
use logi_vhid::{
    DeviceKind, Modifier, MouseButton, MouseReport, ResultCode, Session, SessionState, VhidConfig,
    VhidError,
};

fn quick_config() -> VhidConfig {
    let mut config = VhidConfig::default();
    config.timing.settle_delay_ms = 1;
    config.timing.tap_delay_ms = 1;
    config.timing.click_delay_ms = 1;
    config.timing.inter_key_delay_ms = 1;
    config
}

fn session_with(recorder: &RecordingTransport) -> Session {
    Session::new(shared(recorder.clone()), &quick_config())
}

#[test]
fn full_lifecycle() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.initialize().unwrap();
    assert_eq!(session.state(), SessionState::Initialized);

    session.power_on().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.devices_created());

    session.key_tap(0x04).unwrap();
    session.power_off().unwrap();
    assert_eq!(session.state(), SessionState::PoweredOff);
    assert!(!session.devices_created());
    assert!(recorder.live_devices().is_empty());

    session.cleanup();
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(recorder.open_handles(), 0);
}

#[test]
fn create_packets_reach_the_bus() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();

    let creates = recorder.calls_for(ioctl::BUS_CREATE_DEVICE);
    assert_eq!(creates.len(), 2);
    assert!(creates.iter().all(|c| c.path == paths::BUS_DEVICE_PATH));
    assert_eq!(creates[0].input.len(), 246);
    assert_eq!(creates[1].input.len(), 254);
}

#[test]
fn mouse_creation_failure_leaves_keyboard_usable() {
    let recorder = RecordingTransport::new();
    recorder.fail_create(DeviceKind::Mouse, win32::ERROR_INVALID_FUNCTION);
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_present(DeviceKind::Keyboard));
    assert!(!session.is_present(DeviceKind::Mouse));
    assert!(session.last_error().is_some());

    assert!(matches!(
        session.move_relative(1, 1),
        Err(VhidError::DeviceNotReady(_))
    ));
    assert_eq!(
        session.status(|s| s.click(MouseButton::Left)),
        ResultCode::DeviceNotFound
    );
    session.type_text("ok").unwrap();
    assert_eq!(recorder.keyboard_reports().len(), 4);
}

#[test]
fn both_creations_failing_keeps_initialized() {
    let recorder = RecordingTransport::new();
    recorder.fail_opcode(ioctl::BUS_CREATE_DEVICE, win32::ERROR_INVALID_FUNCTION);
    let mut session = session_with(&recorder);
    session.initialize().unwrap();

    let err = session.power_on().unwrap_err();
    assert_eq!(
        err,
        VhidError::DeviceCreationFailed {
            kind: DeviceKind::Keyboard,
            code: win32::ERROR_INVALID_FUNCTION
        }
    );
    assert_eq!(session.state(), SessionState::Initialized);

    recorder.clear_failures();
    session.power_on().unwrap();
    assert!(session.is_ready());
}

#[test]
fn missing_input_endpoint_stays_powered_on() {
    let recorder = RecordingTransport::new();
    for path in paths::default_input_paths() {
        recorder.set_unavailable(&path);
    }
    let mut session = session_with(&recorder);
    session.initialize().unwrap();

    assert!(matches!(
        session.power_on(),
        Err(VhidError::DeviceUnavailable { .. })
    ));
    assert_eq!(session.state(), SessionState::PoweredOn);
    assert_eq!(session.key_tap(0x04), Err(VhidError::NotInitialized));

    // Teardown still destroys what was created
    session.power_off().unwrap();
    assert!(recorder.live_devices().is_empty());
}

#[test]
fn power_off_releases_held_input_first() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();
    session.modifier_down(Modifier::LeftCtrl).unwrap();
    session.button_down(MouseButton::Right).unwrap();
    recorder.clear_calls();

    session.power_off().unwrap();
    let opcodes: Vec<u32> = recorder.calls().iter().map(|c| c.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            ioctl::WRITE_KEYBOARD_REPORT,
            ioctl::WRITE_MOUSE_REPORT,
            ioctl::BUS_DESTROY_DEVICE,
            ioctl::BUS_DESTROY_DEVICE,
        ]
    );
    assert_eq!(recorder.mouse_reports(), vec![MouseReport::default()]);
    assert!(session.input_state().is_idle());
}

#[test]
fn destroy_failure_is_reported_but_teardown_completes() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();
    recorder.fail_opcode(ioctl::BUS_DESTROY_DEVICE, win32::ERROR_NOT_FOUND);

    assert!(matches!(
        session.power_off(),
        Err(VhidError::DeviceDestructionFailed { .. })
    ));
    assert_eq!(session.state(), SessionState::PoweredOff);
    assert!(!session.devices_created());
}

#[test]
fn cleanup_is_safe_from_every_state() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    session.cleanup();
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.initialize().unwrap();
    session.cleanup();
    session.initialize().unwrap();
    session.power_on().unwrap();
    session.cleanup();
    session.cleanup();
    assert_eq!(recorder.open_handles(), 0);
    assert!(recorder.live_devices().is_empty());
}

#[test]
fn missing_driver_reports_device_not_found() {
    let recorder = RecordingTransport::new();
    recorder.set_unavailable(paths::BUS_DEVICE_PATH);
    let mut session = session_with(&recorder);
    assert_eq!(
        session.status(|s| s.initialize()),
        ResultCode::DeviceNotFound
    );
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn shared_session_across_threads() {
    let recorder = RecordingTransport::new();
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();
    let shared = session.into_shared();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = shared.clone();
            std::thread::spawn(move || shared.lock().move_relative(i, -i))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }
    assert_eq!(recorder.mouse_reports().len(), 4);
}

#[test]
fn power_on_adopts_devices_left_on_the_bus() {
    let recorder = RecordingTransport::new();
    let leftover = recorder.plant_device(DeviceKind::Keyboard);
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();

    // Only the mouse needed a create
    let creates = recorder.calls_for(ioctl::BUS_CREATE_DEVICE);
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].input.len(), 254);

    session.key_tap(0x04).unwrap();
    session.power_off().unwrap();
    assert!(recorder.live_devices().is_empty());
    let destroys = recorder.calls_for(ioctl::BUS_DESTROY_DEVICE);
    assert_eq!(&destroys[0].input[4..8], &leftover.to_le_bytes());
}

#[test]
fn adoption_can_be_turned_off() {
    let recorder = RecordingTransport::new();
    let leftover = recorder.plant_device(DeviceKind::Mouse);
    let mut config = quick_config();
    config.adopt_existing = false;
    let mut session = Session::new(shared(recorder.clone()), &config);
    session.initialize().unwrap();
    session.power_on().unwrap();
    assert_eq!(recorder.calls_for(ioctl::BUS_CREATE_DEVICE).len(), 2);

    session.cleanup();
    assert_eq!(recorder.live_devices(), vec![(leftover, DeviceKind::Mouse)]);
}

#[test]
fn orphans_are_destroyed_without_touching_session_devices() {
    let recorder = RecordingTransport::new();
    let mut config = quick_config();
    config.adopt_existing = false;
    let mut session = Session::new(shared(recorder.clone()), &config);
    assert_eq!(session.destroy_orphans(false), Err(VhidError::NotInitialized));

    session.initialize().unwrap();
    session.power_on().unwrap();
    recorder.plant_device(DeviceKind::Mouse);
    let foreign = recorder.plant_foreign(0xC22F);

    assert_eq!(session.destroy_orphans(false).unwrap(), 1);
    assert_eq!(recorder.live_devices().len(), 2);
    assert_eq!(recorder.foreign_devices(), vec![foreign]);
    session.move_relative(3, 3).unwrap();
}

#[test]
fn lost_create_responses_do_not_strand_devices() {
    let recorder = RecordingTransport::new();
    recorder.silence_create_responses(true);
    let mut session = session_with(&recorder);
    session.initialize().unwrap();
    session.power_on().unwrap();
    assert!(session.is_present(DeviceKind::Keyboard));
    assert!(session.is_present(DeviceKind::Mouse));

    session.cleanup();
    assert!(recorder.live_devices().is_empty());
}
