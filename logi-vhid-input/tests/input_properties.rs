//! Engine behavior against the in-memory bus model.
//!
//! Each test creates real create/destroy traffic on a `RecordingTransport`
//! and checks the reports that reach the input endpoint.

use std::time::Duration;

use logi_vhid_input::{
    DeviceKind, DeviceLifecycle, InputEngine, KeyboardReport, Modifier, MouseButton, MouseReport,
    Timing, VhidError,
};
use logi_vhid_transport::error::win32;
use logi_vhid_transport::protocol::{ioctl, paths};
use logi_vhid_transport::{shared, RecordingTransport};

fn quick_timing() -> Timing {
    Timing {
        tap_delay: Duration::from_millis(1),
        click_delay: Duration::from_millis(1),
        inter_key_delay: Duration::from_millis(1),
        move_step_delay: Duration::from_millis(1),
    }
}

/// Bus open, `kinds` created, input endpoint open
fn ready_engine(kinds: &[DeviceKind]) -> (RecordingTransport, InputEngine<DeviceLifecycle>) {
    let recorder = RecordingTransport::new();
    let mut lifecycle = DeviceLifecycle::new(shared(recorder.clone()));
    lifecycle.open_bus(paths::BUS_DEVICE_PATH).unwrap();
    for &kind in kinds {
        lifecycle.create(kind).unwrap();
    }
    lifecycle
        .open_input_endpoint(&paths::default_input_paths())
        .unwrap();
    recorder.clear_calls();
    (recorder, InputEngine::new(lifecycle, quick_timing()))
}

#[test]
fn duplicate_key_down_sends_two_identical_reports() {
    let (recorder, mut engine) = ready_engine(&DeviceKind::ALL);
    engine.key_down(0x04).unwrap();
    engine.key_down(0x04).unwrap();

    let expected = [0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
    let calls = recorder.calls_for(ioctl::WRITE_KEYBOARD_REPORT);
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.input == expected));
    assert_eq!(engine.state().pressed_keys(), &[0x04]);
}

#[test]
fn relative_move_is_one_five_byte_report() {
    let (recorder, mut engine) = ready_engine(&DeviceKind::ALL);
    engine.button_down(MouseButton::Left).unwrap();
    recorder.clear_calls();

    engine.move_relative(20, -15).unwrap();
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].opcode, ioctl::WRITE_MOUSE_REPORT);
    assert_eq!(calls[0].input, vec![0x01, 20, 0xF1, 0x00, 0x00]);
    assert_eq!(calls[0].path, paths::input_device_path(1));
}

#[test]
fn shift_click_orders_streams_and_keeps_them_apart() {
    let (recorder, mut engine) = ready_engine(&DeviceKind::ALL);
    engine.modifier_down(Modifier::LeftShift).unwrap();
    engine.click(MouseButton::Left).unwrap();
    engine.modifier_up(Modifier::LeftShift).unwrap();

    let opcodes: Vec<u32> = recorder.calls().iter().map(|c| c.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            ioctl::WRITE_KEYBOARD_REPORT,
            ioctl::WRITE_MOUSE_REPORT,
            ioctl::WRITE_MOUSE_REPORT,
            ioctl::WRITE_KEYBOARD_REPORT,
        ]
    );
    assert_eq!(
        recorder.mouse_reports(),
        vec![MouseReport::buttons_only(0x01), MouseReport::buttons_only(0)]
    );
    assert_eq!(
        recorder.keyboard_reports(),
        vec![
            KeyboardReport::new(0x02, &[]).unwrap(),
            KeyboardReport::released()
        ]
    );
}

#[test]
fn mouse_missing_keyboard_still_works() {
    let recorder = RecordingTransport::new();
    recorder.fail_create(DeviceKind::Mouse, win32::ERROR_INVALID_FUNCTION);
    let mut lifecycle = DeviceLifecycle::new(shared(recorder.clone()));
    lifecycle.open_bus(paths::BUS_DEVICE_PATH).unwrap();
    lifecycle.create(DeviceKind::Keyboard).unwrap();
    assert!(lifecycle.create(DeviceKind::Mouse).is_err());
    lifecycle
        .open_input_endpoint(&paths::default_input_paths())
        .unwrap();

    let mut engine = InputEngine::new(lifecycle, quick_timing());
    assert!(matches!(
        engine.click(MouseButton::Left),
        Err(VhidError::DeviceNotReady(_))
    ));
    engine.key_tap(0x04).unwrap();
    // Reset only touches the keyboard
    engine.reset_state().unwrap();
    assert!(recorder.mouse_reports().is_empty());
    assert_eq!(recorder.keyboard_reports().len(), 3);
}

#[test]
fn reset_twice_produces_identical_traffic() {
    let (recorder, mut engine) = ready_engine(&DeviceKind::ALL);
    engine.key_down(0x2C).unwrap();
    engine.modifier_down(Modifier::RightAlt).unwrap();
    engine.button_down(MouseButton::Middle).unwrap();
    recorder.clear_calls();

    engine.reset_state().unwrap();
    let first = recorder.calls();
    recorder.clear_calls();
    engine.reset_state().unwrap();
    assert_eq!(recorder.calls(), first);
    assert_eq!(first.len(), 2);
    assert!(engine.state().is_idle());
}

#[test]
fn driver_rejection_keeps_previous_state() {
    let (recorder, mut engine) = ready_engine(&DeviceKind::ALL);
    engine.key_down(0x04).unwrap();
    recorder.fail_opcode(ioctl::WRITE_KEYBOARD_REPORT, win32::ERROR_INVALID_PARAMETER);

    let err = engine.key_down(0x05).unwrap_err();
    assert_eq!(err.code(), Some(win32::ERROR_INVALID_PARAMETER));
    assert_eq!(engine.state().pressed_keys(), &[0x04]);
}

#[test]
fn typed_text_matches_tap_sequence() {
    let (recorder, mut engine) = ready_engine(&[DeviceKind::Keyboard]);
    engine.type_text("Hi!").unwrap();
    let reports = recorder.keyboard_reports();
    // H: shift, shift+H, shift, release; i: down, up; !: shift, shift+1, shift, release
    assert_eq!(reports.len(), 10);
    assert_eq!(reports[1], KeyboardReport::new(0x02, &[0x0B]).unwrap());
    assert_eq!(reports[4], KeyboardReport::new(0, &[0x0C]).unwrap());
    assert_eq!(reports[7], KeyboardReport::new(0x02, &[0x1E]).unwrap());
    assert!(reports.last().unwrap().is_released());
}
