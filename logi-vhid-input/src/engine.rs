//! Input state engine
//!
//! Owns the authoritative record of what is held down and turns intents
//! (press, release, tap, click, move, wheel, type) into full HID reports.
//!
//! The mirrored state always equals the last report the sink accepted:
//! a new report is built from a copy, sent, and only then committed.

use std::thread;
use std::time::Duration;

use logi_vhid_transport::protocol::MAX_PRESSED_KEYS;
use logi_vhid_transport::{
    DeviceKind, KeyboardReport, Modifier, MouseButton, MouseReport, BUTTON_MASK,
};
use tracing::debug;

use crate::error::VhidError;
use crate::hid_codes::{char_to_hid, is_modifier_usage};
use crate::sink::ReportSink;

/// Largest per-report motion or wheel magnitude the descriptor allows
pub const MAX_STEP: i32 = 127;

/// Delays between paired reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Between key down and key up in `key_tap`
    pub tap_delay: Duration,
    /// Between button down and button up in `click`
    pub click_delay: Duration,
    /// Between characters in `type_text`
    pub inter_key_delay: Duration,
    /// Between reports of a multi-step `move_absolute`
    pub move_step_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tap_delay: Duration::from_millis(10),
            click_delay: Duration::from_millis(10),
            inter_key_delay: Duration::from_millis(5),
            move_step_delay: Duration::from_millis(1),
        }
    }
}

impl Timing {
    /// Same timing with every zero delay raised to 1 ms
    pub fn normalized(self) -> Self {
        let floor = |d: Duration| d.max(Duration::from_millis(1));
        Self {
            tap_delay: floor(self.tap_delay),
            click_delay: floor(self.click_delay),
            inter_key_delay: floor(self.inter_key_delay),
            move_step_delay: floor(self.move_step_delay),
        }
    }
}

/// Screen size used to plan absolute moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenBounds {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenBounds {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Snapshot of everything currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    keyboard: KeyboardReport,
    buttons: u8,
}

impl InputState {
    /// Held non-modifier keys, oldest first
    pub fn pressed_keys(&self) -> &[u8] {
        self.keyboard.keys()
    }

    pub fn modifiers(&self) -> u8 {
        self.keyboard.modifiers
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn is_key_pressed(&self, code: u8) -> bool {
        self.pressed_keys().contains(&code)
    }

    pub fn is_modifier_held(&self, modifier: Modifier) -> bool {
        self.modifiers() & modifier.mask() != 0
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Keyboard report matching this state
    pub fn keyboard_report(&self) -> KeyboardReport {
        self.keyboard
    }

    /// Nothing held on either device
    pub fn is_idle(&self) -> bool {
        self.keyboard.is_released() && self.buttons == 0
    }
}

fn check_step(what: &str, value: i32) -> Result<i8, VhidError> {
    if (-MAX_STEP..=MAX_STEP).contains(&value) {
        Ok(value as i8)
    } else {
        Err(VhidError::invalid(format!(
            "{what} {value} outside [-{MAX_STEP}, {MAX_STEP}]"
        )))
    }
}

fn check_key(code: u8) -> Result<(), VhidError> {
    if code == 0 {
        return Err(VhidError::invalid("key code 0 is reserved"));
    }
    Ok(())
}

/// Turns input intents into reports on a `ReportSink`
pub struct InputEngine<S> {
    sink: S,
    state: InputState,
    timing: Timing,
    screen: ScreenBounds,
}

impl<S: ReportSink> InputEngine<S> {
    pub fn new(sink: S, timing: Timing) -> Self {
        Self {
            sink,
            state: InputState::default(),
            timing: timing.normalized(),
            screen: ScreenBounds::default(),
        }
    }

    pub fn with_screen(mut self, screen: ScreenBounds) -> Self {
        self.screen = screen;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn screen(&self) -> ScreenBounds {
        self.screen
    }

    /// Forget the held state without sending anything (devices are gone)
    pub fn discard_state(&mut self) {
        self.state = InputState::default();
    }

    fn require(&self, kind: DeviceKind) -> Result<(), VhidError> {
        if self.sink.is_ready(kind) {
            Ok(())
        } else {
            Err(VhidError::not_ready(kind))
        }
    }

    fn commit_keyboard(&mut self, report: KeyboardReport) -> Result<(), VhidError> {
        self.require(DeviceKind::Keyboard)?;
        self.sink.send_keyboard(&report)?;
        self.state.keyboard = report;
        Ok(())
    }

    fn commit_mouse(&mut self, report: MouseReport) -> Result<(), VhidError> {
        self.require(DeviceKind::Mouse)?;
        self.sink.send_mouse(&report)?;
        self.state.buttons = report.buttons;
        Ok(())
    }

    fn keyboard_with(&self, modifiers: u8, keys: &[u8]) -> Result<KeyboardReport, VhidError> {
        KeyboardReport::new(modifiers, keys).map_err(VhidError::from)
    }

    // Mouse

    /// One relative motion report with the held buttons
    pub fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), VhidError> {
        let dx = check_step("dx", dx)?;
        let dy = check_step("dy", dy)?;
        self.commit_mouse(MouseReport::new(self.state.buttons, dx, dy, 0))
    }

    /// Approximate absolute positioning
    ///
    /// Sweeps the pointer into the top-left corner, then walks to (x, y) in
    /// steps of at most 127. Pointer acceleration makes the landing point
    /// approximate.
    pub fn move_absolute(&mut self, x: u32, y: u32) -> Result<(), VhidError> {
        if x >= self.screen.width || y >= self.screen.height {
            return Err(VhidError::invalid(format!(
                "({x}, {y}) outside {}x{} screen",
                self.screen.width, self.screen.height
            )));
        }
        self.require(DeviceKind::Mouse)?;

        let span = self.screen.width.max(self.screen.height);
        let homing = span.div_ceil(MAX_STEP as u32);
        debug!("Absolute move to ({}, {}): {} homing steps", x, y, homing);
        for _ in 0..homing {
            self.move_relative(-MAX_STEP, -MAX_STEP)?;
            thread::sleep(self.timing.move_step_delay);
        }

        let (mut rem_x, mut rem_y) = (x as i32, y as i32);
        while rem_x > 0 || rem_y > 0 {
            let sx = rem_x.min(MAX_STEP);
            let sy = rem_y.min(MAX_STEP);
            self.move_relative(sx, sy)?;
            rem_x -= sx;
            rem_y -= sy;
            thread::sleep(self.timing.move_step_delay);
        }
        Ok(())
    }

    pub fn button_down(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.commit_mouse(MouseReport::buttons_only(self.state.buttons | button.mask()))
    }

    pub fn button_up(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.commit_mouse(MouseReport::buttons_only(self.state.buttons & !button.mask()))
    }

    /// Press, hold for `click_delay`, release
    pub fn click(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.button_down(button)?;
        thread::sleep(self.timing.click_delay);
        self.button_up(button)
    }

    pub fn wheel(&mut self, delta: i32) -> Result<(), VhidError> {
        let delta = check_step("wheel delta", delta)?;
        self.commit_mouse(MouseReport::new(self.state.buttons, 0, 0, delta))
    }

    // Keyboard

    /// Hold a key (modifier usages 0xE0-0xE7 set their modifier bit)
    ///
    /// A key already held is resent, not added twice. A seventh distinct key
    /// is rejected.
    pub fn key_down(&mut self, code: u8) -> Result<(), VhidError> {
        check_key(code)?;
        if let Some(modifier) = Modifier::from_usage(code) {
            return self.modifier_down(modifier);
        }
        let mut keys = self.state.pressed_keys().to_vec();
        if !keys.contains(&code) {
            if keys.len() >= MAX_PRESSED_KEYS {
                return Err(VhidError::invalid(format!(
                    "cannot hold key 0x{code:02X}: {MAX_PRESSED_KEYS} keys already held"
                )));
            }
            keys.push(code);
        }
        let report = self.keyboard_with(self.state.modifiers(), &keys)?;
        self.commit_keyboard(report)
    }

    pub fn key_up(&mut self, code: u8) -> Result<(), VhidError> {
        check_key(code)?;
        if let Some(modifier) = Modifier::from_usage(code) {
            return self.modifier_up(modifier);
        }
        let keys: Vec<u8> = self
            .state
            .pressed_keys()
            .iter()
            .copied()
            .filter(|&k| k != code)
            .collect();
        let report = self.keyboard_with(self.state.modifiers(), &keys)?;
        self.commit_keyboard(report)
    }

    pub fn modifier_down(&mut self, modifier: Modifier) -> Result<(), VhidError> {
        let report = self.keyboard_with(
            self.state.modifiers() | modifier.mask(),
            self.state.pressed_keys(),
        )?;
        self.commit_keyboard(report)
    }

    pub fn modifier_up(&mut self, modifier: Modifier) -> Result<(), VhidError> {
        let report = self.keyboard_with(
            self.state.modifiers() & !modifier.mask(),
            self.state.pressed_keys(),
        )?;
        self.commit_keyboard(report)
    }

    /// Press, hold for `tap_delay`, release
    pub fn key_tap(&mut self, code: u8) -> Result<(), VhidError> {
        self.key_down(code)?;
        thread::sleep(self.timing.tap_delay);
        self.key_up(code)
    }

    /// Type a string as a sequence of taps (US layout)
    ///
    /// Every character, and the room to tap it, is checked before anything is
    /// sent. Shifted characters are wrapped in Left Shift unless a Shift is
    /// already held; a Shift added here is released even when the tap fails.
    pub fn type_text(&mut self, text: &str) -> Result<(), VhidError> {
        let plan = text
            .chars()
            .map(|ch| {
                char_to_hid(ch)
                    .ok_or_else(|| VhidError::invalid(format!("cannot type {ch:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.require(DeviceKind::Keyboard)?;
        if plan.is_empty() {
            return Ok(());
        }

        let held = self.state.pressed_keys();
        if let Some(&(code, _)) = plan.iter().find(|(code, _)| held.contains(code)) {
            return Err(VhidError::invalid(format!(
                "cannot type key 0x{code:02X} while it is held"
            )));
        }
        if held.len() >= MAX_PRESSED_KEYS {
            return Err(VhidError::invalid(format!(
                "cannot type: {MAX_PRESSED_KEYS} keys already held"
            )));
        }
        debug!("Typing {} characters", plan.len());

        for (i, (code, shifted)) in plan.into_iter().enumerate() {
            if i > 0 {
                thread::sleep(self.timing.inter_key_delay);
            }
            let shift_held = self.state.is_modifier_held(Modifier::LeftShift)
                || self.state.is_modifier_held(Modifier::RightShift);
            if shifted && !shift_held {
                self.modifier_down(Modifier::LeftShift)?;
                let tapped = self.key_tap(code);
                let released = self.modifier_up(Modifier::LeftShift);
                tapped.and(released)?;
            } else {
                self.key_tap(code)?;
            }
        }
        Ok(())
    }

    /// Release every key, modifier and button on each present device
    ///
    /// Idempotent. Both devices are attempted; the first failure is returned.
    pub fn reset_state(&mut self) -> Result<(), VhidError> {
        let keyboard = self.sink.is_ready(DeviceKind::Keyboard);
        let mouse = self.sink.is_ready(DeviceKind::Mouse);
        if !keyboard && !mouse {
            return Err(VhidError::DeviceNotReady(
                "no virtual device is present".to_string(),
            ));
        }
        let mut first = None;
        if keyboard {
            if let Err(e) = self.commit_keyboard(KeyboardReport::released()) {
                first.get_or_insert(e);
            }
        }
        if mouse {
            if let Err(e) = self.commit_mouse(MouseReport::default()) {
                first.get_or_insert(e);
            }
        }
        debug!("Input state reset");
        first.map_or(Ok(()), Err)
    }

    // Raw reports

    /// Send a caller-built keyboard report and adopt it as the held state
    pub fn send_keyboard_report(&mut self, report: &KeyboardReport) -> Result<(), VhidError> {
        if let Some(&code) = report.keys().iter().find(|&&k| is_modifier_usage(k)) {
            return Err(VhidError::invalid(format!(
                "modifier usage 0x{code:02X} belongs in the modifier byte"
            )));
        }
        self.commit_keyboard(*report)
    }

    /// Send a caller-built mouse report and adopt its buttons as held
    pub fn send_mouse_report(&mut self, report: &MouseReport) -> Result<(), VhidError> {
        if report.buttons & !BUTTON_MASK != 0 {
            return Err(VhidError::invalid(format!(
                "button mask 0x{:02X} has undefined bits",
                report.buttons
            )));
        }
        check_step("dx", report.dx as i32)?;
        check_step("dy", report.dy as i32)?;
        check_step("wheel delta", report.wheel as i32)?;
        self.commit_mouse(*report)
    }
}
