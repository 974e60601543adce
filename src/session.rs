//! Session facade
//!
//! Sequences the device lifecycle and the input engine:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --power_on--> PoweredOn --> Ready
//!       ^                                                               |
//!       +------------------cleanup------------ PoweredOff <--power_off--+
//! ```
//!
//! Input operations are accepted only in `Ready`. Dropping a session runs
//! `cleanup`, so devices never outlive it.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logi_vhid_input::{
    DeviceKind, DeviceLifecycle, InputEngine, InputState, KeyboardReport, Modifier, MouseButton,
    MouseReport, ResultCode, VhidError,
};
use logi_vhid_transport::SharedTransport;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::VhidConfig;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    PoweredOn,
    Ready,
    PoweredOff,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::PoweredOn => "powered on",
            Self::Ready => "ready",
            Self::PoweredOff => "powered off",
        };
        f.write_str(name)
    }
}

/// Session shared between threads
pub type SharedSession = Arc<Mutex<Session>>;

/// One connection to the virtual bus and its two devices
pub struct Session {
    engine: InputEngine<DeviceLifecycle>,
    state: SessionState,
    bus_path: String,
    input_paths: Vec<String>,
    adopt_existing: bool,
    settle_delay: Duration,
    last_error: Option<String>,
}

impl Session {
    pub fn new(transport: SharedTransport, config: &VhidConfig) -> Self {
        let engine = InputEngine::new(DeviceLifecycle::new(transport), config.timing.timing())
            .with_screen(config.screen.bounds());
        Self {
            engine,
            state: SessionState::Uninitialized,
            bus_path: config.bus_path.clone(),
            input_paths: config.input_paths.clone(),
            adopt_existing: config.adopt_existing,
            settle_delay: config.timing.settle_delay(),
            last_error: None,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Whether any virtual device currently exists
    pub fn devices_created(&self) -> bool {
        self.lifecycle().any_present()
    }

    pub fn is_present(&self, kind: DeviceKind) -> bool {
        self.lifecycle().is_present(kind)
    }

    /// Detail of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Held keys, modifiers and buttons
    pub fn input_state(&self) -> InputState {
        self.engine.state()
    }

    fn lifecycle(&self) -> &DeviceLifecycle {
        self.engine.sink()
    }

    fn lifecycle_mut(&mut self) -> &mut DeviceLifecycle {
        self.engine.sink_mut()
    }

    fn record<T>(&mut self, result: Result<T, VhidError>) -> Result<T, VhidError> {
        if let Err(e) = &result {
            debug!("Session error: {}", e);
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Open the bus control endpoint
    pub fn initialize(&mut self) -> Result<(), VhidError> {
        if self.state != SessionState::Uninitialized {
            return Ok(());
        }
        let path = self.bus_path.clone();
        let result = self.lifecycle_mut().open_bus(&path);
        self.record(result)?;
        self.set_state(SessionState::Initialized);
        Ok(())
    }

    /// Create both devices and open the input endpoint
    ///
    /// With `adopt_existing` set, our devices already on the bus are taken
    /// over first and only the missing kinds are created. One device failing
    /// to create is tolerated. If neither can be created
    /// the first error is returned and the session stays where it was. If
    /// the input endpoint does not open the session stays `PoweredOn`.
    pub fn power_on(&mut self) -> Result<(), VhidError> {
        match self.state {
            SessionState::Uninitialized => return self.record(Err(VhidError::NotInitialized)),
            SessionState::Ready => return Ok(()),
            SessionState::Initialized | SessionState::PoweredOff => {
                if self.adopt_existing {
                    if let Err(e) = self.lifecycle_mut().adopt_existing() {
                        warn!("Could not scan the bus for existing devices: {}", e);
                    }
                }
                let mut first = None;
                for kind in DeviceKind::ALL {
                    if self.is_present(kind) {
                        continue;
                    }
                    if let Err(e) = self.lifecycle_mut().create(kind) {
                        warn!("Could not create virtual {}: {}", kind, e);
                        first.get_or_insert(e);
                    }
                }
                if !self.devices_created() {
                    let err = first.unwrap_or(VhidError::NotInitialized);
                    return self.record(Err(err));
                }
                if let Some(e) = first {
                    self.last_error = Some(e.to_string());
                }
                self.set_state(SessionState::PoweredOn);
                thread::sleep(self.settle_delay);
            }
            SessionState::PoweredOn => {}
        }

        let candidates = self.input_paths.clone();
        let opened = self.lifecycle_mut().open_input_endpoint(&candidates);
        self.record(opened)?;
        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// Destroy bus children this session did not create or adopt
    ///
    /// Needs an open bus. Foreign children are only touched with
    /// `include_foreign`.
    ///
    /// # Returns
    /// Number of children destroyed
    pub fn destroy_orphans(&mut self, include_foreign: bool) -> Result<usize, VhidError> {
        if self.state == SessionState::Uninitialized {
            return self.record(Err(VhidError::NotInitialized));
        }
        let result = self.lifecycle_mut().destroy_orphans(include_foreign);
        self.record(result)
    }

    /// Release everything, close the input endpoint and destroy the devices
    ///
    /// Teardown continues past individual failures; the session ends up
    /// `PoweredOff` either way and the first destroy error is returned.
    pub fn power_off(&mut self) -> Result<(), VhidError> {
        match self.state {
            SessionState::Uninitialized => return self.record(Err(VhidError::NotInitialized)),
            SessionState::Initialized | SessionState::PoweredOff => return Ok(()),
            SessionState::Ready => {
                if let Err(e) = self.engine.reset_state() {
                    warn!("Release before power off failed: {}", e);
                }
            }
            SessionState::PoweredOn => {}
        }

        self.lifecycle_mut().close_input_endpoint();
        let destroyed = self.lifecycle_mut().destroy_all();
        self.engine.discard_state();
        self.set_state(SessionState::PoweredOff);
        self.record(destroyed)
    }

    /// Power off if needed and close the bus; safe from any state
    pub fn cleanup(&mut self) {
        if matches!(self.state, SessionState::PoweredOn | SessionState::Ready) {
            if let Err(e) = self.power_off() {
                warn!("Teardown incomplete: {}", e);
            }
        }
        self.lifecycle_mut().close_bus();
        self.set_state(SessionState::Uninitialized);
    }

    fn input<T>(
        &mut self,
        op: impl FnOnce(&mut InputEngine<DeviceLifecycle>) -> Result<T, VhidError>,
    ) -> Result<T, VhidError> {
        let result = if self.state == SessionState::Ready {
            op(&mut self.engine)
        } else {
            Err(VhidError::NotInitialized)
        };
        self.record(result)
    }

    /// Run an operation and collapse its outcome to a `ResultCode`
    pub fn status<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, VhidError>,
    ) -> ResultCode {
        ResultCode::from_result(&op(self))
    }

    // Mouse

    pub fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), VhidError> {
        self.input(|e| e.move_relative(dx, dy))
    }

    pub fn move_absolute(&mut self, x: u32, y: u32) -> Result<(), VhidError> {
        self.input(|e| e.move_absolute(x, y))
    }

    pub fn button_down(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.input(|e| e.button_down(button))
    }

    pub fn button_up(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.input(|e| e.button_up(button))
    }

    pub fn click(&mut self, button: MouseButton) -> Result<(), VhidError> {
        self.input(|e| e.click(button))
    }

    pub fn wheel(&mut self, delta: i32) -> Result<(), VhidError> {
        self.input(|e| e.wheel(delta))
    }

    // Keyboard

    pub fn key_down(&mut self, code: u8) -> Result<(), VhidError> {
        self.input(|e| e.key_down(code))
    }

    pub fn key_up(&mut self, code: u8) -> Result<(), VhidError> {
        self.input(|e| e.key_up(code))
    }

    pub fn key_tap(&mut self, code: u8) -> Result<(), VhidError> {
        self.input(|e| e.key_tap(code))
    }

    pub fn modifier_down(&mut self, modifier: Modifier) -> Result<(), VhidError> {
        self.input(|e| e.modifier_down(modifier))
    }

    pub fn modifier_up(&mut self, modifier: Modifier) -> Result<(), VhidError> {
        self.input(|e| e.modifier_up(modifier))
    }

    pub fn type_text(&mut self, text: &str) -> Result<(), VhidError> {
        self.input(|e| e.type_text(text))
    }

    pub fn reset_state(&mut self) -> Result<(), VhidError> {
        self.input(|e| e.reset_state())
    }

    pub fn send_keyboard_report(&mut self, report: &KeyboardReport) -> Result<(), VhidError> {
        self.input(|e| e.send_keyboard_report(report))
    }

    pub fn send_mouse_report(&mut self, report: &MouseReport) -> Result<(), VhidError> {
        self.input(|e| e.send_mouse_report(report))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Uninitialized {
            self.cleanup();
        }
    }
}
