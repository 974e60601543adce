//! Device lifecycle and input state engine for the LGHUB virtual bus
//!
//! `DeviceLifecycle` creates and destroys the virtual keyboard and mouse and
//! owns the input endpoint. `InputEngine` keeps the held-key/button state and
//! turns intents into reports; it is generic over a `ReportSink`, which the
//! lifecycle implements.

pub mod engine;
pub mod error;
pub mod hid_codes;
pub mod lifecycle;
pub mod sink;

pub use engine::{InputEngine, InputState, ScreenBounds, Timing, MAX_STEP};
pub use error::{ResultCode, VhidError};
pub use lifecycle::{DeviceDescriptor, DeviceLifecycle, DeviceState};
pub use sink::ReportSink;

pub use logi_vhid_transport::{DeviceKind, KeyboardReport, Modifier, MouseButton, MouseReport};
