//! Virtual HID keyboard and mouse through the Logitech LGHUB virtual bus
//!
//! ```ignore
//! use logi_vhid::{Session, VhidConfig};
//! use logi_vhid::transport::system_transport;
//!
//! let mut session = Session::new(system_transport(), &VhidConfig::default());
//! session.initialize()?;
//! session.power_on()?;
//! session.type_text("hello")?;
//! session.cleanup();
//! ```

pub mod config;
pub mod session;

pub use config::{ScreenConfig, TimingConfig, VhidConfig};
pub use session::{Session, SessionState, SharedSession};

pub use logi_vhid_input as input;
pub use logi_vhid_transport as transport;

pub use logi_vhid_input::{
    DeviceKind, InputState, KeyboardReport, Modifier, MouseButton, MouseReport, ResultCode,
    VhidError,
};
