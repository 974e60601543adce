//! Transport layer for the LGHUB virtual HID bus driver
//!
//! This crate owns everything that touches the wire:
//!
//! - the bus control packets that create and destroy virtual devices
//! - the fixed-size mouse and keyboard input reports
//! - a synchronous `Transport` trait over DeviceIoControl-style endpoints
//! - parsing of the bus children the driver enumerates
//!
//! Backends:
//!
//! - `WinIoctlTransport` (Windows): CreateFileW / DeviceIoControl, CfgMgr
//! - `RecordingTransport`: in-memory driver model that records all traffic
//! - `UnsupportedTransport`: every open fails, used off Windows

pub mod discovery;
pub mod error;
pub mod packet;
pub mod protocol;
pub mod recording;
pub mod report;
pub mod types;

mod unsupported;
#[cfg(windows)]
mod win_ioctl;

pub use discovery::BusChild;
pub use error::{ParseError, TransportError};
pub use packet::{parse_device_id, CreateDeviceHeader, CreateDevicePacket, DestroyDevicePacket};
pub use recording::{ControlCall, RecordingTransport};
pub use report::{KeyboardReport, Modifier, MouseButton, MouseReport, BUTTON_MASK};
pub use types::{Access, DeviceKind, Handle};
pub use unsupported::UnsupportedTransport;
#[cfg(windows)]
pub use win_ioctl::WinIoctlTransport;

use std::sync::Arc;

use parking_lot::Mutex;

/// The core transport trait - all backends implement this
///
/// Calls are blocking. A backend only guarantees that one call on a handle
/// completes before the next one is issued; callers serialize through
/// `SharedTransport`.
pub trait Transport: Send {
    /// Open an endpoint by device path
    ///
    /// Fails with `TransportError::DeviceUnavailable` when the path cannot be
    /// opened (driver not installed, not running, or access denied).
    fn open(&mut self, path: &str, access: Access) -> Result<Handle, TransportError>;

    /// Issue one control request
    ///
    /// # Arguments
    /// * `handle` - Endpoint from `open`
    /// * `opcode` - IOCTL code (see `protocol::ioctl`)
    /// * `input` - Request payload
    /// * `output` - Response buffer (may be empty)
    ///
    /// # Returns
    /// Number of bytes the endpoint wrote into `output`
    fn control(
        &mut self,
        handle: Handle,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, TransportError>;

    /// Close an endpoint
    fn close(&mut self, handle: Handle) -> Result<(), TransportError>;

    /// List the devices currently enumerated under the bus at `bus_path`
    ///
    /// Children whose instance id does not parse are skipped.
    fn bus_children(&mut self, bus_path: &str) -> Result<Vec<BusChild>, TransportError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Check whether an endpoint can be opened right now
    fn is_available(&mut self, path: &str, access: Access) -> bool {
        match self.open(path, access) {
            Ok(handle) => {
                let _ = self.close(handle);
                true
            }
            Err(_) => false,
        }
    }

    /// Send a request that carries no response payload
    fn write(&mut self, handle: Handle, opcode: u32, input: &[u8]) -> Result<(), TransportError> {
        self.control(handle, opcode, input, &mut []).map(|_| ())
    }
}

/// Transport shared between the lifecycle manager and the input engine
pub type SharedTransport = Arc<Mutex<dyn Transport>>;

/// Wrap a backend for sharing
pub fn shared<T: Transport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}

/// Default backend for the current platform
pub fn system_transport() -> SharedTransport {
    #[cfg(windows)]
    {
        shared(WinIoctlTransport::new())
    }
    #[cfg(not(windows))]
    {
        shared(UnsupportedTransport)
    }
}
