//! Placeholder backend for platforms without the bus driver

use tracing::debug;

use crate::discovery::BusChild;
use crate::error::{win32, TransportError};
use crate::types::{Access, Handle};
use crate::Transport;

/// Backend whose endpoints never open
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTransport;

impl Transport for UnsupportedTransport {
    fn open(&mut self, path: &str, _access: Access) -> Result<Handle, TransportError> {
        debug!("Virtual bus driver is Windows-only, cannot open {}", path);
        Err(TransportError::DeviceUnavailable {
            path: path.to_string(),
            code: win32::ERROR_NOT_SUPPORTED,
        })
    }

    fn control(
        &mut self,
        handle: Handle,
        _opcode: u32,
        _input: &[u8],
        _output: &mut [u8],
    ) -> Result<usize, TransportError> {
        Err(TransportError::InvalidHandle(handle))
    }

    fn close(&mut self, handle: Handle) -> Result<(), TransportError> {
        Err(TransportError::InvalidHandle(handle))
    }

    fn bus_children(&mut self, bus_path: &str) -> Result<Vec<BusChild>, TransportError> {
        Err(TransportError::EnumerationFailed {
            path: bus_path.to_string(),
            code: win32::ERROR_NOT_SUPPORTED,
        })
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_reports_device_unavailable() {
        let mut transport = UnsupportedTransport;
        let err = transport.open("\\\\?\\bus", Access::ReadWrite).unwrap_err();
        assert_eq!(err.code(), win32::ERROR_NOT_SUPPORTED);
        assert!(!transport.is_available("\\\\?\\bus", Access::WriteOnly));
        assert_eq!(
            transport.bus_children("\\\\?\\bus").unwrap_err().code(),
            win32::ERROR_NOT_SUPPORTED
        );
    }
}
