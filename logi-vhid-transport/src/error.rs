//! Transport error types

use thiserror::Error;

use crate::types::Handle;

/// Win32 error codes the transport reports without a live OS call
pub mod win32 {
    pub const ERROR_INVALID_FUNCTION: u32 = 1;
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_NOT_FOUND: u32 = 1168;
}

/// Errors that can occur during transport operations
///
/// Platform error codes are captured where the call failed and carried
/// in `code`; nothing above this layer sees a raw `GetLastError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint could not be opened (driver missing, not running, no access)
    #[error("Device unavailable: {path} (error {code})")]
    DeviceUnavailable { path: String, code: u32 },

    /// DeviceIoControl reported failure
    #[error("IOCTL 0x{opcode:06X} failed (error {code})")]
    IoControlFailed { opcode: u32, code: u32 },

    /// Children of the bus could not be listed
    #[error("Bus enumeration failed: {path} (error {code})")]
    EnumerationFailed { path: String, code: u32 },

    /// Handle was never opened or already closed
    #[error("Invalid transport handle {0}")]
    InvalidHandle(Handle),
}

impl TransportError {
    /// Platform error code behind the failure
    pub fn code(&self) -> u32 {
        match self {
            Self::DeviceUnavailable { code, .. }
            | Self::IoControlFailed { code, .. }
            | Self::EnumerationFailed { code, .. } => *code,
            Self::InvalidHandle(_) => win32::ERROR_INVALID_HANDLE,
        }
    }
}

/// Decode errors for reports and control packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Buffer too short: expected {expected} bytes, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("Wrong length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("Invalid value for {field}: 0x{value:X}")]
    InvalidValue { field: &'static str, value: u32 },

    #[error("Duplicate key code 0x{0:02X}")]
    DuplicateKey(u8),

    #[error("Key code 0x{0:02X} follows an empty slot")]
    UnpackedKeys(u8),

    #[error("Too many keys: {0} (max 6)")]
    TooManyKeys(usize),
}
