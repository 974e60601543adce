//! Input layer error types

use logi_vhid_transport::error::win32;
use logi_vhid_transport::{DeviceKind, ParseError, TransportError};
use thiserror::Error;

/// Errors from lifecycle and input operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VhidError {
    /// Session has not reached the state the operation needs
    #[error("Not initialized")]
    NotInitialized,

    /// Endpoint missing or could not be opened
    #[error("Device unavailable: {detail}")]
    DeviceUnavailable { detail: String, code: Option<u32> },

    /// Bus rejected a create request
    #[error("Failed to create virtual {kind} (error {code})")]
    DeviceCreationFailed { kind: DeviceKind, code: u32 },

    /// Bus rejected a destroy request
    #[error("Failed to destroy virtual {kind} (error {code})")]
    DeviceDestructionFailed { kind: DeviceKind, code: u32 },

    /// Report or other control request failed
    #[error("IOCTL 0x{opcode:06X} failed (error {code})")]
    IoControlFailed { opcode: u32, code: u32 },

    /// Caller passed a value outside the accepted range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Target device is not present on the bus
    #[error("Device not ready: {0}")]
    DeviceNotReady(String),
}

impl VhidError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn not_ready(kind: DeviceKind) -> Self {
        Self::DeviceNotReady(format!("virtual {kind} is not present"))
    }

    /// Platform error code, if the failure carried one
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::DeviceUnavailable { code, .. } => *code,
            Self::DeviceCreationFailed { code, .. }
            | Self::DeviceDestructionFailed { code, .. }
            | Self::IoControlFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Stable numeric code for this error
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::NotInitialized => ResultCode::NotInitialized,
            Self::InvalidParameter(_) => ResultCode::InvalidParameter,
            Self::DeviceUnavailable { code, .. } if *code == Some(win32::ERROR_ACCESS_DENIED) => {
                ResultCode::AccessDenied
            }
            Self::DeviceUnavailable { .. } | Self::DeviceNotReady(_) => ResultCode::DeviceNotFound,
            Self::DeviceCreationFailed { code, .. }
            | Self::DeviceDestructionFailed { code, .. }
            | Self::IoControlFailed { code, .. }
                if *code == win32::ERROR_ACCESS_DENIED =>
            {
                ResultCode::AccessDenied
            }
            _ => ResultCode::Error,
        }
    }
}

impl From<TransportError> for VhidError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::DeviceUnavailable { path, code } => Self::DeviceUnavailable {
                detail: format!("{path} (error {code})"),
                code: Some(code),
            },
            TransportError::IoControlFailed { opcode, code } => {
                Self::IoControlFailed { opcode, code }
            }
            TransportError::EnumerationFailed { path, code } => Self::DeviceUnavailable {
                detail: format!("cannot list children of {path} (error {code})"),
                code: Some(code),
            },
            TransportError::InvalidHandle(handle) => Self::DeviceUnavailable {
                detail: format!("endpoint handle {handle} is not open"),
                code: Some(win32::ERROR_INVALID_HANDLE),
            },
        }
    }
}

impl From<ParseError> for VhidError {
    fn from(err: ParseError) -> Self {
        Self::InvalidParameter(err.to_string())
    }
}

/// Numeric status codes for callers that want a flat result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    Error = 1,
    DeviceNotFound = 2,
    AccessDenied = 3,
    InvalidParameter = 4,
    NotInitialized = 5,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_result<T>(result: &Result<T, VhidError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.result_code(),
        }
    }
}
