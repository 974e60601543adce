//! Common types for the transport layer

use std::fmt;

use crate::protocol::{descriptor, device_type, identity, ioctl, layout};

/// Opaque handle to an open endpoint, issued by a `Transport`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Access requested when opening an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Bus control endpoint: create responses are read back
    ReadWrite,
    /// Input endpoint: reports are only ever written
    WriteOnly,
}

impl Access {
    pub fn can_read(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Virtual device kinds the bus driver can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
}

impl DeviceKind {
    /// Both kinds, in creation/teardown order
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Keyboard, DeviceKind::Mouse];

    /// Device-type flag used in create and destroy packets
    pub fn type_flag(&self) -> u32 {
        match self {
            Self::Keyboard => device_type::KEYBOARD,
            Self::Mouse => device_type::MOUSE,
        }
    }

    /// Kind with this USB product ID
    pub fn from_product_id(pid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.product_id() == pid)
    }

    /// Inverse of `type_flag` (the destroy-only OTHER flag has no kind)
    pub fn from_type_flag(flag: u32) -> Option<Self> {
        match flag {
            device_type::KEYBOARD => Some(Self::Keyboard),
            device_type::MOUSE => Some(Self::Mouse),
            _ => None,
        }
    }

    /// Hardware identity string (VID/PID)
    pub fn identity(&self) -> &'static str {
        match self {
            Self::Keyboard => identity::KEYBOARD_IDENTITY,
            Self::Mouse => identity::MOUSE_IDENTITY,
        }
    }

    /// USB product ID
    pub fn product_id(&self) -> u16 {
        match self {
            Self::Keyboard => identity::PRODUCT_ID_KEYBOARD,
            Self::Mouse => identity::PRODUCT_ID_MOUSE,
        }
    }

    /// Embedded HID report descriptor
    pub fn report_descriptor(&self) -> &'static [u8] {
        match self {
            Self::Keyboard => descriptor::KEYBOARD,
            Self::Mouse => descriptor::MOUSE,
        }
    }

    /// Magic constant the driver uses to tell the two packets apart
    pub fn magic(&self) -> i32 {
        match self {
            Self::Keyboard => layout::KEYBOARD_MAGIC,
            Self::Mouse => layout::MOUSE_MAGIC,
        }
    }

    /// Size of the create buffer for this kind
    pub fn create_packet_size(&self) -> usize {
        match self {
            Self::Keyboard => layout::KEYBOARD_CREATE_SIZE,
            Self::Mouse => layout::MOUSE_CREATE_SIZE,
        }
    }

    /// IOCTL used to inject this kind's input reports
    pub fn report_ioctl(&self) -> u32 {
        match self {
            Self::Keyboard => ioctl::WRITE_KEYBOARD_REPORT,
            Self::Mouse => ioctl::WRITE_MOUSE_REPORT,
        }
    }

    /// Lower-case name for logs and CLI output
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
