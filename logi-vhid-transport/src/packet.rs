//! Bus control packets (create / destroy device)
//!
//! The create packet is a fixed 182-byte header followed by the HID report
//! descriptor, zero-padded to a per-kind buffer size:
//!
//! ```text
//! off  size  field
//!   0    4   declared length (183)
//!   4    4   device id (0 in, driver writes the opaque id here)
//!   8    4   entry count (1)
//!  12    4   identity length (62)
//!  16  128   identity, UTF-16LE, zero padded
//! 144    4   magic (i32, per kind)
//! 148    4   device type (0 keyboard, 1 mouse)
//! 152   26   reserved
//! 178    4   descriptor length
//! 182    n   HID report descriptor
//! ```
//!
//! All integers are little-endian and unaligned.

use std::mem::size_of;

use zerocopy::byteorder::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::ParseError;
use crate::protocol::{device_type, layout};
use crate::types::DeviceKind;

const RESERVED_GAP: usize = 26;

/// Fixed header of a create-device packet
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CreateDeviceHeader {
    declared_len: U32,
    device_id: U32,
    entry_count: U32,
    identity_len: U32,
    identity: [u8; layout::IDENTITY_CAPACITY],
    magic: I32,
    device_type: U32,
    _reserved: [u8; RESERVED_GAP],
    descriptor_len: U32,
}

const _: () = assert!(size_of::<CreateDeviceHeader>() == layout::DESCRIPTOR_OFFSET);

impl CreateDeviceHeader {
    fn for_kind(kind: DeviceKind) -> Self {
        let mut identity = [0u8; layout::IDENTITY_CAPACITY];
        for (slot, unit) in identity
            .chunks_exact_mut(2)
            .zip(kind.identity().encode_utf16())
        {
            slot.copy_from_slice(&unit.to_le_bytes());
        }
        Self {
            declared_len: U32::new(layout::CREATE_DECLARED_LEN),
            device_id: U32::new(0),
            entry_count: U32::new(layout::CREATE_ENTRY_COUNT),
            identity_len: U32::new(layout::IDENTITY_DECLARED_LEN),
            identity,
            magic: I32::new(kind.magic()),
            device_type: U32::new(kind.type_flag()),
            _reserved: [0; RESERVED_GAP],
            descriptor_len: U32::new(kind.report_descriptor().len() as u32),
        }
    }

    /// View the header at the start of a create buffer
    pub fn parse(bytes: &[u8]) -> Result<&Self, ParseError> {
        Self::ref_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| ParseError::TooShort {
                expected: layout::DESCRIPTOR_OFFSET,
                got: bytes.len(),
            })
    }

    pub fn declared_len(&self) -> u32 {
        self.declared_len.get()
    }

    pub fn device_id(&self) -> u32 {
        self.device_id.get()
    }

    pub fn entry_count(&self) -> u32 {
        self.entry_count.get()
    }

    pub fn identity_len(&self) -> u32 {
        self.identity_len.get()
    }

    /// Identity string, decoded up to the first NUL
    pub fn identity(&self) -> String {
        let units: Vec<u16> = self
            .identity
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }

    pub fn magic(&self) -> i32 {
        self.magic.get()
    }

    pub fn device_type(&self) -> u32 {
        self.device_type.get()
    }

    pub fn descriptor_len(&self) -> u32 {
        self.descriptor_len.get()
    }

    /// Device kind, checked against the magic so a mismatched packet is rejected
    pub fn kind(&self) -> Result<DeviceKind, ParseError> {
        let kind = DeviceKind::from_type_flag(self.device_type()).ok_or(
            ParseError::InvalidValue {
                field: "device type",
                value: self.device_type(),
            },
        )?;
        if kind.magic() != self.magic() {
            return Err(ParseError::InvalidValue {
                field: "magic",
                value: self.magic() as u32,
            });
        }
        Ok(kind)
    }
}

/// Complete create-device buffer for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDevicePacket {
    kind: DeviceKind,
    buf: Vec<u8>,
}

impl CreateDevicePacket {
    pub fn new(kind: DeviceKind) -> Self {
        let descriptor = kind.report_descriptor();
        let header = CreateDeviceHeader::for_kind(kind);
        let mut buf = vec![0u8; kind.create_packet_size()];
        buf[..layout::DESCRIPTOR_OFFSET].copy_from_slice(header.as_bytes());
        buf[layout::DESCRIPTOR_OFFSET..layout::DESCRIPTOR_OFFSET + descriptor.len()]
            .copy_from_slice(descriptor);
        Self { kind, buf }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Zeroed buffer of the same size for the driver's response
    pub fn response_buffer(&self) -> Vec<u8> {
        vec![0u8; self.buf.len()]
    }
}

/// Extract the opaque device id the driver echoes into a create response
pub fn parse_device_id(response: &[u8]) -> Result<u32, ParseError> {
    let end = layout::DEVICE_ID_OFFSET + 4;
    let bytes = response
        .get(layout::DEVICE_ID_OFFSET..end)
        .ok_or(ParseError::TooShort {
            expected: end,
            got: response.len(),
        })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Destroy-device packet, 20 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DestroyDevicePacket {
    len: U32,
    device_id: U32,
    device_type: U32,
    _reserved: [u8; 8],
}

const _: () = assert!(size_of::<DestroyDevicePacket>() == layout::DESTROY_SIZE);

impl DestroyDevicePacket {
    pub fn new(kind: DeviceKind, device_id: u32) -> Self {
        Self::with_type_flag(kind.type_flag(), device_id)
    }

    /// Destroy a bus child that is neither our keyboard nor our mouse
    pub fn other(device_id: u32) -> Self {
        Self::with_type_flag(device_type::OTHER, device_id)
    }

    fn with_type_flag(flag: u32, device_id: u32) -> Self {
        Self {
            len: U32::new(layout::DESTROY_SIZE as u32),
            device_id: U32::new(device_id),
            device_type: U32::new(flag),
            _reserved: [0; 8],
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let packet = Self::read_from_bytes(bytes).map_err(|_| ParseError::WrongLength {
            expected: layout::DESTROY_SIZE,
            got: bytes.len(),
        })?;
        if packet.len.get() as usize != layout::DESTROY_SIZE {
            return Err(ParseError::InvalidValue {
                field: "destroy length",
                value: packet.len.get(),
            });
        }
        if packet.device_type.get() > device_type::OTHER {
            return Err(ParseError::InvalidValue {
                field: "device type",
                value: packet.device_type.get(),
            });
        }
        Ok(packet)
    }

    pub fn device_id(&self) -> u32 {
        self.device_id.get()
    }

    pub fn device_type(&self) -> u32 {
        self.device_type.get()
    }

    pub fn to_bytes(&self) -> [u8; layout::DESTROY_SIZE] {
        let mut out = [0u8; layout::DESTROY_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}
