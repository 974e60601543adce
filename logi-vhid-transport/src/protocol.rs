//! Protocol constants for the LGHUB virtual bus driver
//!
//! Everything in here is fixed by the driver. The create packet is validated
//! structurally, so the descriptors and magic values must stay bit-exact.

/// Bus driver IOCTL control codes
pub mod ioctl {
    /// Create a virtual device on the bus (create packet in, id echoed out)
    pub const BUS_CREATE_DEVICE: u32 = 0x2A2000;
    /// Remove a virtual device from the bus (destroy packet in)
    pub const BUS_DESTROY_DEVICE: u32 = 0x2A2004;
    /// Write an 8-byte keyboard report to the input endpoint
    pub const WRITE_KEYBOARD_REPORT: u32 = 0x2A200C;
    /// Write a 5-byte mouse report to the input endpoint
    pub const WRITE_MOUSE_REPORT: u32 = 0x2A2010;

    /// Human-readable name for logging
    pub fn name(code: u32) -> &'static str {
        match code {
            BUS_CREATE_DEVICE => "BUS_CREATE_DEVICE",
            BUS_DESTROY_DEVICE => "BUS_DESTROY_DEVICE",
            WRITE_KEYBOARD_REPORT => "WRITE_KEYBOARD_REPORT",
            WRITE_MOUSE_REPORT => "WRITE_MOUSE_REPORT",
            _ => "UNKNOWN",
        }
    }
}

/// Device interface paths
pub mod paths {
    /// Control endpoint of the virtual bus (root\LGHUBVirtualBus)
    pub const BUS_DEVICE_PATH: &str =
        "\\\\?\\root#system#0001#{dfbedcdb-2148-416d-9e4d-cecc2424128c}";

    /// Input endpoint interface GUID
    pub const INPUT_INTERFACE_GUID: &str = "{1abc05c0-c378-41b9-9cef-df1aba82b015}";

    /// Instance numbers probed for the input endpoint, in order
    pub const INPUT_INSTANCE_RANGE: std::ops::RangeInclusive<u8> = 1..=3;

    /// Build the input endpoint path for one instance number
    pub fn input_device_path(instance: u8) -> String {
        format!("\\\\.\\ROOT#SYSTEM#{instance:04}#{INPUT_INTERFACE_GUID}")
    }

    /// All input endpoint candidates in probe order
    pub fn default_input_paths() -> Vec<String> {
        INPUT_INSTANCE_RANGE.map(input_device_path).collect()
    }
}

/// USB identity reported by the virtual devices
pub mod identity {
    /// Logitech vendor ID
    pub const VENDOR_ID: u16 = 0x046D;
    /// Virtual keyboard product ID
    pub const PRODUCT_ID_KEYBOARD: u16 = 0xC232;
    /// Virtual mouse product ID
    pub const PRODUCT_ID_MOUSE: u16 = 0xC231;

    /// Hardware identity string embedded in the keyboard create packet
    pub const KEYBOARD_IDENTITY: &str = "LGHUBDevice\\VID_046D&PID_C232";
    /// Hardware identity string embedded in the mouse create packet
    pub const MOUSE_IDENTITY: &str = "LGHUBDevice\\VID_046D&PID_C231";
}

/// Create/destroy packet layout constants
pub mod layout {
    /// Full create buffer size for the keyboard
    pub const KEYBOARD_CREATE_SIZE: usize = 246;
    /// Full create buffer size for the mouse
    pub const MOUSE_CREATE_SIZE: usize = 254;
    /// Value the driver expects in the leading length field of a create packet.
    /// It is not the buffer size.
    pub const CREATE_DECLARED_LEN: u32 = 183;
    /// Number of device entries in one create packet
    pub const CREATE_ENTRY_COUNT: u32 = 1;
    /// Declared identity length field
    pub const IDENTITY_DECLARED_LEN: u32 = 62;
    /// Space reserved for the UTF-16LE identity string
    pub const IDENTITY_CAPACITY: usize = 128;
    /// Byte offset of the echoed device id in the create response
    pub const DEVICE_ID_OFFSET: usize = 4;
    /// Offset of the HID report descriptor (end of the fixed header)
    pub const DESCRIPTOR_OFFSET: usize = 182;
    /// Destroy packet size (also its leading length field)
    pub const DESTROY_SIZE: usize = 20;

    /// Magic constant for the keyboard (PID << 16 | VID as i32)
    pub const KEYBOARD_MAGIC: i32 = -1036909459;
    /// Magic constant for the mouse (PID << 16 | VID as i32)
    pub const MOUSE_MAGIC: i32 = -1036974995;
}

/// Device-type flags carried in create/destroy packets
pub mod device_type {
    pub const KEYBOARD: u32 = 0;
    pub const MOUSE: u32 = 1;
    /// Destroy-only: any other child on the bus
    pub const OTHER: u32 = 2;
}

/// Report sizes on the input endpoint
pub const MOUSE_REPORT_SIZE: usize = 5;
pub const KEYBOARD_REPORT_SIZE: usize = 8;
/// Maximum simultaneous non-modifier keys in a boot keyboard report
pub const MAX_PRESSED_KEYS: usize = 6;

/// HID report descriptors embedded in the create packets
pub mod descriptor {
    /// Boot keyboard: modifier byte, reserved byte, 5 LED outputs, 6-key array
    pub const KEYBOARD: &[u8] = &[
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x06, // Usage (Keyboard)
        0xA1, 0x01, // Collection (Application)
        0x05, 0x07, //   Usage Page (Key Codes)
        0x19, 0xE0, //   Usage Minimum (224)
        0x29, 0xE7, //   Usage Maximum (231)
        0x15, 0x00, //   Logical Minimum (0)
        0x25, 0x01, //   Logical Maximum (1)
        0x75, 0x01, //   Report Size (1)
        0x95, 0x08, //   Report Count (8)
        0x81, 0x02, //   Input (Data, Variable, Absolute)
        0x95, 0x01, //   Report Count (1)
        0x75, 0x08, //   Report Size (8)
        0x81, 0x01, //   Input (Constant)
        0x95, 0x05, //   Report Count (5)
        0x75, 0x01, //   Report Size (1)
        0x05, 0x08, //   Usage Page (LEDs)
        0x19, 0x01, //   Usage Minimum (1)
        0x29, 0x05, //   Usage Maximum (5)
        0x91, 0x02, //   Output (Data, Variable, Absolute)
        0x95, 0x01, //   Report Count (1)
        0x75, 0x03, //   Report Size (3)
        0x91, 0x01, //   Output (Constant)
        0x95, 0x06, //   Report Count (6)
        0x75, 0x08, //   Report Size (8)
        0x15, 0x00, //   Logical Minimum (0)
        0x25, 0x65, //   Logical Maximum (101)
        0x05, 0x07, //   Usage Page (Key Codes)
        0x19, 0x00, //   Usage Minimum (0)
        0x29, 0x65, //   Usage Maximum (101)
        0x81, 0x00, //   Input (Data, Array)
        0xC0, // End Collection
    ];

    /// Relative mouse: 5 button bits + padding, X/Y/Wheel as signed bytes
    pub const MOUSE: &[u8] = &[
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x02, // Usage (Mouse)
        0xA1, 0x01, // Collection (Application)
        0x09, 0x01, //   Usage (Pointer)
        0xA1, 0x00, //   Collection (Physical)
        0x05, 0x09, //     Usage Page (Button)
        0x19, 0x01, //     Usage Minimum (1)
        0x29, 0x05, //     Usage Maximum (5)
        0x15, 0x00, //     Logical Minimum (0)
        0x25, 0x01, //     Logical Maximum (1)
        0x95, 0x05, //     Report Count (5)
        0x75, 0x01, //     Report Size (1)
        0x81, 0x02, //     Input (Data, Variable, Absolute)
        0x95, 0x01, //     Report Count (1)
        0x75, 0x03, //     Report Size (3)
        0x81, 0x01, //     Input (Constant)
        0x05, 0x01, //     Usage Page (Generic Desktop)
        0x09, 0x30, //     Usage (X)
        0x09, 0x31, //     Usage (Y)
        0x09, 0x38, //     Usage (Wheel)
        0x15, 0x81, //     Logical Minimum (-127)
        0x25, 0x7F, //     Logical Maximum (127)
        0x75, 0x08, //     Report Size (8)
        0x95, 0x03, //     Report Count (3)
        0x81, 0x06, //     Input (Data, Variable, Relative)
        0xC0, //   End Collection
        0xC0, // End Collection
    ];
}
