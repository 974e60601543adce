//! Input report codec
//!
//! The input endpoint takes two fixed-size reports:
//!
//! ```text
//! mouse    (5 bytes): [buttons] [dx: i8] [dy: i8] [wheel: i8] [reserved = 0]
//! keyboard (8 bytes): [modifiers] [reserved = 0] [key0 .. key5]
//! ```
//!
//! A keyboard report is the complete keyboard state, never a delta.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::ParseError;
use crate::protocol::{KEYBOARD_REPORT_SIZE, MAX_PRESSED_KEYS, MOUSE_REPORT_SIZE};

/// Valid bits of the mouse button byte
pub const BUTTON_MASK: u8 = 0x07;

/// Mouse buttons (bitmask values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0x01,
    Right = 0x02,
    Middle = 0x04,
}

impl MouseButton {
    pub const ALL: [MouseButton; 3] = [Self::Left, Self::Right, Self::Middle];

    pub fn mask(self) -> u8 {
        self as u8
    }

    /// Parse a CLI/config name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Self::Left),
            "right" | "r" => Some(Self::Right),
            "middle" | "m" => Some(Self::Middle),
            _ => None,
        }
    }
}

/// Keyboard modifier bits (HID usages 0xE0-0xE7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Modifier {
    LeftCtrl = 0x01,
    LeftShift = 0x02,
    LeftAlt = 0x04,
    LeftGui = 0x08,
    RightCtrl = 0x10,
    RightShift = 0x20,
    RightAlt = 0x40,
    RightGui = 0x80,
}

impl Modifier {
    pub const ALL: [Modifier; 8] = [
        Self::LeftCtrl,
        Self::LeftShift,
        Self::LeftAlt,
        Self::LeftGui,
        Self::RightCtrl,
        Self::RightShift,
        Self::RightAlt,
        Self::RightGui,
    ];

    pub fn mask(self) -> u8 {
        self as u8
    }

    /// Map a modifier key usage (0xE0-0xE7) to its bit
    pub fn from_usage(usage: u8) -> Option<Self> {
        match usage {
            0xE0..=0xE7 => Some(Self::ALL[(usage - 0xE0) as usize]),
            _ => None,
        }
    }

    /// HID usage code of this modifier key
    pub fn usage(self) -> u8 {
        0xE0 + (self as u8).trailing_zeros() as u8
    }

    /// Parse a name like `shift`, `lctrl`, `right-alt`
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase().replace(['-', '_'], "");
        match lower.as_str() {
            "ctrl" | "control" | "lctrl" | "leftctrl" => Some(Self::LeftCtrl),
            "shift" | "lshift" | "leftshift" => Some(Self::LeftShift),
            "alt" | "lalt" | "leftalt" => Some(Self::LeftAlt),
            "gui" | "win" | "meta" | "super" | "lgui" | "leftgui" => Some(Self::LeftGui),
            "rctrl" | "rightctrl" => Some(Self::RightCtrl),
            "rshift" | "rightshift" => Some(Self::RightShift),
            "ralt" | "rightalt" | "altgr" => Some(Self::RightAlt),
            "rgui" | "rightgui" => Some(Self::RightGui),
            _ => None,
        }
    }
}

/// Mouse report, 5 bytes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MouseReport {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
    _reserved: u8,
}

const _: () = assert!(std::mem::size_of::<MouseReport>() == MOUSE_REPORT_SIZE);

impl MouseReport {
    pub fn new(buttons: u8, dx: i8, dy: i8, wheel: i8) -> Self {
        Self {
            buttons: buttons & BUTTON_MASK,
            dx,
            dy,
            wheel,
            _reserved: 0,
        }
    }

    /// Buttons only, no motion
    pub fn buttons_only(buttons: u8) -> Self {
        Self::new(buttons, 0, 0, 0)
    }

    pub fn encode(&self) -> [u8; MOUSE_REPORT_SIZE] {
        let mut out = [0u8; MOUSE_REPORT_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let report = Self::read_from_bytes(bytes).map_err(|_| ParseError::WrongLength {
            expected: MOUSE_REPORT_SIZE,
            got: bytes.len(),
        })?;
        if report.buttons & !BUTTON_MASK != 0 {
            return Err(ParseError::InvalidValue {
                field: "buttons",
                value: report.buttons as u32,
            });
        }
        if report._reserved != 0 {
            return Err(ParseError::InvalidValue {
                field: "mouse reserved",
                value: report._reserved as u32,
            });
        }
        Ok(report)
    }
}

/// Keyboard report, 8 bytes on the wire
///
/// Key slots are kept left-packed with no duplicates; constructors enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct KeyboardReport {
    pub modifiers: u8,
    _reserved: u8,
    keys: [u8; MAX_PRESSED_KEYS],
}

const _: () = assert!(std::mem::size_of::<KeyboardReport>() == KEYBOARD_REPORT_SIZE);

impl KeyboardReport {
    /// All keys and modifiers released
    pub fn released() -> Self {
        Self::default()
    }

    /// Build from a modifier mask and up to six distinct non-zero key codes
    pub fn new(modifiers: u8, keys: &[u8]) -> Result<Self, ParseError> {
        if keys.len() > MAX_PRESSED_KEYS {
            return Err(ParseError::TooManyKeys(keys.len()));
        }
        let mut slots = [0u8; MAX_PRESSED_KEYS];
        for (i, &code) in keys.iter().enumerate() {
            if code == 0 {
                return Err(ParseError::InvalidValue {
                    field: "key code",
                    value: 0,
                });
            }
            if keys[..i].contains(&code) {
                return Err(ParseError::DuplicateKey(code));
            }
            slots[i] = code;
        }
        Ok(Self {
            modifiers,
            _reserved: 0,
            keys: slots,
        })
    }

    /// Pressed key codes, in slot order
    pub fn keys(&self) -> &[u8] {
        let len = self.keys.iter().position(|&k| k == 0).unwrap_or(MAX_PRESSED_KEYS);
        &self.keys[..len]
    }

    /// Raw slot array (zero padded)
    pub fn slots(&self) -> [u8; MAX_PRESSED_KEYS] {
        self.keys
    }

    pub fn encode(&self) -> [u8; KEYBOARD_REPORT_SIZE] {
        let mut out = [0u8; KEYBOARD_REPORT_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let raw = Self::read_from_bytes(bytes).map_err(|_| ParseError::WrongLength {
            expected: KEYBOARD_REPORT_SIZE,
            got: bytes.len(),
        })?;
        if raw._reserved != 0 {
            return Err(ParseError::InvalidValue {
                field: "keyboard reserved",
                value: raw._reserved as u32,
            });
        }
        let packed = raw.keys();
        if let Some(&stray) = raw.keys[packed.len()..].iter().find(|&&k| k != 0) {
            return Err(ParseError::UnpackedKeys(stray));
        }
        Self::new(raw.modifiers, packed)
    }

    pub fn is_released(&self) -> bool {
        self.modifiers == 0 && self.keys().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_report_layout() {
        let report = MouseReport::new(MouseButton::Left.mask(), 20, -15, 0);
        assert_eq!(report.encode(), [0x01, 20, 0xF1, 0x00, 0x00]);
    }

    #[test]
    fn mouse_report_masks_unknown_buttons() {
        let report = MouseReport::buttons_only(0xFF);
        assert_eq!(report.buttons, BUTTON_MASK);
    }

    #[test]
    fn mouse_report_round_trip() {
        for report in [
            MouseReport::default(),
            MouseReport::new(0x07, -127, 127, -1),
            MouseReport::new(MouseButton::Middle.mask(), 0, 0, 5),
        ] {
            assert_eq!(MouseReport::decode(&report.encode()).unwrap(), report);
        }
    }

    #[test]
    fn mouse_decode_rejects_bad_input() {
        assert!(matches!(
            MouseReport::decode(&[0, 0, 0, 0]),
            Err(ParseError::WrongLength { expected: 5, got: 4 })
        ));
        assert!(MouseReport::decode(&[0x08, 0, 0, 0, 0]).is_err());
        assert!(MouseReport::decode(&[0, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn keyboard_report_layout() {
        let report = KeyboardReport::new(Modifier::LeftShift.mask(), &[0x04, 0x05]).unwrap();
        assert_eq!(report.encode(), [0x02, 0x00, 0x04, 0x05, 0, 0, 0, 0]);
        assert_eq!(report.keys(), &[0x04, 0x05]);
    }

    #[test]
    fn keyboard_report_round_trip() {
        for report in [
            KeyboardReport::released(),
            KeyboardReport::new(0xFF, &[0x04, 0x05, 0x06, 0x07, 0x08, 0x09]).unwrap(),
            KeyboardReport::new(Modifier::RightAlt.mask(), &[0x2C]).unwrap(),
        ] {
            assert_eq!(KeyboardReport::decode(&report.encode()).unwrap(), report);
        }
    }

    #[test]
    fn keyboard_report_rejects_invalid_keys() {
        assert_eq!(
            KeyboardReport::new(0, &[0x04, 0x04]),
            Err(ParseError::DuplicateKey(0x04))
        );
        assert_eq!(
            KeyboardReport::new(0, &[1, 2, 3, 4, 5, 6, 7]),
            Err(ParseError::TooManyKeys(7))
        );
        assert_eq!(
            KeyboardReport::decode(&[0, 0, 0x04, 0, 0x05, 0, 0, 0]),
            Err(ParseError::UnpackedKeys(0x05))
        );
        assert!(KeyboardReport::decode(&[0, 1, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn modifier_usage_mapping() {
        assert_eq!(Modifier::from_usage(0xE0), Some(Modifier::LeftCtrl));
        assert_eq!(Modifier::from_usage(0xE5), Some(Modifier::RightShift));
        assert_eq!(Modifier::from_usage(0x04), None);
        for m in Modifier::ALL {
            assert_eq!(Modifier::from_usage(m.usage()), Some(m));
        }
        assert_eq!(Modifier::from_name("Left-Shift"), Some(Modifier::LeftShift));
        assert_eq!(MouseButton::from_name("RIGHT"), Some(MouseButton::Right));
    }
}
