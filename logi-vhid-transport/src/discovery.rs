//! Children of the virtual bus
//!
//! The bus reports each child by its device instance id:
//!
//! ```text
//! LGHUBDevice\VID_046D&PID_C232\1&2d595ca7&0&02
//! ```
//!
//! The last `&` group of the last path segment is the id the driver assigned
//! on create, in hex. It is the id a destroy packet must carry.

use crate::protocol::identity;
use crate::types::DeviceKind;

/// One device enumerated under the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusChild {
    pub instance_id: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Id the driver assigned on create
    pub device_id: u32,
}

impl BusChild {
    /// Parse a device instance id, `None` if it does not look like a bus child
    pub fn parse(instance_id: &str) -> Option<Self> {
        let upper = instance_id.to_ascii_uppercase();
        let mut segments = upper.split('\\');
        let _enumerator = segments.next()?;
        let hardware = segments.next()?;
        let instance = segments.next_back()?;

        let device_id = u32::from_str_radix(instance.rsplit('&').next()?, 16).ok()?;
        Some(Self {
            instance_id: instance_id.to_string(),
            vendor_id: hex_field(hardware, "VID_")?,
            product_id: hex_field(hardware, "PID_")?,
            device_id,
        })
    }

    /// Our keyboard or mouse, `None` for any other child
    pub fn kind(&self) -> Option<DeviceKind> {
        if self.vendor_id != identity::VENDOR_ID {
            return None;
        }
        DeviceKind::from_product_id(self.product_id)
    }
}

fn hex_field(hardware: &str, tag: &str) -> Option<u16> {
    let start = hardware.find(tag)? + tag.len();
    let digits = hardware.get(start..start + 4)?;
    u16::from_str_radix(digits, 16).ok()
}

/// Instance id the bus gives a child with this identity and id
pub fn child_instance_id(vendor_id: u16, product_id: u16, device_id: u32) -> String {
    format!("LGHUBDevice\\VID_{vendor_id:04X}&PID_{product_id:04X}\\1&2d595ca7&0&{device_id:02X}")
}

/// Device instance id behind a device interface path
///
/// `\\?\root#system#0001#{guid}` names the interface of `ROOT\SYSTEM\0001`.
pub fn instance_id_from_interface_path(path: &str) -> Option<String> {
    let rest = path
        .strip_prefix("\\\\?\\")
        .or_else(|| path.strip_prefix("\\\\.\\"))?;
    let parts: Vec<&str> = rest.split('#').collect();
    if parts.len() != 4 || parts[..3].iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts[..3].join("\\").to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::paths;

    #[test]
    fn parses_keyboard_child() {
        let child = BusChild::parse("LGHUBDevice\\VID_046D&PID_C232\\1&2d595ca7&0&0A").unwrap();
        assert_eq!(child.device_id, 0x0A);
        assert_eq!(child.kind(), Some(DeviceKind::Keyboard));
    }

    #[test]
    fn foreign_children_have_no_kind() {
        let child = BusChild::parse(&child_instance_id(0x046D, 0xC22F, 3)).unwrap();
        assert_eq!(child.kind(), None);
        assert_eq!(child.device_id, 3);

        let other_vendor = BusChild::parse(&child_instance_id(0x1234, 0xC231, 4)).unwrap();
        assert_eq!(other_vendor.kind(), None);
    }

    #[test]
    fn rejects_malformed_instance_ids() {
        assert!(BusChild::parse("").is_none());
        assert!(BusChild::parse("LGHUBDevice\\VID_046D").is_none());
        assert!(BusChild::parse("LGHUBDevice\\VID_046D&PID_C231\\1&xyz").is_none());
        assert!(BusChild::parse("HID\\NOTHING_HERE\\1&2&0&01").is_none());
    }

    #[test]
    fn generated_ids_parse_back() {
        let id = child_instance_id(0x046D, 0xC231, 0x1F);
        let child = BusChild::parse(&id).unwrap();
        assert_eq!((child.kind(), child.device_id), (Some(DeviceKind::Mouse), 0x1F));
    }

    #[test]
    fn bus_interface_path_maps_to_instance_id() {
        assert_eq!(
            instance_id_from_interface_path(paths::BUS_DEVICE_PATH).as_deref(),
            Some("ROOT\\SYSTEM\\0001")
        );
        assert_eq!(instance_id_from_interface_path("C:\\bus"), None);
        assert_eq!(instance_id_from_interface_path("\\\\?\\root#system"), None);
    }
}
