//! In-memory bus driver model
//!
//! `RecordingTransport` stands in for the kernel driver. It accepts the same
//! packets the real bus does, validates them with the packet and report
//! decoders, hands out device ids on create, and keeps a log of every control
//! call that succeeded. Failures can be scripted per opcode, per device kind,
//! or per endpoint path. Devices left over from an earlier run can be planted
//! on the bus so enumeration has something to find.
//!
//! Clones share state, so a test can keep one clone for inspection while the
//! other is moved into a `SharedTransport`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::discovery::{child_instance_id, BusChild};
use crate::error::{win32, TransportError};
use crate::packet::{CreateDeviceHeader, DestroyDevicePacket};
use crate::protocol::{device_type, identity, ioctl, layout};
use crate::report::{KeyboardReport, MouseReport};
use crate::types::{Access, DeviceKind, Handle};
use crate::Transport;

/// One successful control call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    /// Path the handle was opened with
    pub path: String,
    pub opcode: u32,
    pub input: Vec<u8>,
}

#[derive(Debug, Default)]
struct RecorderState {
    next_handle: u32,
    handles: HashMap<Handle, (String, Access)>,
    opened: Vec<(String, Access)>,
    next_device_id: u32,
    devices: BTreeMap<u32, DeviceKind>,
    /// Children that are neither keyboard nor mouse (id -> product id)
    foreign: BTreeMap<u32, u16>,
    calls: Vec<ControlCall>,
    failing_opcodes: HashMap<u32, u32>,
    failing_creates: HashMap<DeviceKind, u32>,
    unavailable: HashSet<String>,
    silent_creates: bool,
}

impl RecorderState {
    fn new() -> Self {
        Self {
            next_handle: 1,
            next_device_id: 1,
            ..Default::default()
        }
    }

    fn fail(opcode: u32, code: u32) -> TransportError {
        TransportError::IoControlFailed { opcode, code }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_device_id;
        self.next_device_id += 1;
        id
    }

    fn create_device(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, TransportError> {
        let opcode = ioctl::BUS_CREATE_DEVICE;
        let header = CreateDeviceHeader::parse(input)
            .map_err(|_| Self::fail(opcode, win32::ERROR_INVALID_PARAMETER))?;
        let kind = header
            .kind()
            .map_err(|_| Self::fail(opcode, win32::ERROR_INVALID_PARAMETER))?;
        if header.declared_len() != layout::CREATE_DECLARED_LEN
            || input.len() != kind.create_packet_size()
        {
            return Err(Self::fail(opcode, win32::ERROR_INVALID_PARAMETER));
        }
        if let Some(&code) = self.failing_creates.get(&kind) {
            return Err(Self::fail(opcode, code));
        }

        let id = self.allocate_id();
        self.devices.insert(id, kind);
        if self.silent_creates {
            debug!("Recorder: created {} with id {}, no response", kind, id);
            return Ok(0);
        }

        let n = output.len().min(input.len());
        output[..n].copy_from_slice(&input[..n]);
        if let Some(slot) = output.get_mut(layout::DEVICE_ID_OFFSET..layout::DEVICE_ID_OFFSET + 4) {
            slot.copy_from_slice(&id.to_le_bytes());
        }
        debug!("Recorder: created {} with id {}", kind, id);
        Ok(n)
    }

    fn destroy_device(&mut self, input: &[u8]) -> Result<usize, TransportError> {
        let opcode = ioctl::BUS_DESTROY_DEVICE;
        let packet = DestroyDevicePacket::parse(input)
            .map_err(|_| Self::fail(opcode, win32::ERROR_INVALID_PARAMETER))?;
        let id = packet.device_id();
        let other = packet.device_type() == device_type::OTHER;
        let known = match self.devices.get(&id).copied() {
            Some(kind) if other || packet.device_type() == kind.type_flag() => {
                self.devices.remove(&id).is_some()
            }
            Some(_) => false,
            None => other && self.foreign.remove(&id).is_some(),
        };
        if !known {
            return Err(Self::fail(opcode, win32::ERROR_NOT_FOUND));
        }
        debug!("Recorder: destroyed device {}", id);
        Ok(0)
    }

    fn write_report(&self, kind: DeviceKind, input: &[u8]) -> Result<usize, TransportError> {
        let opcode = kind.report_ioctl();
        let valid = match kind {
            DeviceKind::Keyboard => KeyboardReport::decode(input).is_ok(),
            DeviceKind::Mouse => MouseReport::decode(input).is_ok(),
        };
        if !valid {
            return Err(Self::fail(opcode, win32::ERROR_INVALID_PARAMETER));
        }
        if !self.devices.values().any(|&k| k == kind) {
            return Err(Self::fail(opcode, win32::ERROR_NOT_FOUND));
        }
        Ok(0)
    }
}

/// Transport backed by an in-memory driver model
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    state: Arc<Mutex<RecorderState>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState::new())),
        }
    }

    /// Fail every call with `opcode` using the given platform code
    pub fn fail_opcode(&self, opcode: u32, code: u32) {
        self.state.lock().failing_opcodes.insert(opcode, code);
    }

    /// Fail create requests for one device kind
    pub fn fail_create(&self, kind: DeviceKind, code: u32) {
        self.state.lock().failing_creates.insert(kind, code);
    }

    /// Make `open(path)` fail with ERROR_FILE_NOT_FOUND
    pub fn set_unavailable(&self, path: &str) {
        self.state.lock().unavailable.insert(path.to_string());
    }

    /// Create devices but write nothing back (the driver reports 0 bytes)
    pub fn silence_create_responses(&self, silent: bool) {
        self.state.lock().silent_creates = silent;
    }

    /// Drop all scripted failures
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_opcodes.clear();
        state.failing_creates.clear();
        state.unavailable.clear();
        state.silent_creates = false;
    }

    /// Put a device on the bus without a create call, as an earlier run
    /// that never destroyed it would have
    pub fn plant_device(&self, kind: DeviceKind) -> u32 {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.devices.insert(id, kind);
        id
    }

    /// Put a child with some other Logitech product id on the bus
    pub fn plant_foreign(&self, product_id: u16) -> u32 {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.foreign.insert(id, product_id);
        id
    }

    /// Ids of the foreign children still on the bus
    pub fn foreign_devices(&self) -> Vec<u32> {
        self.state.lock().foreign.keys().copied().collect()
    }

    /// Every successful open, oldest first
    pub fn opened(&self) -> Vec<(String, Access)> {
        self.state.lock().opened.clone()
    }

    /// All successful control calls, oldest first
    pub fn calls(&self) -> Vec<ControlCall> {
        self.state.lock().calls.clone()
    }

    /// Successful calls with one opcode
    pub fn calls_for(&self, opcode: u32) -> Vec<ControlCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.opcode == opcode)
            .cloned()
            .collect()
    }

    /// Decoded keyboard reports, in send order
    pub fn keyboard_reports(&self) -> Vec<KeyboardReport> {
        self.calls_for(ioctl::WRITE_KEYBOARD_REPORT)
            .iter()
            .filter_map(|c| KeyboardReport::decode(&c.input).ok())
            .collect()
    }

    /// Decoded mouse reports, in send order
    pub fn mouse_reports(&self) -> Vec<MouseReport> {
        self.calls_for(ioctl::WRITE_MOUSE_REPORT)
            .iter()
            .filter_map(|c| MouseReport::decode(&c.input).ok())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Devices currently on the simulated bus (id, kind)
    pub fn live_devices(&self) -> Vec<(u32, DeviceKind)> {
        self.state
            .lock()
            .devices
            .iter()
            .map(|(&id, &kind)| (id, kind))
            .collect()
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.len()
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, path: &str, access: Access) -> Result<Handle, TransportError> {
        let mut state = self.state.lock();
        if state.unavailable.contains(path) {
            return Err(TransportError::DeviceUnavailable {
                path: path.to_string(),
                code: win32::ERROR_FILE_NOT_FOUND,
            });
        }
        let handle = Handle(state.next_handle);
        state.next_handle += 1;
        state.handles.insert(handle, (path.to_string(), access));
        state.opened.push((path.to_string(), access));
        debug!("Recorder: opened {} as {} ({:?})", path, handle, access);
        Ok(handle)
    }

    fn control(
        &mut self,
        handle: Handle,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        let (path, access) = state
            .handles
            .get(&handle)
            .cloned()
            .ok_or(TransportError::InvalidHandle(handle))?;

        debug!(
            "Recorder: {} {} ({} bytes): {:02X?}",
            handle,
            ioctl::name(opcode),
            input.len(),
            input
        );

        if let Some(&code) = state.failing_opcodes.get(&opcode) {
            return Err(RecorderState::fail(opcode, code));
        }
        if !output.is_empty() && !access.can_read() {
            return Err(RecorderState::fail(opcode, win32::ERROR_ACCESS_DENIED));
        }

        let returned = match opcode {
            ioctl::BUS_CREATE_DEVICE => state.create_device(input, output)?,
            ioctl::BUS_DESTROY_DEVICE => state.destroy_device(input)?,
            ioctl::WRITE_KEYBOARD_REPORT => state.write_report(DeviceKind::Keyboard, input)?,
            ioctl::WRITE_MOUSE_REPORT => state.write_report(DeviceKind::Mouse, input)?,
            _ => return Err(RecorderState::fail(opcode, win32::ERROR_INVALID_FUNCTION)),
        };

        state.calls.push(ControlCall {
            path,
            opcode,
            input: input.to_vec(),
        });
        Ok(returned)
    }

    fn close(&mut self, handle: Handle) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state
            .handles
            .remove(&handle)
            .map(|(path, _)| debug!("Recorder: closed {} ({})", handle, path))
            .ok_or(TransportError::InvalidHandle(handle))
    }

    fn bus_children(&mut self, bus_path: &str) -> Result<Vec<BusChild>, TransportError> {
        let state = self.state.lock();
        if state.unavailable.contains(bus_path) {
            return Err(TransportError::EnumerationFailed {
                path: bus_path.to_string(),
                code: win32::ERROR_FILE_NOT_FOUND,
            });
        }
        let ours = state
            .devices
            .iter()
            .map(|(&id, kind)| child_instance_id(identity::VENDOR_ID, kind.product_id(), id));
        let foreign = state
            .foreign
            .iter()
            .map(|(&id, &pid)| child_instance_id(identity::VENDOR_ID, pid, id));
        Ok(ours
            .chain(foreign)
            .filter_map(|instance| BusChild::parse(&instance))
            .collect())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{parse_device_id, CreateDevicePacket};
    use crate::protocol::paths;

    fn create(transport: &mut RecordingTransport, bus: Handle, kind: DeviceKind) -> u32 {
        let packet = CreateDevicePacket::new(kind);
        let mut out = packet.response_buffer();
        let n = transport
            .control(bus, ioctl::BUS_CREATE_DEVICE, packet.as_bytes(), &mut out)
            .unwrap();
        assert_eq!(n, packet.len());
        parse_device_id(&out).unwrap()
    }

    #[test]
    fn create_assigns_distinct_ids() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        let kbd = create(&mut transport, bus, DeviceKind::Keyboard);
        let mouse = create(&mut transport, bus, DeviceKind::Mouse);
        assert_ne!(kbd, mouse);
        assert_eq!(
            transport.live_devices(),
            vec![(kbd, DeviceKind::Keyboard), (mouse, DeviceKind::Mouse)]
        );
    }

    #[test]
    fn destroy_unknown_id_fails_with_not_found() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        let packet = DestroyDevicePacket::new(DeviceKind::Mouse, 42).to_bytes();
        let err = transport.write(bus, ioctl::BUS_DESTROY_DEVICE, &packet).unwrap_err();
        assert_eq!(err.code(), win32::ERROR_NOT_FOUND);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn reports_require_a_live_device_and_valid_bytes() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        let input = transport.open(&paths::input_device_path(1), Access::WriteOnly).unwrap();

        let release = KeyboardReport::released().encode();
        assert!(transport.write(input, ioctl::WRITE_KEYBOARD_REPORT, &release).is_err());

        create(&mut transport, bus, DeviceKind::Keyboard);
        transport.write(input, ioctl::WRITE_KEYBOARD_REPORT, &release).unwrap();

        let err = transport
            .write(input, ioctl::WRITE_KEYBOARD_REPORT, &[0, 1, 0, 0, 0, 0, 0, 0])
            .unwrap_err();
        assert_eq!(err.code(), win32::ERROR_INVALID_PARAMETER);
        assert_eq!(transport.keyboard_reports(), vec![KeyboardReport::released()]);
    }

    #[test]
    fn scripted_failures() {
        let mut transport = RecordingTransport::new();
        transport.set_unavailable(paths::BUS_DEVICE_PATH);
        assert!(!transport.is_available(paths::BUS_DEVICE_PATH, Access::ReadWrite));
        transport.clear_failures();
        assert!(transport.is_available(paths::BUS_DEVICE_PATH, Access::ReadWrite));

        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        transport.fail_create(DeviceKind::Mouse, 31);
        let packet = CreateDevicePacket::new(DeviceKind::Mouse);
        let mut out = packet.response_buffer();
        let err = transport
            .control(bus, ioctl::BUS_CREATE_DEVICE, packet.as_bytes(), &mut out)
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::IoControlFailed {
                opcode: ioctl::BUS_CREATE_DEVICE,
                code: 31
            }
        );
        assert!(transport.live_devices().is_empty());
    }

    #[test]
    fn closed_handles_are_rejected() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        transport.close(bus).unwrap();
        assert_eq!(transport.open_handles(), 0);
        assert_eq!(transport.close(bus), Err(TransportError::InvalidHandle(bus)));
    }

    #[test]
    fn create_needs_read_access() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::WriteOnly).unwrap();
        let packet = CreateDevicePacket::new(DeviceKind::Keyboard);
        let mut out = packet.response_buffer();
        let err = transport
            .control(bus, ioctl::BUS_CREATE_DEVICE, packet.as_bytes(), &mut out)
            .unwrap_err();
        assert_eq!(err.code(), win32::ERROR_ACCESS_DENIED);
        assert_eq!(
            transport.opened(),
            vec![(paths::BUS_DEVICE_PATH.to_string(), Access::WriteOnly)]
        );
    }

    #[test]
    fn children_list_planted_and_created_devices() {
        let mut transport = RecordingTransport::new();
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        let leftover = transport.plant_device(DeviceKind::Mouse);
        let foreign = transport.plant_foreign(0xC22F);
        let kbd = create(&mut transport, bus, DeviceKind::Keyboard);

        let children = transport.bus_children(paths::BUS_DEVICE_PATH).unwrap();
        let seen: Vec<(u32, Option<DeviceKind>)> =
            children.iter().map(|c| (c.device_id, c.kind())).collect();
        assert_eq!(
            seen,
            vec![
                (leftover, Some(DeviceKind::Mouse)),
                (kbd, Some(DeviceKind::Keyboard)),
                (foreign, None),
            ]
        );

        // Foreign children only go away with the OTHER flag
        let wrong = DestroyDevicePacket::new(DeviceKind::Mouse, foreign).to_bytes();
        assert!(transport.write(bus, ioctl::BUS_DESTROY_DEVICE, &wrong).is_err());
        let other = DestroyDevicePacket::other(foreign).to_bytes();
        transport.write(bus, ioctl::BUS_DESTROY_DEVICE, &other).unwrap();
        assert!(transport.foreign_devices().is_empty());
    }

    #[test]
    fn silent_create_still_adds_the_device() {
        let mut transport = RecordingTransport::new();
        transport.silence_create_responses(true);
        let bus = transport.open(paths::BUS_DEVICE_PATH, Access::ReadWrite).unwrap();
        let packet = CreateDevicePacket::new(DeviceKind::Keyboard);
        let mut out = packet.response_buffer();
        let n = transport
            .control(bus, ioctl::BUS_CREATE_DEVICE, packet.as_bytes(), &mut out)
            .unwrap();
        assert_eq!(n, 0);
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(transport.live_devices(), vec![(1, DeviceKind::Keyboard)]);
    }
}
