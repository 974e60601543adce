//! Virtual device lifecycle on the LGHUB bus
//!
//! Each kind moves through `Absent -> Creating -> Present -> Destroying ->
//! Absent` independently. A create that fails leaves the kind `Absent`; a
//! destroy that fails still leaves it `Absent` (the id is forgotten) but the
//! error is returned.
//!
//! Devices already on the bus (an earlier run that never tore down, a create
//! whose response got lost) are found by enumerating the bus children. They
//! can be adopted as our own or destroyed.

use logi_vhid_transport::protocol::{ioctl, layout};
use logi_vhid_transport::{
    parse_device_id, Access, BusChild, CreateDevicePacket, DestroyDevicePacket, DeviceKind,
    Handle, KeyboardReport, MouseReport, SharedTransport, TransportError,
};
use tracing::{debug, info, warn};

use crate::error::VhidError;
use crate::sink::ReportSink;

/// A device the bus accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    /// Id the driver echoed back on create
    pub opaque_id: u32,
}

/// Per-kind lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Absent,
    Creating,
    Present(DeviceDescriptor),
    Destroying(DeviceDescriptor),
}

/// Creates, tracks and destroys the virtual keyboard and mouse
pub struct DeviceLifecycle {
    transport: SharedTransport,
    bus: Option<Handle>,
    bus_path: Option<String>,
    input: Option<Handle>,
    keyboard: DeviceState,
    mouse: DeviceState,
}

impl DeviceLifecycle {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            bus: None,
            bus_path: None,
            input: None,
            keyboard: DeviceState::Absent,
            mouse: DeviceState::Absent,
        }
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    fn bus(&self) -> Result<Handle, VhidError> {
        self.bus.ok_or_else(|| VhidError::DeviceUnavailable {
            detail: "bus control endpoint is not open".to_string(),
            code: None,
        })
    }

    fn slot(&mut self, kind: DeviceKind) -> &mut DeviceState {
        match kind {
            DeviceKind::Keyboard => &mut self.keyboard,
            DeviceKind::Mouse => &mut self.mouse,
        }
    }

    pub fn state(&self, kind: DeviceKind) -> DeviceState {
        match kind {
            DeviceKind::Keyboard => self.keyboard,
            DeviceKind::Mouse => self.mouse,
        }
    }

    pub fn descriptor(&self, kind: DeviceKind) -> Option<DeviceDescriptor> {
        match self.state(kind) {
            DeviceState::Present(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn is_present(&self, kind: DeviceKind) -> bool {
        self.descriptor(kind).is_some()
    }

    pub fn any_present(&self) -> bool {
        DeviceKind::ALL.iter().any(|&k| self.is_present(k))
    }

    pub fn is_bus_open(&self) -> bool {
        self.bus.is_some()
    }

    pub fn is_input_open(&self) -> bool {
        self.input.is_some()
    }

    /// Open the bus control endpoint (no-op when already open)
    pub fn open_bus(&mut self, path: &str) -> Result<(), VhidError> {
        if self.bus.is_some() {
            return Ok(());
        }
        let handle = self.transport.lock().open(path, Access::ReadWrite)?;
        info!("Opened virtual bus {}", path);
        self.bus = Some(handle);
        self.bus_path = Some(path.to_string());
        Ok(())
    }

    pub fn close_bus(&mut self) {
        self.bus_path = None;
        if let Some(handle) = self.bus.take() {
            close_logged(&self.transport, handle, "bus");
        }
    }

    /// Create one virtual device
    ///
    /// # Returns
    /// The opaque id the driver assigned
    ///
    /// A driver that reports success without echoing the id back has still
    /// made the device, so the bus is searched for it before giving up.
    pub fn create(&mut self, kind: DeviceKind) -> Result<u32, VhidError> {
        let bus = self.bus()?;
        if self.state(kind) != DeviceState::Absent {
            return Err(VhidError::invalid(format!("virtual {kind} already exists")));
        }

        *self.slot(kind) = DeviceState::Creating;
        let packet = CreateDevicePacket::new(kind);
        let mut response = packet.response_buffer();
        debug!("Creating virtual {} ({} bytes)", kind, packet.len());

        let result = self
            .transport
            .lock()
            .control(bus, ioctl::BUS_CREATE_DEVICE, packet.as_bytes(), &mut response);
        let id = match result {
            Ok(returned) if returned >= layout::DEVICE_ID_OFFSET + 4 => {
                parse_device_id(&response).map_err(|e| {
                    warn!("Create response for {} unreadable: {}", kind, e);
                    VhidError::DeviceCreationFailed { kind, code: 0 }
                })
            }
            Ok(returned) => {
                warn!(
                    "Create of {} returned {} bytes, looking for it on the bus",
                    kind, returned
                );
                self.find_untracked(kind)
                    .ok_or(VhidError::DeviceCreationFailed { kind, code: 0 })
            }
            Err(e) => Err(creation_error(kind, e)),
        };

        match id {
            Ok(id) => {
                *self.slot(kind) = DeviceState::Present(DeviceDescriptor {
                    kind,
                    opaque_id: id,
                });
                info!("Virtual {} created (id {})", kind, id);
                Ok(id)
            }
            Err(e) => {
                *self.slot(kind) = DeviceState::Absent;
                Err(e)
            }
        }
    }

    /// Destroy one virtual device
    pub fn destroy(&mut self, kind: DeviceKind) -> Result<(), VhidError> {
        let desc = self
            .descriptor(kind)
            .ok_or_else(|| VhidError::not_ready(kind))?;
        let bus = self.bus()?;

        *self.slot(kind) = DeviceState::Destroying(desc);
        let result = self.send_destroy(bus, DestroyDevicePacket::new(kind, desc.opaque_id));
        *self.slot(kind) = DeviceState::Absent;

        result.map_err(|code| VhidError::DeviceDestructionFailed { kind, code })?;
        info!("Virtual {} destroyed (id {})", kind, desc.opaque_id);
        Ok(())
    }

    fn send_destroy(&self, bus: Handle, packet: DestroyDevicePacket) -> Result<(), u32> {
        self.transport
            .lock()
            .write(bus, ioctl::BUS_DESTROY_DEVICE, &packet.to_bytes())
            .map_err(|e| e.code())
    }

    /// Devices currently enumerated under the open bus
    pub fn scan_bus(&self) -> Result<Vec<BusChild>, VhidError> {
        let path = self
            .bus_path
            .as_deref()
            .ok_or_else(|| VhidError::DeviceUnavailable {
                detail: "bus control endpoint is not open".to_string(),
                code: None,
            })?;
        let children = self.transport.lock().bus_children(path)?;
        debug!("Bus has {} children", children.len());
        Ok(children)
    }

    fn is_tracked(&self, device_id: u32) -> bool {
        DeviceKind::ALL
            .iter()
            .filter_map(|&k| match self.state(k) {
                DeviceState::Present(desc) | DeviceState::Destroying(desc) => Some(desc),
                _ => None,
            })
            .any(|desc| desc.opaque_id == device_id)
    }

    /// Id of a `kind` device on the bus that nothing here tracks yet
    fn find_untracked(&self, kind: DeviceKind) -> Option<u32> {
        match self.scan_bus() {
            Ok(children) => children
                .iter()
                .filter(|c| c.kind() == Some(kind))
                .map(|c| c.device_id)
                .find(|&id| !self.is_tracked(id)),
            Err(e) => {
                warn!("Bus enumeration failed: {}", e);
                None
            }
        }
    }

    /// Take over keyboard/mouse devices already on the bus
    ///
    /// Only kinds that are `Absent` are adopted, the first matching child
    /// each.
    ///
    /// # Returns
    /// The kinds that are now `Present`
    pub fn adopt_existing(&mut self) -> Result<Vec<DeviceKind>, VhidError> {
        let children = self.scan_bus()?;
        let mut adopted = Vec::new();
        for kind in DeviceKind::ALL {
            if self.state(kind) != DeviceState::Absent {
                continue;
            }
            let found = children
                .iter()
                .filter(|c| c.kind() == Some(kind))
                .find(|c| !self.is_tracked(c.device_id));
            if let Some(child) = found {
                info!("Adopted existing virtual {} (id {})", kind, child.device_id);
                *self.slot(kind) = DeviceState::Present(DeviceDescriptor {
                    kind,
                    opaque_id: child.device_id,
                });
                adopted.push(kind);
            }
        }
        Ok(adopted)
    }

    /// Destroy bus children this lifecycle does not track
    ///
    /// Keyboard and mouse children are destroyed with their own type flag.
    /// Any other child is destroyed with the OTHER flag, but only when
    /// `include_foreign` is set. Keeps going after a failure and returns the
    /// first error.
    ///
    /// # Returns
    /// Number of children destroyed
    pub fn destroy_orphans(&mut self, include_foreign: bool) -> Result<usize, VhidError> {
        let bus = self.bus()?;
        let mut destroyed = 0;
        let mut first = None;
        for child in self.scan_bus()? {
            if self.is_tracked(child.device_id) {
                continue;
            }
            let packet = match child.kind() {
                Some(kind) => DestroyDevicePacket::new(kind, child.device_id),
                None if include_foreign => DestroyDevicePacket::other(child.device_id),
                None => {
                    debug!("Leaving foreign bus child {}", child.instance_id);
                    continue;
                }
            };
            match self.send_destroy(bus, packet) {
                Ok(()) => {
                    info!("Destroyed orphan {}", child.instance_id);
                    destroyed += 1;
                }
                Err(code) => {
                    warn!("Destroying orphan {} failed: error {}", child.instance_id, code);
                    let err = match child.kind() {
                        Some(kind) => VhidError::DeviceDestructionFailed { kind, code },
                        None => VhidError::IoControlFailed {
                            opcode: ioctl::BUS_DESTROY_DEVICE,
                            code,
                        },
                    };
                    first.get_or_insert(err);
                }
            }
        }
        first.map_or(Ok(destroyed), Err)
    }

    /// Destroy every present device, keyboard first
    ///
    /// Keeps going after a failure and returns the first error.
    pub fn destroy_all(&mut self) -> Result<(), VhidError> {
        let mut first = None;
        for kind in DeviceKind::ALL {
            if !self.is_present(kind) {
                continue;
            }
            if let Err(e) = self.destroy(kind) {
                warn!("Teardown of virtual {} failed: {}", kind, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Open the first input endpoint that accepts a handle
    ///
    /// # Returns
    /// The path that opened
    pub fn open_input_endpoint(&mut self, candidates: &[String]) -> Result<String, VhidError> {
        if self.input.is_some() {
            return Err(VhidError::invalid("input endpoint already open"));
        }
        let mut last = None;
        for path in candidates {
            let opened = self.transport.lock().open(path, Access::WriteOnly);
            match opened {
                Ok(handle) => {
                    info!("Opened input endpoint {}", path);
                    self.input = Some(handle);
                    return Ok(path.clone());
                }
                Err(e) => {
                    debug!("Input endpoint {} unavailable: {}", path, e);
                    last = Some(e);
                }
            }
        }
        Err(match last {
            Some(e) => e.into(),
            None => VhidError::DeviceUnavailable {
                detail: "no input endpoint candidates configured".to_string(),
                code: None,
            },
        })
    }

    pub fn close_input_endpoint(&mut self) {
        if let Some(handle) = self.input.take() {
            close_logged(&self.transport, handle, "input endpoint");
        }
    }

    fn send_report(&mut self, kind: DeviceKind, bytes: &[u8]) -> Result<(), VhidError> {
        if !self.is_present(kind) {
            return Err(VhidError::not_ready(kind));
        }
        let input = self.input.ok_or(VhidError::NotInitialized)?;
        self.transport
            .lock()
            .write(input, kind.report_ioctl(), bytes)
            .map_err(VhidError::from)
    }
}

impl ReportSink for DeviceLifecycle {
    fn is_ready(&self, kind: DeviceKind) -> bool {
        self.is_present(kind) && self.input.is_some()
    }

    fn send_keyboard(&mut self, report: &KeyboardReport) -> Result<(), VhidError> {
        self.send_report(DeviceKind::Keyboard, &report.encode())
    }

    fn send_mouse(&mut self, report: &MouseReport) -> Result<(), VhidError> {
        self.send_report(DeviceKind::Mouse, &report.encode())
    }
}

fn creation_error(kind: DeviceKind, err: TransportError) -> VhidError {
    match err {
        TransportError::IoControlFailed { code, .. } => VhidError::DeviceCreationFailed { kind, code },
        other => other.into(),
    }
}

fn close_logged(transport: &SharedTransport, handle: Handle, what: &str) {
    if let Err(e) = transport.lock().close(handle) {
        warn!("Closing {} {} failed: {}", what, handle, e);
    }
}
