//! DeviceIoControl backend (Windows)
//!
//! Endpoints are opened synchronously (no FILE_FLAG_OVERLAPPED), so every
//! `control` call blocks until the driver completes the request. Bus children
//! are listed through the configuration manager (CM_Get_Child / CM_Get_Sibling).

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;

use tracing::{debug, warn};
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    CM_Get_Child, CM_Get_Device_IDW, CM_Get_Sibling, CM_Locate_DevNodeW, CM_MapCrToWin32Err,
    CM_LOCATE_DEVNODE_NORMAL, CONFIGRET, CR_NO_SUCH_DEVNODE, CR_SUCCESS, MAX_DEVICE_ID_LEN,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::DeviceIoControl;

use crate::discovery::{instance_id_from_interface_path, BusChild};
use crate::error::{win32, TransportError};
use crate::protocol::ioctl;
use crate::types::{Access, Handle};
use crate::Transport;

/// Transport over Win32 device handles
///
/// Raw handles are stored as integers so the transport stays `Send`.
#[derive(Debug, Default)]
pub struct WinIoctlTransport {
    next: u32,
    handles: HashMap<Handle, isize>,
}

impl WinIoctlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn raw(&self, handle: Handle) -> Result<HANDLE, TransportError> {
        self.handles
            .get(&handle)
            .map(|&h| h as HANDLE)
            .ok_or(TransportError::InvalidHandle(handle))
    }
}

fn to_wide(path: &str) -> Vec<u16> {
    path.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error() -> u32 {
    // SAFETY: reads the calling thread's last-error value, no preconditions
    unsafe { GetLastError() }
}

fn desired_access(access: Access) -> u32 {
    match access {
        Access::ReadWrite => GENERIC_READ | GENERIC_WRITE,
        Access::WriteOnly => GENERIC_WRITE,
    }
}

fn enumeration_error(path: &str, cr: CONFIGRET) -> TransportError {
    // SAFETY: pure code translation
    let code = unsafe { CM_MapCrToWin32Err(cr, win32::ERROR_NOT_FOUND) };
    TransportError::EnumerationFailed {
        path: path.to_string(),
        code,
    }
}

/// Instance id of one devnode, `None` if the node vanished meanwhile
fn devnode_instance_id(node: u32) -> Option<String> {
    let mut buf = [0u16; MAX_DEVICE_ID_LEN as usize + 1];
    // SAFETY: `buf` is valid for `buf.len()` UTF-16 units
    let cr = unsafe { CM_Get_Device_IDW(node, buf.as_mut_ptr(), buf.len() as u32, 0) };
    if cr != CR_SUCCESS {
        return None;
    }
    let len = buf.iter().position(|&unit| unit == 0).unwrap_or(buf.len());
    Some(String::from_utf16_lossy(&buf[..len]))
}

impl Transport for WinIoctlTransport {
    fn open(&mut self, path: &str, access: Access) -> Result<Handle, TransportError> {
        let wide = to_wide(path);
        // SAFETY: `wide` is NUL-terminated and outlives the call; no security
        // attributes or template handle are passed
        let raw = unsafe {
            CreateFileW(
                wide.as_ptr(),
                desired_access(access),
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if raw == INVALID_HANDLE_VALUE || raw.is_null() {
            let code = last_error();
            debug!("CreateFileW({}) failed: error {}", path, code);
            return Err(TransportError::DeviceUnavailable {
                path: path.to_string(),
                code,
            });
        }

        self.next += 1;
        let handle = Handle(self.next);
        self.handles.insert(handle, raw as isize);
        debug!("Opened {} as {} ({:?})", path, handle, access);
        Ok(handle)
    }

    fn control(
        &mut self,
        handle: Handle,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, TransportError> {
        let raw = self.raw(handle)?;
        let out_ptr = if output.is_empty() {
            ptr::null_mut()
        } else {
            output.as_mut_ptr() as *mut c_void
        };
        let mut returned: u32 = 0;

        debug!(
            "{} {} ({} bytes): {:02X?}",
            handle,
            ioctl::name(opcode),
            input.len(),
            input
        );

        // SAFETY: `raw` came from CreateFileW and is still open; the buffers
        // are valid for the lengths passed; no OVERLAPPED for a synchronous handle
        let ok = unsafe {
            DeviceIoControl(
                raw,
                opcode,
                input.as_ptr() as *const c_void,
                input.len() as u32,
                out_ptr,
                output.len() as u32,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            let code = last_error();
            return Err(TransportError::IoControlFailed { opcode, code });
        }
        Ok(returned as usize)
    }

    fn close(&mut self, handle: Handle) -> Result<(), TransportError> {
        let raw = self
            .handles
            .remove(&handle)
            .ok_or(TransportError::InvalidHandle(handle))?;
        // SAFETY: handle was opened by this transport and is removed from the
        // table, so it is closed exactly once
        if unsafe { CloseHandle(raw as HANDLE) } == 0 {
            warn!("CloseHandle({}) failed: error {}", handle, last_error());
        }
        Ok(())
    }

    fn bus_children(&mut self, bus_path: &str) -> Result<Vec<BusChild>, TransportError> {
        let instance = instance_id_from_interface_path(bus_path).ok_or_else(|| {
            TransportError::EnumerationFailed {
                path: bus_path.to_string(),
                code: win32::ERROR_INVALID_PARAMETER,
            }
        })?;
        let wide = to_wide(&instance);
        let mut bus: u32 = 0;
        // SAFETY: `wide` is NUL-terminated and outlives the call
        let cr = unsafe { CM_Locate_DevNodeW(&mut bus, wide.as_ptr(), CM_LOCATE_DEVNODE_NORMAL) };
        if cr != CR_SUCCESS {
            return Err(enumeration_error(bus_path, cr));
        }

        let mut children = Vec::new();
        let mut node: u32 = 0;
        // SAFETY: out-pointer is a live local
        let mut cr = unsafe { CM_Get_Child(&mut node, bus, 0) };
        while cr == CR_SUCCESS {
            if let Some(id) = devnode_instance_id(node) {
                match BusChild::parse(&id) {
                    Some(child) => children.push(child),
                    None => debug!("Skipping bus child {}", id),
                }
            }
            let mut next: u32 = 0;
            // SAFETY: out-pointer is a live local, `node` came from CM_Get_*
            cr = unsafe { CM_Get_Sibling(&mut next, node, 0) };
            node = next;
        }
        if cr != CR_NO_SUCH_DEVNODE {
            return Err(enumeration_error(bus_path, cr));
        }
        debug!("{} has {} children", instance, children.len());
        Ok(children)
    }

    fn name(&self) -> &'static str {
        "win-ioctl"
    }
}

impl Drop for WinIoctlTransport {
    fn drop(&mut self) {
        for (handle, raw) in self.handles.drain() {
            debug!("Closing leaked handle {}", handle);
            // SAFETY: every entry is a live handle owned by this transport
            unsafe {
                CloseHandle(raw as HANDLE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::paths;

    #[test]
    fn unknown_handle_is_rejected() {
        let mut transport = WinIoctlTransport::new();
        let bogus = Handle(99);
        assert_eq!(
            transport.control(bogus, ioctl::BUS_CREATE_DEVICE, &[], &mut []),
            Err(TransportError::InvalidHandle(bogus))
        );
    }

    #[test]
    #[ignore = "requires the LGHUB virtual bus driver"]
    fn bus_endpoint_opens() {
        let mut transport = WinIoctlTransport::new();
        assert!(transport.is_available(paths::BUS_DEVICE_PATH, Access::ReadWrite));
    }

    #[test]
    fn access_modes_map_to_generic_rights() {
        assert_eq!(desired_access(Access::WriteOnly), GENERIC_WRITE);
        assert_eq!(desired_access(Access::ReadWrite), GENERIC_READ | GENERIC_WRITE);
    }

    #[test]
    fn enumeration_rejects_non_interface_paths() {
        let mut transport = WinIoctlTransport::new();
        let err = transport.bus_children("C:\\not-a-bus").unwrap_err();
        assert_eq!(err.code(), win32::ERROR_INVALID_PARAMETER);
    }
}
