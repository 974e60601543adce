//! Where encoded input reports go

use logi_vhid_transport::{DeviceKind, KeyboardReport, MouseReport};

use crate::error::VhidError;

/// Destination for input reports
///
/// The engine checks `is_ready` before touching its state and commits the
/// new state only after `send_*` returns `Ok`.
pub trait ReportSink {
    /// Whether reports for `kind` can be delivered
    fn is_ready(&self, kind: DeviceKind) -> bool;

    fn send_keyboard(&mut self, report: &KeyboardReport) -> Result<(), VhidError>;

    fn send_mouse(&mut self, report: &MouseReport) -> Result<(), VhidError>;
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn is_ready(&self, kind: DeviceKind) -> bool {
        (**self).is_ready(kind)
    }

    fn send_keyboard(&mut self, report: &KeyboardReport) -> Result<(), VhidError> {
        (**self).send_keyboard(report)
    }

    fn send_mouse(&mut self, report: &MouseReport) -> Result<(), VhidError> {
        (**self).send_mouse(report)
    }
}
