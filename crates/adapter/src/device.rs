//! HID device handle
//!
//! A [`DeviceHandle`] is built from one decoded enumeration record. It owns
//! the native device reference while connected, frames output reports, and
//! keeps private scratch buffers for writes and string queries.

use crate::descriptor::DeviceDescriptor;
use hid_ffi::{Dispatcher, RawDevice, wide};
use libc::wchar_t;
use std::ffi::CStr;
use std::fmt;
use std::iter::FusedIterator;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, warn};

/// Initial size of the write scratch buffer
pub const WRITE_BUFFER_DEFAULT_SIZE: usize = 1024;

/// Upper bound on entries yielded by [`DeviceHandle::device_strings`]
pub const MAX_INDEXED_STRINGS: i32 = 16;

/// Connection state of a [`DeviceHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Decoded from enumeration, never opened
    Discovered,
    /// Holding a live native reference
    Connected,
    /// Reference released; may connect again
    Disconnected,
}

/// One discovered HID device
///
/// Handles are used from one thread at a time: every operation that touches
/// the scratch buffers takes `&mut self`. Dropping a connected handle closes
/// its native reference.
pub struct DeviceHandle {
    descriptor: DeviceDescriptor,
    dispatcher: Arc<Dispatcher>,
    device: Option<NonNull<RawDevice>>,
    state: DeviceState,
    write_buf: Vec<u8>,
    string_buf: Box<[wchar_t]>,
}

impl DeviceHandle {
    /// Create a handle in the `Discovered` state
    pub fn new(descriptor: DeviceDescriptor, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            descriptor,
            dispatcher,
            device: None,
            state: DeviceState::Discovered,
            write_buf: vec![0; WRITE_BUFFER_DEFAULT_SIZE],
            string_buf: vec![0; wide::MAX_STRING_LEN].into_boxed_slice(),
        }
    }

    /// Decoded enumeration record
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id
    }

    pub fn usage_page(&self) -> u16 {
        self.descriptor.usage_page
    }

    pub fn usage(&self) -> u16 {
        self.descriptor.usage
    }

    pub fn release_number(&self) -> u16 {
        self.descriptor.release_number
    }

    pub fn interface_number(&self) -> i32 {
        self.descriptor.interface_number
    }

    /// Platform-specific device path
    pub fn path(&self) -> Option<&CStr> {
        self.descriptor.path.as_deref()
    }

    /// Device path as UTF-8; empty when the device has no path
    pub fn path_lossy(&self) -> String {
        self.descriptor.path_lossy()
    }

    /// Whether both handles address the same physical interface
    ///
    /// Vendor and product IDs cannot tell identical devices apart; the path
    /// can.
    pub fn same_device(&self, other: &DeviceHandle) -> bool {
        self.descriptor.path.is_some() && self.descriptor.path == other.descriptor.path
    }

    /// Open the device by path
    ///
    /// Returns true iff the transport handed back a device reference. A
    /// handle without an addressable path returns false without calling the
    /// transport.
    pub fn connect(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }

        let Some(path) = self.descriptor.path.as_deref() else {
            debug!(
                "Device {:04x}:{:04x} has no path, cannot connect",
                self.descriptor.vendor_id, self.descriptor.product_id
            );
            return false;
        };

        match self.dispatcher.open_path(path) {
            Some(device) => {
                self.device = Some(device);
                self.state = DeviceState::Connected;
                debug!("Connected to {}", path.to_string_lossy());
                true
            }
            None => {
                warn!("Failed to open device {}", path.to_string_lossy());
                false
            }
        }
    }

    /// Close the native reference
    ///
    /// Returns false, without a transport call, when not connected.
    pub fn disconnect(&mut self) -> bool {
        let Some(device) = self.device.take() else {
            return false;
        };

        // SAFETY: `device` came from open_path and is dropped from the
        // handle before the call, so it cannot be used again.
        unsafe { self.dispatcher.close(device) };
        self.state = DeviceState::Disconnected;
        debug!("Disconnected from {}", self.descriptor.path_lossy());
        true
    }

    /// Send an output report
    ///
    /// The caller supplies only the payload. The transport receives one
    /// frame: a zero report-ID byte followed by `bytes`, of length
    /// `bytes.len() + 1`. The transport's result is returned unchanged
    /// (bytes written, or -1).
    ///
    /// Empty or absent input, or a handle that is not connected, returns 0
    /// without calling the transport.
    pub fn write<'b>(&mut self, bytes: impl Into<Option<&'b [u8]>>) -> i32 {
        let Some(bytes) = bytes.into().filter(|b| !b.is_empty()) else {
            return 0;
        };
        let Some(device) = self.device else {
            return 0;
        };

        let frame_len = bytes.len() + 1;
        if self.write_buf.len() < frame_len {
            self.write_buf.resize(frame_len, 0);
        }
        self.write_buf[0] = 0;
        self.write_buf[1..frame_len].copy_from_slice(bytes);

        debug!("Writing {} byte frame", frame_len);
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.write(device, &self.write_buf[..frame_len]) }
    }

    /// Read an input report into `buf`
    ///
    /// Returns bytes read, 0 when no data is pending, or -1. A handle that
    /// is not connected returns 0.
    pub fn read(&mut self, buf: &mut [u8]) -> i32 {
        let Some(device) = self.device else {
            return 0;
        };
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.read(device, buf) }
    }

    /// Read with a timeout in milliseconds
    ///
    /// [`hid_ffi::BLOCKING`] waits indefinitely. Returns bytes read, 0 on
    /// timeout, or -1.
    pub fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> i32 {
        let Some(device) = self.device else {
            return 0;
        };
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.read_timeout(device, buf, timeout_ms) }
    }

    /// Make `read` return immediately when no report is pending
    ///
    /// Returns 0 on success or -1, including when not connected.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> i32 {
        let Some(device) = self.device else {
            return -1;
        };
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.set_nonblocking(device, nonblocking) }
    }

    /// Send a feature report; `data[0]` is the report ID
    ///
    /// No framing is added. Returns bytes sent or -1.
    pub fn send_feature_report(&mut self, data: &[u8]) -> i32 {
        let Some(device) = self.device else {
            return -1;
        };
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.send_feature_report(device, data) }
    }

    /// Get a feature report; set `buf[0]` to the report ID first
    ///
    /// Returns bytes read (including the report ID) or -1.
    pub fn get_feature_report(&mut self, buf: &mut [u8]) -> i32 {
        let Some(device) = self.device else {
            return -1;
        };
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.get_feature_report(device, buf) }
    }

    /// Manufacturer string, or empty on failure
    pub fn manufacturer(&mut self) -> String {
        self.query_string("manufacturer", |d, dev, buf| unsafe {
            d.get_manufacturer_string(dev, buf)
        })
        .unwrap_or_default()
    }

    /// Product string, or empty on failure
    pub fn product(&mut self) -> String {
        self.query_string("product", |d, dev, buf| unsafe {
            d.get_product_string(dev, buf)
        })
        .unwrap_or_default()
    }

    /// Serial number string, or empty on failure
    pub fn serial_number(&mut self) -> String {
        self.query_string("serial number", |d, dev, buf| unsafe {
            d.get_serial_number_string(dev, buf)
        })
        .unwrap_or_default()
    }

    /// String descriptor `index`, or empty on failure
    pub fn indexed_string(&mut self, index: i32) -> String {
        self.try_indexed_string(index).unwrap_or_default()
    }

    /// Indexed strings from 0 up to the first failure
    ///
    /// The sequence is lazy and forward-only, and stops after
    /// [`MAX_INDEXED_STRINGS`] entries.
    pub fn device_strings(&mut self) -> DeviceStrings<'_> {
        DeviceStrings {
            handle: self,
            index: 0,
            done: false,
        }
    }

    /// Last error message the transport recorded for this device
    pub fn last_error(&mut self) -> Option<String> {
        let device = self.device?;
        // SAFETY: `device` is the live reference held by this handle.
        unsafe { self.dispatcher.last_error(device) }
    }

    fn try_indexed_string(&mut self, index: i32) -> Option<String> {
        self.query_string("indexed", |d, dev, buf| unsafe {
            d.get_indexed_string(dev, index, buf)
        })
    }

    /// Run one string query through the shared scratch buffer
    ///
    /// The closures above call into the transport with `dev`, which is the
    /// live reference held by this handle for the duration of the call.
    fn query_string(
        &mut self,
        what: &str,
        call: impl FnOnce(&Dispatcher, NonNull<RawDevice>, &mut [wchar_t]) -> i32,
    ) -> Option<String> {
        let device = self.device?;

        self.string_buf.fill(0);
        if call(&*self.dispatcher, device, &mut *self.string_buf) < 0 {
            debug!(
                "Failed to read {} string from {}",
                what,
                self.descriptor.path_lossy()
            );
            return None;
        }

        Some(wide::decode(&self.string_buf))
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.descriptor.path)
            .field("vendor_id", &format_args!("{:#06x}", self.descriptor.vendor_id))
            .field("product_id", &format_args!("{:#06x}", self.descriptor.product_id))
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_connected() {
            return write!(f, "unknown device (not connected)");
        }

        let d = &self.descriptor;
        write!(
            f,
            "manufacturer: {}, serial_number: {}, product: {}",
            d.manufacturer_string.as_deref().unwrap_or(""),
            d.serial_number.as_deref().unwrap_or(""),
            d.product_string.as_deref().unwrap_or("")
        )
    }
}

/// Iterator returned by [`DeviceHandle::device_strings`]
pub struct DeviceStrings<'a> {
    handle: &'a mut DeviceHandle,
    index: i32,
    done: bool,
}

impl Iterator for DeviceStrings<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done || self.index >= MAX_INDEXED_STRINGS {
            self.done = true;
            return None;
        }

        match self.handle.try_indexed_string(self.index) {
            Some(s) => {
                self.index += 1;
                Some(s)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl FusedIterator for DeviceStrings<'_> {}
