//! Decoding of foreign enumeration records
//!
//! Records are copied into owned [`DeviceDescriptor`]s while the list is
//! walked. Nothing decoded here keeps a pointer into transport memory.

use hid_ffi::raw::RawDeviceInfo;
use hid_ffi::{HidError, Result, wide};
use std::ffi::{CStr, CString};
use std::ptr::NonNull;

/// Upper bound on the entries of one enumeration list
///
/// Real device sets never get close; hitting it means the list is corrupt
/// or links back on itself.
pub const MAX_DEVICE_COUNT: usize = 255;

/// Owned copy of one enumeration record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    /// Platform-specific device path; `None` when the device has no
    /// addressable path
    pub path: Option<CString>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    /// Device release number in binary-coded decimal
    pub release_number: u16,
    pub manufacturer_string: Option<String>,
    pub product_string: Option<String>,
    pub usage_page: u16,
    pub usage: u16,
    /// USB interface this logical device represents (-1 if unknown)
    pub interface_number: i32,
}

impl DeviceDescriptor {
    /// Copy one record out of transport memory
    ///
    /// # Safety
    ///
    /// Every string pointer in `raw` must be null or point to a valid
    /// NUL-terminated string.
    pub unsafe fn decode(raw: &RawDeviceInfo) -> Self {
        let path = if raw.path.is_null() {
            None
        } else {
            // SAFETY: non-null and NUL-terminated per the caller.
            let path = unsafe { CStr::from_ptr(raw.path) };
            (!path.is_empty()).then(|| path.to_owned())
        };

        // SAFETY: string pointers are null or terminated per the caller.
        let (serial_number, manufacturer_string, product_string) = unsafe {
            (
                wide::decode_ptr(raw.serial_number),
                wide::decode_ptr(raw.manufacturer_string),
                wide::decode_ptr(raw.product_string),
            )
        };

        Self {
            path,
            vendor_id: raw.vendor_id,
            product_id: raw.product_id,
            serial_number,
            release_number: raw.release_number,
            manufacturer_string,
            product_string,
            usage_page: raw.usage_page,
            usage: raw.usage,
            interface_number: raw.interface_number,
        }
    }

    /// Whether the device can be opened by path
    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Path as UTF-8, lossily converted; empty when there is none
    pub fn path_lossy(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Decode a whole enumeration list, in list order
///
/// The walk stops at the terminator. A list with more than
/// [`MAX_DEVICE_COUNT`] entries fails with
/// [`HidError::EnumerationOverflow`], which also bounds cyclic lists.
///
/// # Safety
///
/// Every node reachable from `head` (up to the bound) must be a valid
/// record as described by [`DeviceDescriptor::decode`].
pub unsafe fn decode_list(head: NonNull<RawDeviceInfo>) -> Result<Vec<DeviceDescriptor>> {
    let mut descriptors = Vec::new();
    let mut node = head.as_ptr();

    while !node.is_null() {
        if descriptors.len() == MAX_DEVICE_COUNT {
            return Err(HidError::EnumerationOverflow {
                limit: MAX_DEVICE_COUNT,
            });
        }

        // SAFETY: non-null node reachable from `head`.
        let raw = unsafe { &*node };
        descriptors.push(unsafe { DeviceDescriptor::decode(raw) });
        node = raw.next;
    }

    Ok(descriptors)
}
