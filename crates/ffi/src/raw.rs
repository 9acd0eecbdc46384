//! Foreign types of the native HID transport
//!
//! Layouts and signatures here must match the hidapi C headers exactly.

use libc::{c_char, c_int, c_uchar, c_ushort, size_t, wchar_t};

/// Opaque native device reference (`hid_device`)
#[repr(C)]
pub struct RawDevice {
    _private: [u8; 0],
}

/// One node of the linked list returned by `hid_enumerate`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDeviceInfo {
    /// Platform-specific device path
    pub path: *mut c_char,
    pub vendor_id: c_ushort,
    pub product_id: c_ushort,
    pub serial_number: *mut wchar_t,
    /// Device release number in binary-coded decimal
    pub release_number: c_ushort,
    pub manufacturer_string: *mut wchar_t,
    pub product_string: *mut wchar_t,
    pub usage_page: c_ushort,
    pub usage: c_ushort,
    pub interface_number: c_int,
    /// Next node, or null at the end of the list
    pub next: *mut RawDeviceInfo,
}

pub type InitFn = unsafe extern "C" fn() -> c_int;
pub type ExitFn = unsafe extern "C" fn() -> c_int;
pub type EnumerateFn = unsafe extern "C" fn(c_ushort, c_ushort) -> *mut RawDeviceInfo;
pub type FreeEnumerationFn = unsafe extern "C" fn(*mut RawDeviceInfo);
pub type OpenPathFn = unsafe extern "C" fn(*const c_char) -> *mut RawDevice;
pub type WriteFn = unsafe extern "C" fn(*mut RawDevice, *const c_uchar, size_t) -> c_int;
pub type ReadFn = unsafe extern "C" fn(*mut RawDevice, *mut c_uchar, size_t) -> c_int;
pub type ReadTimeoutFn =
    unsafe extern "C" fn(*mut RawDevice, *mut c_uchar, size_t, c_int) -> c_int;
pub type SetNonblockingFn = unsafe extern "C" fn(*mut RawDevice, c_int) -> c_int;
pub type SendFeatureReportFn = unsafe extern "C" fn(*mut RawDevice, *const c_uchar, size_t) -> c_int;
pub type GetFeatureReportFn = unsafe extern "C" fn(*mut RawDevice, *mut c_uchar, size_t) -> c_int;
pub type CloseFn = unsafe extern "C" fn(*mut RawDevice);
pub type GetStringFn = unsafe extern "C" fn(*mut RawDevice, *mut wchar_t, size_t) -> c_int;
pub type GetIndexedStringFn =
    unsafe extern "C" fn(*mut RawDevice, c_int, *mut wchar_t, size_t) -> c_int;
pub type ErrorFn = unsafe extern "C" fn(*mut RawDevice) -> *const wchar_t;

/// Function table for one transport binding
///
/// Every operation the adapter performs goes through one of these entries.
/// A table is either resolved from a loaded shared library
/// (see [`crate::Dispatcher::load`]) or supplied in-process.
#[derive(Debug, Clone, Copy)]
pub struct TransportApi {
    pub init: InitFn,
    pub exit: ExitFn,
    pub enumerate: EnumerateFn,
    pub free_enumeration: FreeEnumerationFn,
    pub open_path: OpenPathFn,
    pub write: WriteFn,
    pub read: ReadFn,
    pub read_timeout: ReadTimeoutFn,
    pub set_nonblocking: SetNonblockingFn,
    pub send_feature_report: SendFeatureReportFn,
    pub get_feature_report: GetFeatureReportFn,
    pub close: CloseFn,
    pub get_manufacturer_string: GetStringFn,
    pub get_product_string: GetStringFn,
    pub get_serial_number_string: GetStringFn,
    pub get_indexed_string: GetIndexedStringFn,
    pub error: ErrorFn,
}

/// Exported symbol names, in [`TransportApi`] field order
pub const SYMBOLS: [&str; 17] = [
    "hid_init",
    "hid_exit",
    "hid_enumerate",
    "hid_free_enumeration",
    "hid_open_path",
    "hid_write",
    "hid_read",
    "hid_read_timeout",
    "hid_set_nonblocking",
    "hid_send_feature_report",
    "hid_get_feature_report",
    "hid_close",
    "hid_get_manufacturer_string",
    "hid_get_product_string",
    "hid_get_serial_number_string",
    "hid_get_indexed_string",
    "hid_error",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_device_info_field_order() {
        let ptr = size_of::<*const ()>();

        assert_eq!(offset_of!(RawDeviceInfo, path), 0);
        assert_eq!(offset_of!(RawDeviceInfo, vendor_id), ptr);
        assert_eq!(offset_of!(RawDeviceInfo, product_id), ptr + 2);
        assert!(offset_of!(RawDeviceInfo, serial_number) > offset_of!(RawDeviceInfo, product_id));
        assert!(
            offset_of!(RawDeviceInfo, release_number) > offset_of!(RawDeviceInfo, serial_number)
        );
        assert!(
            offset_of!(RawDeviceInfo, manufacturer_string)
                > offset_of!(RawDeviceInfo, release_number)
        );
        assert!(
            offset_of!(RawDeviceInfo, product_string)
                > offset_of!(RawDeviceInfo, manufacturer_string)
        );
        assert_eq!(
            offset_of!(RawDeviceInfo, usage),
            offset_of!(RawDeviceInfo, usage_page) + 2
        );
        assert_eq!(
            offset_of!(RawDeviceInfo, interface_number),
            offset_of!(RawDeviceInfo, usage) + 2
        );
        assert_eq!(
            offset_of!(RawDeviceInfo, next) + ptr,
            size_of::<RawDeviceInfo>()
        );
        assert_eq!(align_of::<RawDeviceInfo>(), ptr);
    }

    #[test]
    fn test_symbol_names_unique() {
        let mut names = SYMBOLS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SYMBOLS.len());
        assert!(SYMBOLS.iter().all(|s| s.starts_with("hid_")));
    }
}
