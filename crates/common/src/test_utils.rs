//! Test utilities for hid-adapter
//!
//! Provides an in-process transport double: every hidapi contract function
//! is implemented as a Rust `extern "C" fn` over thread-local state, so the
//! adapter runs its real dispatch and decoding paths against it. Enumeration
//! hands out genuine `#[repr(C)]` linked lists, optionally cyclic.
//!
//! Each test thread sees its own transport; [`FakeTransport::install`]
//! resets it.
//!
//! # Example
//!
//! ```ignore
//! use common::test_utils::{FakeTransport, create_mock_device};
//!
//! let fake = FakeTransport::install(vec![create_mock_device(1, 0x1234, 0x5678)]);
//! let dispatcher = fake.dispatcher();
//! assert_eq!(dispatcher.init(), 0);
//! assert!(dispatcher.enumerate(0x1234, 0).is_some());
//! ```

use hid_ffi::raw::RawDeviceInfo;
use hid_ffi::{Dispatcher, PlatformVariant, RawDevice, TransportApi, wide};
use libc::{c_char, c_int, c_uchar, c_ushort, size_t, wchar_t};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;

/// A device the fake transport reports during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDevice {
    /// `None` produces a node with a null path
    pub path: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub release_number: u16,
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
    /// Answers for `hid_get_indexed_string`; indices past the end fail
    pub indexed_strings: Vec<String>,
}

/// Create a mock device with predictable strings
///
/// # Example
/// ```ignore
/// use common::test_utils::create_mock_device;
///
/// let device = create_mock_device(3, 0x046d, 0xc52b);
/// assert_eq!(device.path.as_deref(), Some("/dev/hidraw3"));
/// assert_eq!(device.vendor_id, 0x046d);
/// ```
pub fn create_mock_device(id: u32, vendor_id: u16, product_id: u16) -> FakeDevice {
    FakeDevice {
        path: Some(format!("/dev/hidraw{}", id)),
        vendor_id,
        product_id,
        serial_number: Some(format!("SN{:06}", id)),
        manufacturer: Some(format!("Test Manufacturer {}", id)),
        product: Some(format!("Test Product {}", id)),
        release_number: 0x0100,
        usage_page: 0x0001,
        usage: 0x0006,
        interface_number: 0,
        indexed_strings: Vec::new(),
    }
}

/// Create `count` mock devices with distinct IDs and paths
pub fn create_mock_device_list(count: u32) -> Vec<FakeDevice> {
    (1..=count)
        .map(|i| create_mock_device(i, 0x1000 + (i as u16), 0x2000 + (i as u16)))
        .collect()
}

/// Knobs for failure injection
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    /// `hid_init` returns -1
    pub fail_init: bool,
    /// `hid_open_path` returns null for every path
    pub fail_open: bool,
    /// `hid_get_serial_number_string` returns -1
    pub fail_serial: bool,
    /// Link the last enumerated node back to the first
    pub cyclic: bool,
    /// Replaces the byte count `hid_write` reports
    pub write_result: Option<i32>,
    /// Returned by `hid_get_feature_report`
    pub feature_report: Vec<u8>,
    /// Returned by `hid_error`
    pub last_error: Option<String>,
}

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Init,
    Exit,
    Enumerate { vendor_id: u16, product_id: u16 },
    FreeEnumeration,
    OpenPath(String),
    Write(Vec<u8>),
    Read { len: usize },
    ReadTimeout { len: usize, timeout_ms: i32 },
    SetNonblocking(bool),
    SendFeatureReport(Vec<u8>),
    GetFeatureReport { len: usize },
    Close,
    GetManufacturerString,
    GetProductString,
    GetSerialNumberString,
    GetIndexedString(i32),
    Error,
}

/// Handle to this thread's fake transport
#[derive(Debug)]
pub struct FakeTransport {
    _private: (),
}

impl FakeTransport {
    /// Reset the fake and make `devices` enumerable
    pub fn install(devices: Vec<FakeDevice>) -> Self {
        with_state(|s| *s = FakeState::new(devices));
        Self { _private: () }
    }

    /// Adjust failure injection
    pub fn with_behavior(self, configure: impl FnOnce(&mut FakeBehavior)) -> Self {
        with_state(|s| configure(&mut s.behavior));
        self
    }

    /// Dispatcher routed through the fake function table
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        let variant = PlatformVariant::current().unwrap_or(PlatformVariant::Bits64);
        // SAFETY: the fake functions honour the contract for every pointer
        // they hand out and reject the ones they do not know.
        Arc::new(unsafe { Dispatcher::from_table(variant, fake_api()) })
    }

    /// Every call recorded since install (or the last [`Self::clear_calls`])
    pub fn calls(&self) -> Vec<FakeCall> {
        with_state(|s| s.calls.clone())
    }

    /// Number of recorded calls matching `pred`
    pub fn count(&self, pred: impl Fn(&FakeCall) -> bool) -> usize {
        with_state(|s| s.calls.iter().filter(|c| pred(c)).count())
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        with_state(|s| s.calls.clear());
    }

    /// Frames passed to `hid_write`, in order
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    FakeCall::Write(frame) => Some(frame.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Lists handed out by `hid_enumerate` and not yet freed
    pub fn outstanding_lists(&self) -> usize {
        with_state(|s| s.lists.len())
    }

    /// Device references opened and not yet closed
    pub fn open_devices(&self) -> usize {
        with_state(|s| s.open.len())
    }

    /// Queue an input report for the next read
    pub fn push_input(&self, report: &[u8]) {
        with_state(|s| s.input.push_back(report.to_vec()));
    }
}

/// Function table pointing at the fake implementation
pub fn fake_api() -> TransportApi {
    TransportApi {
        init: fake_init,
        exit: fake_exit,
        enumerate: fake_enumerate,
        free_enumeration: fake_free_enumeration,
        open_path: fake_open_path,
        write: fake_write,
        read: fake_read,
        read_timeout: fake_read_timeout,
        set_nonblocking: fake_set_nonblocking,
        send_feature_report: fake_send_feature_report,
        get_feature_report: fake_get_feature_report,
        close: fake_close,
        get_manufacturer_string: fake_get_manufacturer_string,
        get_product_string: fake_get_product_string,
        get_serial_number_string: fake_get_serial_number_string,
        get_indexed_string: fake_get_indexed_string,
        error: fake_error,
    }
}

// ============================================================================
// State
// ============================================================================

thread_local! {
    static STATE: RefCell<FakeState> = RefCell::new(FakeState::new(Vec::new()));
}

fn with_state<R>(f: impl FnOnce(&mut FakeState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

struct FakeState {
    devices: Vec<FakeDevice>,
    behavior: FakeBehavior,
    calls: Vec<FakeCall>,
    lists: HashMap<usize, FakeList>,
    open: HashMap<usize, Box<FakeDevice>>,
    input: VecDeque<Vec<u8>>,
    error_buf: Vec<wchar_t>,
}

impl FakeState {
    fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices,
            behavior: FakeBehavior::default(),
            calls: Vec::new(),
            lists: HashMap::new(),
            open: HashMap::new(),
            input: VecDeque::new(),
            error_buf: Vec::new(),
        }
    }

    fn device(&self, dev: *mut RawDevice) -> Option<&FakeDevice> {
        self.open.get(&(dev as usize)).map(|d| &**d)
    }
}

/// Linked list of C records plus the strings they point at
struct FakeList {
    nodes: Vec<*mut RawDeviceInfo>,
    _paths: Vec<CString>,
    _strings: Vec<Vec<wchar_t>>,
}

impl FakeList {
    fn build(devices: &[FakeDevice], cyclic: bool) -> Self {
        let mut paths = Vec::new();
        let mut strings = Vec::new();
        let mut nodes = Vec::with_capacity(devices.len());

        for device in devices {
            let path = match &device.path {
                Some(p) => {
                    let c = CString::new(p.as_str()).unwrap_or_default();
                    let ptr = c.as_ptr() as *mut c_char;
                    paths.push(c);
                    ptr
                }
                None => ptr::null_mut(),
            };
            let mut wide_ptr = |value: &Option<String>| match value {
                Some(v) => {
                    let units = wide::encode(v);
                    let ptr = units.as_ptr() as *mut wchar_t;
                    strings.push(units);
                    ptr
                }
                None => ptr::null_mut(),
            };

            let node = RawDeviceInfo {
                path,
                vendor_id: device.vendor_id,
                product_id: device.product_id,
                serial_number: wide_ptr(&device.serial_number),
                release_number: device.release_number,
                manufacturer_string: wide_ptr(&device.manufacturer),
                product_string: wide_ptr(&device.product),
                usage_page: device.usage_page,
                usage: device.usage,
                interface_number: device.interface_number,
                next: ptr::null_mut(),
            };
            nodes.push(Box::into_raw(Box::new(node)));
        }

        for pair in nodes.windows(2) {
            // SAFETY: both nodes were just allocated above.
            unsafe { (*pair[0]).next = pair[1] };
        }
        if cyclic && let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) {
            // SAFETY: as above.
            unsafe { (*last).next = first };
        }

        Self {
            nodes,
            _paths: paths,
            _strings: strings,
        }
    }

    fn head(&self) -> *mut RawDeviceInfo {
        self.nodes.first().copied().unwrap_or(ptr::null_mut())
    }
}

impl Drop for FakeList {
    fn drop(&mut self) {
        for &node in &self.nodes {
            // SAFETY: every node came from Box::into_raw in `build`.
            drop(unsafe { Box::from_raw(node) });
        }
    }
}

/// Copy `value` into a caller buffer of `max` units, terminated
fn fill_wide(buf: *mut wchar_t, max: size_t, value: Option<&str>) -> c_int {
    let Some(value) = value else {
        return -1;
    };
    if buf.is_null() || max == 0 {
        return -1;
    }

    // Terminated, so n >= 1; truncation keeps the terminator in bounds.
    let units = wide::encode(value);
    let n = units.len().min(max);
    // SAFETY: the caller provides `max` writable units at `buf`.
    unsafe {
        ptr::copy_nonoverlapping(units.as_ptr(), buf, n);
        *buf.add(n - 1) = 0;
    }
    0
}

// ============================================================================
// Contract functions
// ============================================================================

extern "C" fn fake_init() -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::Init);
        if s.behavior.fail_init { -1 } else { 0 }
    })
}

extern "C" fn fake_exit() -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::Exit);
        0
    })
}

extern "C" fn fake_enumerate(vendor_id: c_ushort, product_id: c_ushort) -> *mut RawDeviceInfo {
    with_state(|s| {
        s.calls.push(FakeCall::Enumerate {
            vendor_id,
            product_id,
        });

        let matching: Vec<FakeDevice> = s
            .devices
            .iter()
            .filter(|d| vendor_id == 0 || d.vendor_id == vendor_id)
            .filter(|d| product_id == 0 || d.product_id == product_id)
            .cloned()
            .collect();
        if matching.is_empty() {
            return ptr::null_mut();
        }

        let list = FakeList::build(&matching, s.behavior.cyclic);
        let head = list.head();
        s.lists.insert(head as usize, list);
        head
    })
}

extern "C" fn fake_free_enumeration(head: *mut RawDeviceInfo) {
    // Dropped outside the borrow so FakeList::drop never re-enters the state.
    let list = with_state(|s| {
        s.calls.push(FakeCall::FreeEnumeration);
        s.lists.remove(&(head as usize))
    });
    drop(list);
}

extern "C" fn fake_open_path(path: *const c_char) -> *mut RawDevice {
    if path.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: the adapter passes a valid NUL-terminated path.
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();

    with_state(|s| {
        s.calls.push(FakeCall::OpenPath(path.clone()));
        if s.behavior.fail_open {
            return ptr::null_mut();
        }

        let Some(device) = s
            .devices
            .iter()
            .find(|d| d.path.as_deref() == Some(path.as_str()))
            .cloned()
        else {
            return ptr::null_mut();
        };

        let boxed = Box::new(device);
        let handle = &*boxed as *const FakeDevice as *mut RawDevice;
        s.open.insert(handle as usize, boxed);
        handle
    })
}

extern "C" fn fake_write(dev: *mut RawDevice, data: *const c_uchar, len: size_t) -> c_int {
    let frame = copy_in(data, len);
    with_state(|s| {
        s.calls.push(FakeCall::Write(frame));
        if s.device(dev).is_none() {
            return -1;
        }
        s.behavior.write_result.unwrap_or(len as c_int)
    })
}

/// Copy a caller slice passed as pointer and length
fn copy_in(data: *const c_uchar, len: size_t) -> Vec<u8> {
    if data.is_null() || len == 0 {
        return Vec::new();
    }
    // SAFETY: the adapter passes a slice pointer with its length.
    unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
}

fn read_input(s: &mut FakeState, dev: *mut RawDevice, buf: *mut c_uchar, len: size_t) -> c_int {
    if s.device(dev).is_none() {
        return -1;
    }
    let Some(report) = s.input.pop_front() else {
        return 0;
    };

    let n = report.len().min(len);
    // SAFETY: the caller provides `len` writable bytes at `buf`.
    unsafe { ptr::copy_nonoverlapping(report.as_ptr(), buf, n) };
    n as c_int
}

extern "C" fn fake_read(dev: *mut RawDevice, buf: *mut c_uchar, len: size_t) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::Read { len });
        read_input(s, dev, buf, len)
    })
}

extern "C" fn fake_read_timeout(
    dev: *mut RawDevice,
    buf: *mut c_uchar,
    len: size_t,
    timeout_ms: c_int,
) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::ReadTimeout { len, timeout_ms });
        read_input(s, dev, buf, len)
    })
}

extern "C" fn fake_set_nonblocking(dev: *mut RawDevice, nonblock: c_int) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::SetNonblocking(nonblock != 0));
        if s.device(dev).is_some() { 0 } else { -1 }
    })
}

extern "C" fn fake_send_feature_report(
    dev: *mut RawDevice,
    data: *const c_uchar,
    len: size_t,
) -> c_int {
    let report = copy_in(data, len);
    with_state(|s| {
        s.calls.push(FakeCall::SendFeatureReport(report));
        if s.device(dev).is_some() { len as c_int } else { -1 }
    })
}

extern "C" fn fake_get_feature_report(dev: *mut RawDevice, buf: *mut c_uchar, len: size_t) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::GetFeatureReport { len });
        if s.device(dev).is_none() {
            return -1;
        }

        let report = &s.behavior.feature_report;
        let n = report.len().min(len);
        // SAFETY: the caller provides `len` writable bytes at `buf`.
        unsafe { ptr::copy_nonoverlapping(report.as_ptr(), buf, n) };
        n as c_int
    })
}

extern "C" fn fake_close(dev: *mut RawDevice) {
    let device = with_state(|s| {
        s.calls.push(FakeCall::Close);
        s.open.remove(&(dev as usize))
    });
    drop(device);
}

extern "C" fn fake_get_manufacturer_string(
    dev: *mut RawDevice,
    buf: *mut wchar_t,
    max: size_t,
) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::GetManufacturerString);
        let value = s.device(dev).and_then(|d| d.manufacturer.clone());
        fill_wide(buf, max, value.as_deref())
    })
}

extern "C" fn fake_get_product_string(dev: *mut RawDevice, buf: *mut wchar_t, max: size_t) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::GetProductString);
        let value = s.device(dev).and_then(|d| d.product.clone());
        fill_wide(buf, max, value.as_deref())
    })
}

extern "C" fn fake_get_serial_number_string(
    dev: *mut RawDevice,
    buf: *mut wchar_t,
    max: size_t,
) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::GetSerialNumberString);
        if s.behavior.fail_serial {
            return -1;
        }
        let value = s.device(dev).and_then(|d| d.serial_number.clone());
        fill_wide(buf, max, value.as_deref())
    })
}

extern "C" fn fake_get_indexed_string(
    dev: *mut RawDevice,
    index: c_int,
    buf: *mut wchar_t,
    max: size_t,
) -> c_int {
    with_state(|s| {
        s.calls.push(FakeCall::GetIndexedString(index));
        let value = s.device(dev).and_then(|d| {
            usize::try_from(index)
                .ok()
                .and_then(|i| d.indexed_strings.get(i).cloned())
        });
        fill_wide(buf, max, value.as_deref())
    })
}

extern "C" fn fake_error(_dev: *mut RawDevice) -> *const wchar_t {
    with_state(|s| {
        s.calls.push(FakeCall::Error);
        match s.behavior.last_error.clone() {
            Some(message) => {
                s.error_buf = wide::encode(&message);
                s.error_buf.as_ptr()
            }
            None => ptr::null(),
        }
    })
}
