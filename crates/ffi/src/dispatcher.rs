//! Routing of transport calls through the resolved binding

use crate::error::{HidError, Result};
use crate::platform::{LibraryOverrides, PlatformVariant};
use crate::raw::{RawDevice, RawDeviceInfo, SYMBOLS, TransportApi};
use crate::wide;
use libc::{c_int, wchar_t};
use libloading::Library;
use std::ffi::CStr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Blocking sentinel for [`Dispatcher::read_timeout`]
pub const BLOCKING: i32 = -1;

/// Transport dispatcher
///
/// Holds the binding chosen for this process and routes every contract
/// operation through its function table. Call sites never branch on the
/// platform variant.
pub struct Dispatcher {
    variant: PlatformVariant,
    api: TransportApi,
    /// Device references opened and not yet closed
    open: AtomicUsize,
    // Keeps the functions in `api` mapped; None for in-process tables.
    _library: Option<Library>,
}

impl Dispatcher {
    /// Resolve the binding for this process and load it
    ///
    /// The variant is resolved from the native pointer width, the library
    /// name comes from the binding table unless `overrides` replaces it, and
    /// every contract symbol must be exported.
    pub fn load(overrides: &LibraryOverrides) -> Result<Self> {
        let variant = PlatformVariant::current()?;
        let file = overrides.library_file(variant)?;

        // SAFETY: the configured library is trusted to be a hidapi build;
        // loading it runs its initialisers.
        let library = unsafe { Library::new(&file) }.map_err(|source| HidError::LibraryLoad {
            library: file.to_string_lossy().into_owned(),
            source,
        })?;

        let api = resolve_api(&library)?;
        info!(
            "Loaded {} transport binding from {}",
            variant,
            file.to_string_lossy()
        );

        Ok(Self {
            variant,
            api,
            open: AtomicUsize::new(0),
            _library: Some(library),
        })
    }

    /// Build a dispatcher over an in-process function table
    ///
    /// # Safety
    ///
    /// Every function in `api` must honour the hidapi contract for the
    /// arguments the adapter passes (valid buffers, pointers it returned).
    pub unsafe fn from_table(variant: PlatformVariant, api: TransportApi) -> Self {
        Self {
            variant,
            api,
            open: AtomicUsize::new(0),
            _library: None,
        }
    }

    /// Variant this dispatcher was resolved for
    pub fn variant(&self) -> PlatformVariant {
        self.variant
    }

    /// Number of device references opened through this dispatcher and not
    /// yet closed
    pub fn open_references(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Initialise the transport (`hid_init`)
    pub fn init(&self) -> i32 {
        // SAFETY: no arguments; contract upheld by the binding.
        unsafe { (self.api.init)() }
    }

    /// Shut the transport down (`hid_exit`)
    pub fn exit(&self) -> i32 {
        // SAFETY: no arguments; contract upheld by the binding.
        unsafe { (self.api.exit)() }
    }

    /// Enumerate devices matching the filter (0 matches anything)
    ///
    /// The returned list must be released with [`Self::free_enumeration`].
    pub fn enumerate(&self, vendor_id: u16, product_id: u16) -> Option<NonNull<RawDeviceInfo>> {
        // SAFETY: plain integer arguments.
        let head = unsafe { (self.api.enumerate)(vendor_id, product_id) };
        debug!(
            "hid_enumerate({:#06x}, {:#06x}) -> {:?}",
            vendor_id, product_id, head
        );
        NonNull::new(head)
    }

    /// Release a list returned by [`Self::enumerate`]
    ///
    /// # Safety
    ///
    /// `head` must come from this dispatcher's `enumerate` and must not be
    /// released twice or read afterwards.
    pub unsafe fn free_enumeration(&self, head: NonNull<RawDeviceInfo>) {
        // SAFETY: forwarded from the caller.
        unsafe { (self.api.free_enumeration)(head.as_ptr()) }
    }

    /// Open a device by platform path
    pub fn open_path(&self, path: &CStr) -> Option<NonNull<RawDevice>> {
        // SAFETY: `path` is a valid NUL-terminated string for the call.
        let device = NonNull::new(unsafe { (self.api.open_path)(path.as_ptr()) })?;
        self.open.fetch_add(1, Ordering::AcqRel);
        Some(device)
    }

    /// Write an output report; returns bytes written or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn write(&self, device: NonNull<RawDevice>, data: &[u8]) -> i32 {
        // SAFETY: device is live; data pointer and length describe one slice.
        unsafe { (self.api.write)(device.as_ptr(), data.as_ptr(), data.len()) }
    }

    /// Read an input report; returns bytes read, 0 for no data, or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn read(&self, device: NonNull<RawDevice>, buf: &mut [u8]) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe { (self.api.read)(device.as_ptr(), buf.as_mut_ptr(), buf.len()) }
    }

    /// Read with a timeout in milliseconds ([`BLOCKING`] waits forever)
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn read_timeout(
        &self,
        device: NonNull<RawDevice>,
        buf: &mut [u8],
        timeout_ms: i32,
    ) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe {
            (self.api.read_timeout)(device.as_ptr(), buf.as_mut_ptr(), buf.len(), timeout_ms)
        }
    }

    /// Switch non-blocking reads on or off; returns 0 or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn set_nonblocking(&self, device: NonNull<RawDevice>, nonblocking: bool) -> i32 {
        // SAFETY: device is live.
        unsafe { (self.api.set_nonblocking)(device.as_ptr(), c_int::from(nonblocking)) }
    }

    /// Send a feature report; byte 0 is the report ID
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn send_feature_report(&self, device: NonNull<RawDevice>, data: &[u8]) -> i32 {
        // SAFETY: device is live; data pointer and length describe one slice.
        unsafe { (self.api.send_feature_report)(device.as_ptr(), data.as_ptr(), data.len()) }
    }

    /// Get a feature report; byte 0 of `buf` selects the report ID
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn get_feature_report(&self, device: NonNull<RawDevice>, buf: &mut [u8]) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe { (self.api.get_feature_report)(device.as_ptr(), buf.as_mut_ptr(), buf.len()) }
    }

    /// Close a device reference
    ///
    /// # Safety
    ///
    /// `device` must be an open reference and must not be used afterwards.
    pub unsafe fn close(&self, device: NonNull<RawDevice>) {
        // SAFETY: forwarded from the caller.
        unsafe { (self.api.close)(device.as_ptr()) }
        let _ = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Manufacturer string into `buf`; returns 0 or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn get_manufacturer_string(
        &self,
        device: NonNull<RawDevice>,
        buf: &mut [wchar_t],
    ) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe { (self.api.get_manufacturer_string)(device.as_ptr(), buf.as_mut_ptr(), buf.len()) }
    }

    /// Product string into `buf`; returns 0 or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn get_product_string(&self, device: NonNull<RawDevice>, buf: &mut [wchar_t]) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe { (self.api.get_product_string)(device.as_ptr(), buf.as_mut_ptr(), buf.len()) }
    }

    /// Serial number string into `buf`; returns 0 or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn get_serial_number_string(
        &self,
        device: NonNull<RawDevice>,
        buf: &mut [wchar_t],
    ) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe {
            (self.api.get_serial_number_string)(device.as_ptr(), buf.as_mut_ptr(), buf.len())
        }
    }

    /// String descriptor `index` into `buf`; returns 0 or -1
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn get_indexed_string(
        &self,
        device: NonNull<RawDevice>,
        index: i32,
        buf: &mut [wchar_t],
    ) -> i32 {
        // SAFETY: device is live; buf is writable for its full length.
        unsafe {
            (self.api.get_indexed_string)(device.as_ptr(), index, buf.as_mut_ptr(), buf.len())
        }
    }

    /// Last error message reported for `device`
    ///
    /// # Safety
    ///
    /// `device` must be an open reference from [`Self::open_path`].
    pub unsafe fn last_error(&self, device: NonNull<RawDevice>) -> Option<String> {
        // SAFETY: device is live; the returned string is owned by the
        // transport and stays valid until the next call on this device.
        unsafe { wide::decode_ptr((self.api.error)(device.as_ptr())) }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("variant", &self.variant)
            .field("open", &self.open_references())
            .field("loaded", &self._library.is_some())
            .finish()
    }
}

/// Resolve every contract symbol from a loaded library
fn resolve_api(library: &Library) -> Result<TransportApi> {
    let [
        init,
        exit,
        enumerate,
        free_enumeration,
        open_path,
        write,
        read,
        read_timeout,
        set_nonblocking,
        send_feature_report,
        get_feature_report,
        close,
        get_manufacturer_string,
        get_product_string,
        get_serial_number_string,
        get_indexed_string,
        error,
    ] = SYMBOLS;

    Ok(TransportApi {
        init: symbol(library, init)?,
        exit: symbol(library, exit)?,
        enumerate: symbol(library, enumerate)?,
        free_enumeration: symbol(library, free_enumeration)?,
        open_path: symbol(library, open_path)?,
        write: symbol(library, write)?,
        read: symbol(library, read)?,
        read_timeout: symbol(library, read_timeout)?,
        set_nonblocking: symbol(library, set_nonblocking)?,
        send_feature_report: symbol(library, send_feature_report)?,
        get_feature_report: symbol(library, get_feature_report)?,
        close: symbol(library, close)?,
        get_manufacturer_string: symbol(library, get_manufacturer_string)?,
        get_product_string: symbol(library, get_product_string)?,
        get_serial_number_string: symbol(library, get_serial_number_string)?,
        get_indexed_string: symbol(library, get_indexed_string)?,
        error: symbol(library, error)?,
    })
}

fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    // SAFETY: `T` is the function pointer type declared for `name` in the
    // hidapi headers; the library outlives the copied pointer.
    let sym = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| HidError::MissingSymbol { symbol: name, source })?;
    Ok(*sym)
}
