//! HID device manager
//!
//! Owns the transport lifecycle and every enumeration list the transport
//! hands out. Lists are decoded into [`DeviceHandle`]s immediately and kept
//! only so they can be released at teardown.

use crate::descriptor::decode_list;
use crate::device::DeviceHandle;
use hid_ffi::raw::RawDeviceInfo;
use hid_ffi::{Dispatcher, HidError, Result};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One list head returned by `hid_enumerate`, released exactly once
struct EnumerationSession {
    head: NonNull<RawDeviceInfo>,
}

/// HID device manager
///
/// Construct one per process and pass it to the code that needs device
/// access. The transport is initialised on the first search and shut down
/// by [`DeviceManager::shutdown`] or when the manager is dropped.
///
/// Drop or disconnect every [`DeviceHandle`] before shutting down; a handle
/// left connected past `hid_exit` holds a reference the transport has
/// already torn down.
pub struct DeviceManager {
    dispatcher: Arc<Dispatcher>,
    /// Lists from every search so far; they accumulate until teardown
    sessions: Vec<EnumerationSession>,
    initialized: bool,
}

impl DeviceManager {
    /// Create a manager over a resolved dispatcher
    ///
    /// No transport call is made until the first search.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            sessions: Vec::new(),
            initialized: false,
        }
    }

    /// Dispatcher shared with every handle this manager creates
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Whether `hid_init` has run and `hid_exit` has not
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of enumeration lists awaiting release
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Find devices by vendor and product ID
    ///
    /// A zero `vendor_id` matches any vendor and a zero `product_id` any
    /// product; `(0, 0)` returns every device. No match yields an empty
    /// vector. Handles come back in the transport's list order.
    ///
    /// Fails with [`HidError::EnumerationOverflow`] if the transport's list
    /// is longer than [`crate::MAX_DEVICE_COUNT`].
    pub fn search_devices(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceHandle>> {
        self.ensure_initialized()?;

        let Some(head) = self.dispatcher.enumerate(vendor_id, product_id) else {
            debug!(
                "No devices match {:04x}:{:04x}",
                vendor_id, product_id
            );
            return Ok(Vec::new());
        };

        // Recorded before decoding so a failed walk still gets released.
        self.sessions.push(EnumerationSession { head });

        // SAFETY: `head` is a live list from this dispatcher; it is freed
        // only in `shutdown`.
        let descriptors = unsafe { decode_list(head) }.inspect_err(|e| {
            warn!(
                "Enumeration of {:04x}:{:04x} failed: {}",
                vendor_id, product_id, e
            )
        })?;

        let handles: Vec<DeviceHandle> = descriptors
            .into_iter()
            .map(|descriptor| DeviceHandle::new(descriptor, Arc::clone(&self.dispatcher)))
            .collect();

        info!(
            "Found {} device(s) matching {:04x}:{:04x}",
            handles.len(),
            vendor_id,
            product_id
        );
        Ok(handles)
    }

    /// Release every enumeration list, then shut the transport down
    ///
    /// Safe to call any number of times; later calls do nothing. Handles
    /// should be dropped or disconnected first; any still connected are
    /// reported with a warning.
    pub fn shutdown(&mut self) {
        let released = self.sessions.len();
        for session in self.sessions.drain(..) {
            // SAFETY: each head came from `enumerate` and is drained from the
            // session list, so it is freed once.
            unsafe { self.dispatcher.free_enumeration(session.head) };
        }
        if released > 0 {
            debug!("Released {} enumeration session(s)", released);
        }

        if self.initialized {
            let open = self.dispatcher.open_references();
            if open > 0 {
                warn!(
                    "Shutting down the transport with {} device(s) still connected",
                    open
                );
            }

            let code = self.dispatcher.exit();
            if code < 0 {
                warn!("hid_exit failed with code {}", code);
            }
            self.initialized = false;
            info!("HID transport shut down");
        }
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let code = self.dispatcher.init();
        if code < 0 {
            return Err(HidError::Transport {
                operation: "hid_init",
                code,
            });
        }

        self.initialized = true;
        info!("HID transport initialised ({})", self.dispatcher.variant());
        Ok(())
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("dispatcher", &self.dispatcher)
            .field("sessions", &self.sessions.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}
