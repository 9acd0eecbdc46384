//! HID device discovery and handle lifecycle
//!
//! Builds on the [`hid_ffi`] dispatcher:
//!
//! - [`DeviceManager`]: transport init/exit, enumeration and release of
//!   enumeration lists
//! - [`DeviceHandle`]: connect/disconnect, framed writes, reads, feature
//!   reports and string queries for one device
//! - [`DeviceDescriptor`]: owned copy of one enumeration record
//!
//! # Example
//!
//! ```no_run
//! use hid_adapter::{DeviceManager, Dispatcher, LibraryOverrides};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(Dispatcher::load(&LibraryOverrides::default())?);
//! let mut manager = DeviceManager::new(dispatcher);
//!
//! for mut device in manager.search_devices(0, 0)? {
//!     if device.connect() {
//!         println!("{}: {}", device.path_lossy(), device.product());
//!         device.disconnect();
//!     }
//! }
//!
//! manager.shutdown();
//! # Ok::<(), hid_adapter::HidError>(())
//! ```

pub mod descriptor;
pub mod device;
pub mod manager;

pub use descriptor::{DeviceDescriptor, MAX_DEVICE_COUNT, decode_list};
pub use device::{
    DeviceHandle, DeviceState, DeviceStrings, MAX_INDEXED_STRINGS, WRITE_BUFFER_DEFAULT_SIZE,
};
pub use manager::DeviceManager;

pub use hid_ffi::{BLOCKING, Dispatcher, HidError, LibraryOverrides, PlatformVariant, Result};
