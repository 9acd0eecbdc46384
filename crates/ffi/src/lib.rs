//! Native transport surface for hid-adapter
//!
//! This crate describes the C contract of the hidapi transport and routes
//! calls into it:
//!
//! - [`raw`]: `#[repr(C)]` enumeration records and the [`TransportApi`]
//!   function table
//! - [`platform`]: pointer-width based binding resolution
//! - [`Dispatcher`]: the single entry point every transport call goes through
//! - [`wide`]: `wchar_t` string conversion
//!
//! # Example
//!
//! ```no_run
//! use hid_ffi::{Dispatcher, LibraryOverrides};
//!
//! let dispatcher = Dispatcher::load(&LibraryOverrides::default())?;
//! assert_eq!(dispatcher.init(), 0);
//! # Ok::<(), hid_ffi::HidError>(())
//! ```

pub mod dispatcher;
pub mod error;
pub mod platform;
pub mod raw;
pub mod wide;

pub use dispatcher::{BLOCKING, Dispatcher};
pub use error::{HidError, Result};
pub use platform::{BINDINGS, BindingEntry, LibraryOverrides, PlatformVariant};
pub use raw::{RawDevice, RawDeviceInfo, TransportApi};
