//! Common utilities for hid-adapter
//!
//! Shared between the adapter library and the viewer binary: logging setup,
//! ambient error types and, behind the `test-utils` feature, an in-process
//! transport double.

pub mod error;
pub mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
