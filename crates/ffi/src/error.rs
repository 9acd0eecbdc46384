//! Adapter error types

use thiserror::Error;

/// Structural failures of the HID adapter
///
/// Per-call I/O results (`write`, `read`, feature reports) are not errors
/// here: they keep the transport's integer convention and are returned
/// unchanged to the caller.
#[derive(Debug, Error)]
pub enum HidError {
    /// No transport binding exists for this pointer width
    #[error("Unsupported platform: no transport binding for {pointer_width}-byte pointers")]
    UnsupportedPlatform { pointer_width: usize },

    /// The transport shared library could not be loaded
    #[error("Failed to load transport library '{library}': {source}")]
    LibraryLoad {
        library: String,
        #[source]
        source: libloading::Error,
    },

    /// The transport library does not export a contract function
    #[error("Transport library is missing symbol '{symbol}': {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// The enumeration list is longer than any real device set
    #[error("Device list exceeded {limit} entries (malformed or cyclic enumeration data)")]
    EnumerationOverflow { limit: usize },

    /// A transport primitive reported its own failure code
    #[error("Transport call {operation} failed with code {code}")]
    Transport { operation: &'static str, code: i32 },
}

/// Type alias for adapter results
pub type Result<T> = std::result::Result<T, HidError>;
