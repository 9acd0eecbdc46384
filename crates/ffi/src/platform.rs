//! Transport binding resolution
//!
//! The process picks exactly one binding, keyed by native pointer width.
//! Each supported variant has one entry in [`BINDINGS`]; adding a platform
//! means adding an entry there.

use crate::error::{HidError, Result};
use std::ffi::OsString;

/// Platform variant a transport binding is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformVariant {
    /// 4-byte pointers
    Bits32,
    /// 8-byte pointers
    Bits64,
}

/// One row of the binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEntry {
    pub variant: PlatformVariant,
    /// Library base name, without platform prefix or extension
    pub library: &'static str,
}

/// Capability table: one binding per supported variant
pub const BINDINGS: &[BindingEntry] = &[
    BindingEntry {
        variant: PlatformVariant::Bits32,
        library: "hidapi32",
    },
    BindingEntry {
        variant: PlatformVariant::Bits64,
        library: "hidapi64",
    },
];

impl PlatformVariant {
    /// Resolve the variant for a pointer width in bytes
    pub fn resolve(pointer_width: usize) -> Result<Self> {
        match pointer_width {
            4 => Ok(Self::Bits32),
            8 => Ok(Self::Bits64),
            _ => Err(HidError::UnsupportedPlatform { pointer_width }),
        }
    }

    /// Resolve the variant of the running process
    pub fn current() -> Result<Self> {
        Self::resolve(std::mem::size_of::<*const ()>())
    }

    /// Pointer width in bytes
    pub fn pointer_width(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    /// Binding table entry for this variant
    pub fn binding(self) -> Option<&'static BindingEntry> {
        BINDINGS.iter().find(|entry| entry.variant == self)
    }
}

impl std::fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.pointer_width() * 8)
    }
}

/// Per-variant replacements for the default library names
///
/// An override is handed to the loader verbatim, so it may be a bare file
/// name or a full path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryOverrides {
    pub bits32: Option<String>,
    pub bits64: Option<String>,
}

impl LibraryOverrides {
    /// Override configured for `variant`, if any
    pub fn get(&self, variant: PlatformVariant) -> Option<&str> {
        match variant {
            PlatformVariant::Bits32 => self.bits32.as_deref(),
            PlatformVariant::Bits64 => self.bits64.as_deref(),
        }
    }

    /// File name the loader should open for `variant`
    pub fn library_file(&self, variant: PlatformVariant) -> Result<OsString> {
        if let Some(name) = self.get(variant) {
            return Ok(OsString::from(name));
        }

        let entry = variant
            .binding()
            .ok_or(HidError::UnsupportedPlatform {
                pointer_width: variant.pointer_width(),
            })?;
        Ok(libloading::library_filename(entry.library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_widths() {
        assert_eq!(PlatformVariant::resolve(4).unwrap(), PlatformVariant::Bits32);
        assert_eq!(PlatformVariant::resolve(8).unwrap(), PlatformVariant::Bits64);
    }

    #[test]
    fn test_resolve_unknown_width() {
        for width in [0, 2, 16] {
            match PlatformVariant::resolve(width) {
                Err(HidError::UnsupportedPlatform { pointer_width }) => {
                    assert_eq!(pointer_width, width)
                }
                other => panic!("expected UnsupportedPlatform, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_current_matches_target() {
        let variant = PlatformVariant::current().unwrap();
        assert_eq!(variant.pointer_width(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_every_variant_has_one_binding() {
        for variant in [PlatformVariant::Bits32, PlatformVariant::Bits64] {
            let count = BINDINGS.iter().filter(|e| e.variant == variant).count();
            assert_eq!(count, 1, "{} binding count", variant);
        }
    }

    #[test]
    fn test_library_file_default() {
        let overrides = LibraryOverrides::default();
        let file = overrides.library_file(PlatformVariant::Bits64).unwrap();
        assert!(file.to_string_lossy().contains("hidapi64"));
    }

    #[test]
    fn test_library_file_override() {
        let overrides = LibraryOverrides {
            bits32: None,
            bits64: Some("/opt/hid/libhidapi-hidraw.so".to_string()),
        };
        assert_eq!(
            overrides.library_file(PlatformVariant::Bits64).unwrap(),
            OsString::from("/opt/hid/libhidapi-hidraw.so")
        );
        assert!(
            overrides
                .library_file(PlatformVariant::Bits32)
                .unwrap()
                .to_string_lossy()
                .contains("hidapi32")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PlatformVariant::Bits32.to_string(), "32-bit");
        assert_eq!(PlatformVariant::Bits64.to_string(), "64-bit");
    }
}
