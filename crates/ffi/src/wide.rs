//! Wide-character string conversion
//!
//! hidapi reports strings as NUL-terminated `wchar_t` arrays: UTF-16 code
//! units on Windows, UTF-32 scalar values elsewhere.

use libc::wchar_t;

/// Capacity of string scratch buffers, in `wchar_t` units
pub const MAX_STRING_LEN: usize = 512;

/// Longest foreign string walked before giving up on a missing terminator
pub const FOREIGN_STRING_LIMIT: usize = 4096;

/// Decode units up to the first NUL (or the end of the slice)
pub fn decode(units: &[wchar_t]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    decode_units(&units[..end])
}

/// Decode a NUL-terminated foreign string
///
/// Returns `None` for a null pointer. The walk stops after
/// [`FOREIGN_STRING_LIMIT`] units even if no terminator was found.
///
/// # Safety
///
/// `ptr` must be null or point to readable memory holding either a NUL
/// terminator or at least [`FOREIGN_STRING_LIMIT`] units.
pub unsafe fn decode_ptr(ptr: *const wchar_t) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let mut len = 0;
    // SAFETY: caller guarantees every unit up to the terminator is readable.
    while len < FOREIGN_STRING_LIMIT && unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }

    // SAFETY: the first `len` units were just read above.
    let units = unsafe { std::slice::from_raw_parts(ptr, len) };
    Some(decode_units(units))
}

/// Encode a string as NUL-terminated wide units
pub fn encode(s: &str) -> Vec<wchar_t> {
    let mut units = encode_units(s);
    units.push(0);
    units
}

#[cfg(windows)]
fn decode_units(units: &[wchar_t]) -> String {
    String::from_utf16_lossy(units)
}

#[cfg(not(windows))]
fn decode_units(units: &[wchar_t]) -> String {
    units
        .iter()
        .map(|&u| char::from_u32(u as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(windows)]
fn encode_units(s: &str) -> Vec<wchar_t> {
    s.encode_utf16().collect()
}

#[cfg(not(windows))]
fn encode_units(s: &str) -> Vec<wchar_t> {
    s.chars().map(|c| c as wchar_t).collect()
}
