//! Ownership helpers for UTF-8 bytes crossing the ABI.
//!
//! Strings a plugin hands to the host (status messages, model JSON) are
//! leaked boxed strs; the host returns them through the module's
//! `plugin_free` hook, which for SDK-built plugins is [`release_utf8`].

use core::ffi::c_void;

use crate::ShStr;

/// View a `&str` as an ABI string for the duration of a call. The caller
/// keeps ownership.
#[inline]
pub const fn borrow_utf8(s: &str) -> ShStr {
    ShStr {
        ptr: s.as_ptr(),
        len: s.len(),
    }
}

/// Transfer a `String`'s bytes to the host. Must be released with
/// [`release_utf8`].
pub fn leak_utf8(s: String) -> ShStr {
    if s.is_empty() {
        return ShStr::empty();
    }
    let boxed = s.into_boxed_str();
    let len = boxed.len();
    let ptr = Box::into_raw(boxed) as *const u8;
    ShStr { ptr, len }
}

/// The `plugin_free` hook matching [`leak_utf8`].
pub extern "C" fn release_utf8(ptr: *mut c_void, len: usize, _align: usize) {
    if ptr.is_null() || len == 0 {
        return;
    }
    // SAFETY: ptr/len came from the boxed str leaked by `leak_utf8`.
    unsafe {
        drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
            ptr as *mut u8,
            len,
        )));
    }
}

/// Borrow an ABI string as `&str`. `None` when the bytes are not UTF-8.
///
/// # Safety
///
/// `s.ptr` must point at `s.len` live bytes, or be null.
pub unsafe fn utf8_from(s: &ShStr) -> Option<&str> {
    if s.ptr.is_null() || s.len == 0 {
        return Some("");
    }
    let bytes = unsafe { core::slice::from_raw_parts(s.ptr, s.len) };
    core::str::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaked_string_round_trips_and_releases() {
        let s = leak_utf8("hello across the boundary".to_string());
        assert_eq!(
            unsafe { utf8_from(&s) },
            Some("hello across the boundary")
        );
        release_utf8(s.ptr as *mut _, s.len, 1);
    }

    #[test]
    fn empty_and_null_views_borrow_as_empty() {
        assert_eq!(unsafe { utf8_from(&ShStr::empty()) }, Some(""));
        assert_eq!(leak_utf8(String::new()), ShStr::empty());
        // Releasing an empty view is a no-op.
        release_utf8(core::ptr::null_mut(), 0, 1);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bytes = [0xff_u8, 0xfe];
        let s = ShStr {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        };
        assert_eq!(unsafe { utf8_from(&s) }, None);
    }
}
