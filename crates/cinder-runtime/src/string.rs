// string.rs

use std::alloc::{Layout, alloc, dealloc};
use std::ptr;
use std::slice;

use crate::arc_track;
use crate::value::{RcHeader, TYPE_STRING};

/// Reference-counted immutable string
#[repr(C)]
pub struct RcString {
    pub header: RcHeader,
    pub len: usize,
    // Data follows inline
}

impl RcString {
    /// Allocate a new RcString with count 0 from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> *mut Self {
        Self::from_parts(bytes, &[])
    }

    /// Allocate a new RcString by concatenating two byte slices.
    pub fn from_parts(a: &[u8], b: &[u8]) -> *mut Self {
        let len = a.len() + b.len();
        let layout = Self::layout_for_len(len);

        unsafe {
            let ptr = alloc(layout) as *mut Self;
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            ptr::write(&mut (*ptr).header, RcHeader::new(TYPE_STRING));
            ptr::write(&mut (*ptr).len, len);

            let data_ptr = (ptr as *mut u8).add(size_of::<RcString>());
            ptr::copy_nonoverlapping(a.as_ptr(), data_ptr, a.len());
            ptr::copy_nonoverlapping(b.as_ptr(), data_ptr.add(a.len()), b.len());

            arc_track::record_alloc();
            ptr
        }
    }

    fn layout_for_len(len: usize) -> Layout {
        let size = size_of::<RcString>() + len;
        Layout::from_size_align(size, align_of::<RcString>())
            .unwrap_or_else(|_| std::alloc::handle_alloc_error(Layout::new::<RcString>()))
    }

    /// Get the string data
    ///
    /// # Safety
    /// The caller must ensure `self` points to a valid, properly initialized `RcString`.
    pub unsafe fn data(&self) -> &[u8] {
        unsafe {
            let data_ptr = (self as *const Self as *const u8).add(size_of::<RcString>());
            slice::from_raw_parts(data_ptr, self.len)
        }
    }

    /// # Safety
    /// `ptr` must come from one of the constructors and must not be used afterwards.
    pub unsafe fn free(ptr: *mut Self) {
        unsafe {
            let layout = Self::layout_for_len((*ptr).len);
            dealloc(ptr as *mut u8, layout);
        }
    }
}

/// Build a string from a static byte range (string literals).
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_string_new(data: *const u8, len: usize) -> *mut RcString {
    if data.is_null() || len == 0 {
        return RcString::from_bytes(&[]);
    }
    let bytes = unsafe { slice::from_raw_parts(data, len) };
    RcString::from_bytes(bytes)
}

#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_string_concat(a: *const RcString, b: *const RcString) -> *mut RcString {
    unsafe { RcString::from_parts(bytes_of(a), bytes_of(b)) }
}

#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_string_eq(a: *const RcString, b: *const RcString) -> i8 {
    unsafe { (bytes_of(a) == bytes_of(b)) as i8 }
}

#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_string_len(s: *const RcString) -> i64 {
    unsafe { bytes_of(s).len() as i64 }
}

/// Null strings read as empty.
unsafe fn bytes_of<'a>(s: *const RcString) -> &'a [u8] {
    if s.is_null() {
        return &[];
    }
    unsafe { (*s).data() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{cinder_release, cinder_retain};

    fn text(s: *const RcString) -> String {
        unsafe { String::from_utf8_lossy(bytes_of(s)).into_owned() }
    }

    #[test]
    fn concat_joins_bytes() {
        let before = arc_track::snapshot();
        let a = cinder_string_new(b"quack".as_ptr(), 5);
        let b = cinder_string_new(b"!".as_ptr(), 1);
        let joined = cinder_string_concat(a, b);
        assert_eq!(text(joined), "quack!");
        assert_eq!(cinder_string_len(joined), 6);

        for s in [a, b, joined] {
            cinder_retain(s as *mut u8);
            cinder_release(s as *mut u8);
        }
        let delta = arc_track::snapshot().since(before);
        assert_eq!(delta.allocs, 3);
        assert!(delta.is_balanced());
    }

    #[test]
    fn equality_compares_contents() {
        let a = cinder_string_new(b"duck".as_ptr(), 4);
        let b = cinder_string_new(b"duck".as_ptr(), 4);
        let c = cinder_string_new(b"goose".as_ptr(), 5);
        assert_eq!(cinder_string_eq(a, b), 1);
        assert_eq!(cinder_string_eq(a, c), 0);
        assert_eq!(cinder_string_eq(std::ptr::null(), std::ptr::null()), 1);
        for s in [a, b, c] {
            cinder_retain(s as *mut u8);
            cinder_release(s as *mut u8);
        }
    }
}
