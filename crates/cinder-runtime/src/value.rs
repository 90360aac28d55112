// value.rs

use std::sync::atomic::{AtomicU32, Ordering};

use crate::arc_track;

/// Type ids stored in every header
pub const TYPE_STRING: u32 = 1;
pub const TYPE_OBJECT: u32 = 2;

/// Reference counting header for heap-allocated values
///
/// Layout: [ref_count: u32] [type_id: u32] [drop_fn: Option<fn(*mut u8)>]
/// Total size: 16 bytes (4 + 4 + 8)
///
/// A fresh allocation starts at count 0; generated code retains it
/// immediately when it takes ownership.
#[repr(C)]
pub struct RcHeader {
    pub ref_count: AtomicU32,
    pub type_id: u32,
    /// Releases the value's owned references. Freeing the memory itself is
    /// done by the runtime afterwards.
    pub drop_fn: Option<unsafe extern "C" fn(*mut u8)>,
}

impl RcHeader {
    pub fn new(type_id: u32) -> Self {
        Self {
            ref_count: AtomicU32::new(0),
            type_id,
            drop_fn: None,
        }
    }

    pub fn with_drop_fn(type_id: u32, drop_fn: Option<unsafe extern "C" fn(*mut u8)>) -> Self {
        Self {
            ref_count: AtomicU32::new(0),
            type_id,
            drop_fn,
        }
    }

    #[inline]
    pub fn inc(&self) {
        // Relaxed like Arc::clone: the caller already holds a reference.
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec(&self) -> u32 {
        self.ref_count.fetch_sub(1, Ordering::AcqRel)
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }
}

/// Increment the reference count of an RC-managed value.
///
/// # Safety
/// `ptr` must be null or point to a valid allocation starting with an `RcHeader`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_retain(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    arc_track::record_retain();
    unsafe {
        let header = &*(ptr as *const RcHeader);
        header.inc();
    }
}

/// Decrement the reference count of an RC-managed value.
/// When the count reaches zero the `drop_fn` runs and the memory is freed.
///
/// # Safety
/// `ptr` must be null or point to a valid allocation starting with an `RcHeader`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn cinder_release(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    arc_track::record_release();
    unsafe {
        let header = &*(ptr as *const RcHeader);
        let prev = header.dec();
        if prev == 1 {
            let (type_id, drop_fn) = (header.type_id, header.drop_fn);
            if let Some(f) = drop_fn {
                f(ptr);
            }
            free_value(ptr, type_id);
        }
    }
}

/// Free the memory of a value whose count dropped to zero.
///
/// # Safety
/// `ptr` must point to a live allocation of the given runtime type.
unsafe fn free_value(ptr: *mut u8, type_id: u32) {
    unsafe {
        match type_id {
            TYPE_STRING => crate::string::RcString::free(ptr as *mut crate::string::RcString),
            TYPE_OBJECT => crate::object::RcObject::free(ptr as *mut crate::object::RcObject),
            // Unknown type ids are never produced by the constructors.
            _ => {}
        }
    }
    arc_track::record_free();
}
