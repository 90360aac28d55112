// object.rs

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr;

use crate::arc_track;
use crate::value::{RcHeader, TYPE_OBJECT};

/// Byte offset of the vtable pointer inside every object.
pub const VTABLE_OFFSET: i32 = 16;
/// Byte offset of the allocation size inside every object.
pub const SIZE_OFFSET: i32 = 24;
/// Fields start here.
pub const OBJECT_HEADER_SIZE: u32 = 32;

/// Header of a class instance.
/// Layout: RcHeader (16), vtable pointer (8), size (4), padding (4), then
/// the fields at the offsets computed by codegen.
#[repr(C)]
pub struct RcObject {
    pub header: RcHeader,
    pub vtable: *const *const u8,
    /// Total allocation size including this header
    pub size: u32,
    _pad: u32,
}

impl RcObject {
    /// Allocate a zeroed object of `size` bytes (header included) with count 0.
    pub fn new(
        size: u32,
        vtable: *const *const u8,
        drop_fn: Option<unsafe extern "C" fn(*mut u8)>,
    ) -> *mut Self {
        let size = size.max(OBJECT_HEADER_SIZE);
        let layout = Self::layout_for_size(size);

        // SAFETY: the layout has non-zero size and valid alignment; the header
        // fields are written in place before the pointer escapes.
        unsafe {
            let ptr = alloc_zeroed(layout) as *mut Self;
            if ptr.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            ptr::write(
                &mut (*ptr).header,
                RcHeader::with_drop_fn(TYPE_OBJECT, drop_fn),
            );
            ptr::write(&mut (*ptr).vtable, vtable);
            ptr::write(&mut (*ptr).size, size);

            arc_track::record_alloc();
            ptr
        }
    }

    fn layout_for_size(size: u32) -> Layout {
        // Size is bounded by u32 and alignment is a power of two.
        Layout::from_size_align(size as usize, align_of::<RcObject>())
            .unwrap_or_else(|_| Layout::new::<RcObject>())
    }

    /// Release the memory of an object whose count reached zero.
    ///
    /// # Safety
    /// `ptr` must come from [`RcObject::new`] and must not be used afterwards.
    pub unsafe fn free(ptr: *mut Self) {
        unsafe {
            let layout = Self::layout_for_size((*ptr).size);
            dealloc(ptr as *mut u8, layout);
        }
    }
}

/// Allocate a class instance. Called by generated code for `new`.
#[unsafe(no_mangle)]
pub extern "C" fn cinder_object_new(
    size: u32,
    vtable: *const *const u8,
    drop_fn: Option<unsafe extern "C" fn(*mut u8)>,
) -> *mut u8 {
    RcObject::new(size, vtable, drop_fn) as *mut u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{cinder_release, cinder_retain};
    use std::cell::Cell;

    thread_local! {
        static DROPS: Cell<u32> = const { Cell::new(0) };
    }

    unsafe extern "C" fn count_drop(_ptr: *mut u8) {
        DROPS.with(|d| d.set(d.get() + 1));
    }

    #[test]
    fn header_layout_matches_offsets() {
        assert_eq!(size_of::<RcObject>(), OBJECT_HEADER_SIZE as usize);
        assert_eq!(std::mem::offset_of!(RcObject, vtable), VTABLE_OFFSET as usize);
        assert_eq!(std::mem::offset_of!(RcObject, size), SIZE_OFFSET as usize);
    }

    #[test]
    fn object_freed_when_last_reference_released() {
        let before = arc_track::snapshot();
        let obj = cinder_object_new(48, ptr::null(), Some(count_drop));
        unsafe {
            assert_eq!((*(obj as *const RcHeader)).count(), 0);
        }
        cinder_retain(obj);
        cinder_retain(obj);
        cinder_release(obj);
        assert_eq!(DROPS.with(Cell::get), 0);
        cinder_release(obj);
        assert_eq!(DROPS.with(Cell::get), 1);

        let delta = arc_track::snapshot().since(before);
        assert_eq!(delta.allocs, 1);
        assert_eq!(delta.frees, 1);
        assert!(delta.is_balanced());
    }

    #[test]
    fn fields_start_zeroed() {
        let obj = cinder_object_new(OBJECT_HEADER_SIZE + 16, ptr::null(), None);
        unsafe {
            let fields = obj.add(OBJECT_HEADER_SIZE as usize) as *const u64;
            assert_eq!(*fields, 0);
            assert_eq!(*fields.add(1), 0);
        }
        cinder_retain(obj);
        cinder_release(obj);
    }
}
