//! Cinder runtime: reference-counted objects and strings for compiled code.
//!
//! # Safety: Raw Pointer Arguments in FFI Functions
//!
//! The `extern "C"` functions in this crate are called by generated code only.
//! Pointers they receive are either null or point at live allocations created
//! by [`object::cinder_object_new`] or the string constructors, and ARC keeps
//! those alive while code holds a reference.
pub mod arc_track;
pub mod object;
pub mod string;
pub mod value;

pub use arc_track::ArcCounts;
pub use object::{OBJECT_HEADER_SIZE, RcObject, SIZE_OFFSET, VTABLE_OFFSET};
pub use string::RcString;
pub use value::{RcHeader, TYPE_OBJECT, TYPE_STRING, cinder_release, cinder_retain};
