//! C linkage for the process heap.
//!
//! Linking this in replaces libc's `malloc`, `free`, `realloc` and `calloc`
//! for the whole process. Only those four are provided: code that calls
//! `posix_memalign`, `aligned_alloc` or `malloc_usable_size` will still reach
//! libc and must not mix its pointers with these.

use libc::{c_void, size_t};

use crate::global;

#[unsafe(no_mangle)]
pub extern "C" fn malloc(size: size_t) -> *mut c_void {
  global::malloc(size) as *mut c_void
}

/// # Safety
///
/// `ptr` must be null or come from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { global::free(ptr as *mut u8) }
}

/// # Safety
///
/// `ptr` must be null or come from this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  unsafe { global::realloc(ptr as *mut u8, size) as *mut c_void }
}

#[unsafe(no_mangle)]
pub extern "C" fn calloc(
  count: size_t,
  size: size_t,
) -> *mut c_void {
  global::calloc(count, size) as *mut c_void
}
