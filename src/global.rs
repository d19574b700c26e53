//! The process-wide heap and the conventional allocator entry points.
//!
//! Every function here forwards to one [`Heap<Sbrk>`] guarded by a spin lock.
//! The lock never allocates and never parks, so it is safe to take from inside
//! the global allocator.

use core::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use spin::Mutex;

use crate::{
  align::{WORD_SIZE, align_addr},
  brk::Sbrk,
  error::HeapError,
  heap::{Heap, HeapStats, Region},
};

// Events stay off: a subscriber formatting them would allocate from here.
static HEAP: Mutex<Heap<Sbrk>> = Mutex::new(Heap::new(unsafe { Sbrk::new() }));

/// Allocates `size` bytes from the process heap. Null on `size == 0` or when
/// the heap cannot grow.
pub fn malloc(size: usize) -> *mut u8 {
  HEAP.lock().allocate(size)
}

/// Like [`malloc`], but says why nothing was allocated.
///
/// # Errors
///
/// See [`Heap::try_allocate`].
pub fn try_malloc(size: usize) -> Result<NonNull<u8>, HeapError> {
  HEAP.lock().try_allocate(size)
}

/// # Safety
///
/// `ptr` must be null or come from this module (or [`HmmAlloc`] with a layout
/// aligned to at most one word).
pub unsafe fn free(ptr: *mut u8) {
  unsafe { HEAP.lock().free(ptr) }
}

/// # Safety
///
/// Same contract as [`free`].
pub unsafe fn realloc(
  ptr: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { HEAP.lock().reallocate(ptr, size) }
}

/// Allocates `count * size` zeroed bytes. Null if the product overflows.
pub fn calloc(
  count: usize,
  size: usize,
) -> *mut u8 {
  HEAP.lock().zero_allocate(count, size)
}

/// Block and byte counts of the process heap.
pub fn stats() -> HeapStats {
  HEAP.lock().stats()
}

/// Bounds of the process heap, or `None` before its first allocation.
pub fn region() -> Option<Region> {
  HEAP.lock().region()
}

/// [`GlobalAlloc`] over the process heap.
///
/// ```rust,no_run
/// #[global_allocator]
/// static GLOBAL: hmm::HmmAlloc = hmm::HmmAlloc::new();
///
/// fn main() {
///     let v = vec![1u32, 2, 3];
///     println!("{v:?}");
/// }
/// ```
///
/// Layouts aligned to more than a word over-allocate by `align` bytes and keep
/// the heap pointer in the word just below the address handed out.
///
/// ```text
///   raw                       aligned
///   ▼                         ▼
///   ┌───────────────┬────────┬──────────────────────┬─────┐
///   │   padding     │  raw   │   layout.size()      │     │
///   └───────────────┴────────┴──────────────────────┴─────┘
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct HmmAlloc;

impl HmmAlloc {
  pub const fn new() -> Self {
    Self
  }
}

fn is_word_aligned(layout: &Layout) -> bool {
  layout.align() <= WORD_SIZE
}

fn alloc_overaligned(layout: Layout) -> *mut u8 {
  let Some(padded) = layout.size().checked_add(layout.align()) else {
    return ptr::null_mut();
  };

  let raw = malloc(padded);
  if raw.is_null() {
    return raw;
  }

  let aligned = align_addr(raw.wrapping_add(WORD_SIZE), layout.align());
  // SAFETY: `raw` is word-aligned, so `aligned - WORD_SIZE` lies within
  // `raw..aligned` and `aligned + size` within `raw + padded`.
  unsafe { (aligned as *mut *mut u8).sub(1).write(raw) };

  aligned
}

/// Heap pointer behind an over-aligned allocation.
unsafe fn overaligned_origin(ptr: *mut u8) -> *mut u8 {
  unsafe { (ptr as *mut *mut u8).sub(1).read() }
}

unsafe impl GlobalAlloc for HmmAlloc {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if is_word_aligned(&layout) {
      malloc(layout.size())
    } else {
      alloc_overaligned(layout)
    }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if is_word_aligned(&layout) {
      return calloc(1, layout.size());
    }

    let ptr = alloc_overaligned(layout);
    if !ptr.is_null() {
      unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
    }
    ptr
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
  ) {
    unsafe {
      if is_word_aligned(&layout) {
        free(ptr);
      } else {
        free(overaligned_origin(ptr));
      }
    }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if is_word_aligned(&layout) {
      return unsafe { realloc(ptr, new_size) };
    }

    // SAFETY: the caller guarantees `new_size` is valid for `layout.align()`.
    let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };
    let fresh = alloc_overaligned(new_layout);

    if !fresh.is_null() {
      unsafe {
        ptr::copy_nonoverlapping(ptr, fresh, layout.size().min(new_size));
        self.dealloc(ptr, layout);
      }
    }

    fresh
  }
}
