use core::mem;

/// Size of a machine word. Every block size is a multiple of it and every
/// payload address handed out is aligned to it.
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// Calculates the machine word alignment for the given size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use hmm::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power
/// of two.
///
/// ```rust
/// use hmm::align_to;
///
/// assert_eq!(align_to!(17, 16), 32);
/// assert_eq!(align_to!(32, 16), 32);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Word-aligns `size`, or `None` if rounding would wrap past `usize::MAX`.
pub const fn checked_align(size: usize) -> Option<usize> {
  match size.checked_add(WORD_SIZE - 1) {
    Some(padded) => Some(padded & !(WORD_SIZE - 1)),
    None => None,
  }
}

/// Rounds an address up to `align` (a power of two).
pub fn align_addr(
  addr: *mut u8,
  align: usize,
) -> *mut u8 {
  debug_assert!(align.is_power_of_two());
  let padding = (addr as usize).wrapping_neg() & (align - 1);
  addr.wrapping_add(padding)
}
