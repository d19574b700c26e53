//! Sources of raw heap memory.
//!
//! The engine only ever asks for one thing: "move the break up by N bytes and
//! tell me where it was". [`Sbrk`] answers with the real `sbrk(2)`,
//! [`ArenaBreak`] with a fixed buffer standing in for the data segment.

use std::{io, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{align::WORD_SIZE, error::BreakError};

/// The program-break growth primitive.
///
/// # Safety
///
/// On success `extend(n)` must return the previous break `p` such that
/// `p..p + n` is writable, word-aligned at `p` whenever the previous call left
/// the break word-aligned, and not handed to anyone else. Nothing may move the
/// break down again while the heap is alive.
pub unsafe trait ProgramBreak {
  /// Moves the break up by `increment` bytes and returns the old break.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError>;
}

/// The process data segment, grown with `sbrk(2)`.
#[derive(Debug)]
pub struct Sbrk {
  _private: (),
}

impl Sbrk {
  /// # Safety
  ///
  /// At most one `Sbrk` may be driving the break at a time. Other users of
  /// `brk` (libc's malloc, for one) are tolerated only in the sense that the
  /// heap notices the break moved and refuses to grow across the gap.
  pub const unsafe fn new() -> Self {
    Self { _private: () }
  }
}

unsafe impl ProgramBreak for Sbrk {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError> {
    let delta = intptr_t::try_from(increment).map_err(|_| BreakError::TooLarge(increment))?;

    let previous = unsafe { sbrk(delta) };

    if previous == usize::MAX as *mut c_void {
      let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
      return Err(BreakError::Refused { errno });
    }

    NonNull::new(previous as *mut u8).ok_or(BreakError::Refused { errno: 0 })
  }
}

/// Current program break, as reported by `sbrk(0)`.
pub fn program_break() -> *mut u8 {
  unsafe { sbrk(0) as *mut u8 }
}

/// A simulated data segment: a word-aligned buffer of fixed capacity whose
/// "break" is an offset into it.
///
/// ```rust
/// use hmm::brk::{ArenaBreak, ProgramBreak};
///
/// let mut brk = ArenaBreak::new(64);
/// let first = brk.extend(16).unwrap();
/// let second = brk.extend(16).unwrap();
/// assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 16);
/// assert!(brk.extend(64).is_err());
/// ```
pub struct ArenaBreak {
  base: NonNull<usize>,
  words: usize,
  top: usize,
}

// The buffer is owned exclusively by the arena.
unsafe impl Send for ArenaBreak {}

impl ArenaBreak {
  /// Reserves `capacity` bytes (rounded up to a whole word).
  pub fn new(capacity: usize) -> Self {
    let words = capacity.div_ceil(WORD_SIZE);
    let storage: Box<[usize]> = vec![0; words].into_boxed_slice();
    let base = NonNull::from(Box::leak(storage)).cast::<usize>();

    Self { base, words, top: 0 }
  }

  pub fn capacity(&self) -> usize {
    self.words * WORD_SIZE
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.top
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr() as *mut u8
  }
}

unsafe impl ProgramBreak for ArenaBreak {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError> {
    let available = self.capacity() - self.top;

    if increment > available {
      return Err(BreakError::Exhausted {
        requested: increment,
        available,
      });
    }

    // SAFETY: `top <= capacity`, so the result stays inside (or one past) the
    // buffer and is derived from a non-null base.
    let previous = unsafe { NonNull::new_unchecked(self.base().add(self.top)) };
    self.top += increment;

    Ok(previous)
  }
}

impl Drop for ArenaBreak {
  fn drop(&mut self) {
    let storage = std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.words);
    // SAFETY: `storage` came from `Box::leak` in `new` with this exact length.
    drop(unsafe { Box::from_raw(storage) });
  }
}
