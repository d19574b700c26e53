use thiserror::Error;

/// Failure of the program-break primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakError {
  #[error("sbrk refused to move the program break (errno {errno})")]
  Refused { errno: i32 },

  #[error("break exhausted: requested {requested} bytes, {available} available")]
  Exhausted { requested: usize, available: usize },

  #[error("break increment of {0} bytes does not fit in isize")]
  TooLarge(usize),
}

/// Heap engine errors.
///
/// Only [`HeapError::Init`] is fatal at the C-style surface; everything else
/// becomes a null result there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("zero-size request")]
  ZeroSize,

  #[error("request of {0} bytes overflows the address space")]
  SizeOverflow(usize),

  #[error("initial heap reservation failed: {0}")]
  Init(BreakError),

  #[error("heap growth failed: {0}")]
  Grow(BreakError),

  #[error("program break moved under the heap: expected {expected:#x}, got {actual:#x}")]
  Discontiguous { expected: usize, actual: usize },
}

pub type Result<T> = core::result::Result<T, HeapError>;
