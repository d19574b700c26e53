use core::{mem, ptr};

/// Bookkeeping header placed immediately before every payload.
///
/// ```text
///   ┌───────────────────────┬────────────────────────────────┐
///   │    Block Header       │         Payload                │
///   │  size | is_free | next│       `size` bytes             │
///   └───────────────────────┴────────────────────────────────┘
///                           ▲
///                           └── pointer handed to the caller
/// ```
#[repr(C)]
pub struct Block {
  pub size: usize,
  pub is_free: bool,
  pub next: *mut Block,
}

/// Bytes taken by one header. A multiple of the word size, so payloads that
/// follow a word-aligned header stay word-aligned.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

const _: () = assert!(HEADER_SIZE % mem::size_of::<usize>() == 0);

impl Block {
  pub fn new(
    size: usize,
    is_free: bool,
    next: *mut Block,
  ) -> Self {
    Self { size, is_free, next }
  }

  /// Writes a fresh header at `at` and returns it.
  ///
  /// # Safety
  ///
  /// `at` must be word-aligned and valid for writes of `HEADER_SIZE` bytes.
  pub unsafe fn write(
    at: *mut u8,
    block: Block,
  ) -> *mut Block {
    let header = at as *mut Block;
    unsafe { ptr::write(header, block) };
    header
  }

  /// First payload byte of `block`.
  pub fn payload(block: *mut Block) -> *mut u8 {
    (block as *mut u8).wrapping_add(HEADER_SIZE)
  }

  /// Header that owns the payload starting at `payload`.
  pub fn from_payload(payload: *mut u8) -> *mut Block {
    payload.wrapping_sub(HEADER_SIZE) as *mut Block
  }

  /// Address one past the last payload byte.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn end(block: *mut Block) -> *mut u8 {
    Self::payload(block).wrapping_add(unsafe { (*block).size })
  }
}
