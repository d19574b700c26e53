//! # hmm - A Heap Memory Manager
//!
//! This crate provides a **first-fit free-list allocator** that manages one
//! contiguous heap region grown with the `sbrk` system call, with the four
//! classic entry points: allocate, free, reallocate and zero-allocate.
//!
//! ## Overview
//!
//! ```text
//!   Heap Region:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬───────────────────────────────────────┐  │
//!   │   │ A1  │free │ A3  │ A4  │            Untouched                  │  │
//!   │   └─────┴─────┴─────┴─────┴───────────────────────────────────────┘  │
//!   │                           ▲                                     ▲    │
//!   │                           │                                     │    │
//!   │                       Bump Pointer                         Program   │
//!   │                       (next block)                          Break    │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Requests are served from the first free block that fits (splitting
//!   off the rest), otherwise from the bump pointer, growing the break by
//!   exactly the shortfall when the region is full.
//!   Freed blocks are merged with free neighbours on every free.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   hmm
//!   ├── align      - Alignment macros (align!, align_to!) and helpers
//!   ├── block      - Block header structure
//!   ├── brk        - Program-break sources (Sbrk, ArenaBreak)
//!   ├── config     - HeapConfig
//!   ├── error      - BreakError, HeapError
//!   ├── heap       - Heap engine
//!   ├── global     - Process-wide heap, malloc/free/realloc/calloc, HmmAlloc
//!   └── ffi        - C exports (feature `c-abi`)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hmm::{ArenaBreak, Heap};
//!
//! let mut heap = Heap::new(ArenaBreak::new(2 * 1024 * 1024));
//!
//! unsafe {
//!     let ptr = heap.allocate(100);
//!     assert!(!ptr.is_null());
//!     ptr.write_bytes(7, 100);
//!
//!     let ptr = heap.reallocate(ptr, 200);
//!     assert_eq!(*ptr.add(99), 7);
//!
//!     heap.free(ptr);
//! }
//! ```
//!
//! Or use the process heap for everything:
//!
//! ```rust,no_run
//! #[global_allocator]
//! static GLOBAL: hmm::HmmAlloc = hmm::HmmAlloc::new();
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded engine**: `Heap` does no locking; the process heap
//!   serialises callers with a spin lock.
//! - **Never shrinks**: memory is not returned to the OS.
//! - **Word alignment only** from the engine; `HmmAlloc` pads larger alignments.
//! - **No misuse detection**: double frees are accepted, foreign pointers
//!   corrupt the heap.
//! - **Unix-only**: `Sbrk` requires `libc` and `sbrk` (POSIX systems).
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Freeing and reallocating take raw pointers and are `unsafe`.

pub mod align;
pub mod block;
pub mod brk;
pub mod config;
pub mod error;
#[cfg(feature = "c-abi")]
pub mod ffi;
pub mod global;
pub mod heap;

pub use brk::{ArenaBreak, ProgramBreak, Sbrk};
pub use config::HeapConfig;
pub use error::{BreakError, HeapError};
pub use global::{HmmAlloc, calloc, free, malloc, realloc};
pub use heap::{BlockInfo, Heap, HeapStats, Region};
