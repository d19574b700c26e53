use core::{fmt, marker::PhantomData, ptr, ptr::NonNull};

use crate::{
  align::{WORD_SIZE, align_addr, checked_align},
  block::{Block, HEADER_SIZE},
  brk::ProgramBreak,
  config::HeapConfig,
  error::{BreakError, HeapError, Result},
};

/// Emits a `tracing` event only when the heap was configured with `trace`.
macro_rules! heap_event {
  ($heap:expr, $level:ident, $($arg:tt)+) => {
    if $heap.config.trace {
      tracing::$level!($($arg)+);
    }
  };
}

/// First-fit heap over a single region carved from a [`ProgramBreak`].
///
/// ```text
///   start                                        cursor           end
///   ▼                                            ▼                ▼
///   ┌─────┬────────┬─────┬──────┬─────┬────────┬──────────────────┐
///   │ hdr │ used   │ hdr │ free │ hdr │ used   │  untouched       │
///   └─────┴────────┴─────┴──────┴─────┴────────┴──────────────────┘
///   first ─────────► next ───────► last
/// ```
///
/// Blocks are packed back to back, so list order is address order. The
/// region only ever grows, and only in place.
pub struct Heap<B> {
  brk: B,
  config: HeapConfig,
  start: *mut u8,
  end: *mut u8,
  cursor: *mut u8,
  first: *mut Block,
  last: *mut Block,
}

// The heap owns every byte its pointers refer to.
unsafe impl<B: Send> Send for Heap<B> {}

/// Bounds of the heap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  pub start: *mut u8,
  pub end: *mut u8,
  /// Next untouched byte (the bump pointer).
  pub cursor: *mut u8,
}

impl Region {
  pub fn len(&self) -> usize {
    self.end as usize - self.start as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Bytes between the bump pointer and the end of the region.
  pub fn remaining(&self) -> usize {
    self.end as usize - self.cursor as usize
  }
}

/// Snapshot of one block, as seen while walking the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub header: *mut u8,
  pub payload: *mut u8,
  pub size: usize,
  pub is_free: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub used_bytes: usize,
  pub free_bytes: usize,
  pub header_bytes: usize,
  /// Bytes past the bump pointer that no block covers yet.
  pub tail_bytes: usize,
}

/// Iterator over the block list, head to tail.
pub struct Blocks<'a> {
  current: *mut Block,
  _heap: PhantomData<&'a Block>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.current.is_null() {
      return None;
    }

    let block = self.current;
    // SAFETY: every pointer reachable from `first` is a live header.
    unsafe {
      self.current = (*block).next;
      Some(BlockInfo {
        header: block as *mut u8,
        payload: Block::payload(block),
        size: (*block).size,
        is_free: (*block).is_free,
      })
    }
  }
}

impl<B> Heap<B> {
  pub const fn new(brk: B) -> Self {
    Self::with_config(brk, HeapConfig::new())
  }

  pub const fn with_config(
    brk: B,
    config: HeapConfig,
  ) -> Self {
    Self {
      brk,
      config,
      start: ptr::null_mut(),
      end: ptr::null_mut(),
      cursor: ptr::null_mut(),
      first: ptr::null_mut(),
      last: ptr::null_mut(),
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn is_initialized(&self) -> bool {
    !self.start.is_null()
  }

  pub fn region(&self) -> Option<Region> {
    self.is_initialized().then_some(Region {
      start: self.start,
      end: self.end,
      cursor: self.cursor,
    })
  }

  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.first,
      _heap: PhantomData,
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      tail_bytes: self.region().map_or(0, |region| region.remaining()),
      ..HeapStats::default()
    };

    for block in self.blocks() {
      stats.blocks += 1;
      stats.header_bytes += HEADER_SIZE;
      if block.is_free {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      } else {
        stats.used_bytes += block.size;
      }
    }

    stats
  }

  fn find_free_block(
    &self,
    size: usize,
  ) -> *mut Block {
    unsafe {
      let mut current: *mut Block = self.first;

      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }
}

impl<B: ProgramBreak> Heap<B> {
  /// Reserves the initial span. Called lazily by the first allocation; a
  /// second call is a no-op.
  ///
  /// # Errors
  ///
  /// [`HeapError::Init`] if the break refuses the reservation. Unlike
  /// [`Heap::allocate`], this does not terminate the process.
  pub fn init(&mut self) -> Result<()> {
    if self.is_initialized() {
      return Ok(());
    }

    let size = checked_align(self.config.initial_size.max(WORD_SIZE))
      .ok_or(HeapError::SizeOverflow(self.config.initial_size))?;

    let base = self.brk.extend(size).map_err(HeapError::Init)?.as_ptr();

    self.end = base.wrapping_add(size);
    // The first payload must be word-aligned even if the break was not.
    self.start = align_addr(base, WORD_SIZE);
    self.cursor = self.start;

    heap_event!(self, debug, start = ?self.start, end = ?self.end, "heap initialized");

    Ok(())
  }

  /// Allocates at least `size` bytes, reporting failures as errors.
  ///
  /// # Errors
  ///
  /// - [`HeapError::ZeroSize`] for `size == 0`, with no side effects.
  /// - [`HeapError::Init`] if the first reservation fails.
  /// - [`HeapError::Grow`] or [`HeapError::Discontiguous`] if the region
  ///   cannot be extended in place.
  /// - [`HeapError::SizeOverflow`] if `size` cannot be represented once
  ///   rounded and headed.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if size == 0 {
      return Err(HeapError::ZeroSize);
    }

    self.init()?;

    let size = checked_align(size).ok_or(HeapError::SizeOverflow(size))?;

    let mut block = self.find_free_block(size);

    if block.is_null() {
      block = self.append(size)?;
    } else {
      unsafe {
        self.split(block, size);
        (*block).is_free = false;
      }
      heap_event!(self, trace, block = ?block, size = unsafe { (*block).size }, "reused free block");
    }

    // SAFETY: `block` is a live header inside the region, so its payload
    // address is non-null.
    Ok(unsafe { NonNull::new_unchecked(Block::payload(block)) })
  }

  /// Allocates at least `size` bytes, word-aligned.
  ///
  /// Returns null for `size == 0` and when the heap cannot grow. If the very
  /// first reservation fails there is nothing to fall back on: the condition is
  /// reported on stderr and the process exits with status 1.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    match self.try_allocate(size) {
      Ok(payload) => payload.as_ptr(),
      Err(HeapError::Init(err)) => self.abort_init(err),
      Err(_) => ptr::null_mut(),
    }
  }

  /// Marks the block owning `ptr` free and merges every run of neighbouring
  /// free blocks in the list.
  ///
  /// Freeing the same pointer twice is accepted silently.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a payload pointer returned by this heap. Foreign
  /// pointers corrupt the heap; nothing checks for them.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    let block = Block::from_payload(ptr);

    unsafe {
      (*block).is_free = true;
      heap_event!(self, debug, block = ?block, size = (*block).size, "freed block");
      self.coalesce();
    }
  }

  /// Resizes the allocation at `ptr`.
  ///
  /// - Null `ptr` behaves like [`Heap::allocate`].
  /// - A size that still fits the current block returns `ptr` untouched.
  /// - Otherwise the contents move to a fresh block and the old one is freed.
  ///   If that allocation fails, null is returned and `ptr` stays valid.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::free`].
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if ptr.is_null() {
      return self.allocate(size);
    }

    let old = Block::from_payload(ptr);
    let old_size = unsafe { (*old).size };

    let Some(rounded) = checked_align(size) else {
      return ptr::null_mut();
    };

    if rounded <= old_size {
      return ptr;
    }

    let fresh = self.allocate(rounded);
    if fresh.is_null() {
      return ptr::null_mut();
    }

    unsafe {
      ptr::copy_nonoverlapping(ptr, fresh, old_size.min(size));
      self.free(ptr);
    }

    fresh
  }

  /// Allocates `count * size` bytes and zeroes the whole payload.
  ///
  /// A product that overflows `usize` yields null.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(total) = count.checked_mul(size) else {
      heap_event!(self, warn, count, size, "zero-allocation size overflows");
      return ptr::null_mut();
    };

    let payload = self.allocate(total);

    if !payload.is_null() {
      unsafe {
        let len = (*Block::from_payload(payload)).size;
        ptr::write_bytes(payload, 0, len);
      }
    }

    payload
  }

  /// Carves a free tail off `block` when the leftover can hold a header and
  /// at least one word of payload.
  unsafe fn split(
    &mut self,
    block: *mut Block,
    size: usize,
  ) {
    unsafe {
      let available = (*block).size;

      if available <= size + HEADER_SIZE {
        return;
      }

      let remainder = Block::write(
        Block::payload(block).add(size),
        Block::new(available - size - HEADER_SIZE, true, (*block).next),
      );

      (*block).size = size;
      (*block).next = remainder;

      if self.last == block {
        self.last = remainder;
      }

      heap_event!(self, trace, block = ?block, remainder = (*remainder).size, "split block");
    }
  }

  /// Places a new block at the bump pointer, growing the region by exactly
  /// the shortfall if needed.
  fn append(
    &mut self,
    size: usize,
  ) -> Result<*mut Block> {
    let needed = size
      .checked_add(HEADER_SIZE)
      .ok_or(HeapError::SizeOverflow(size))?;
    let room = self.end as usize - self.cursor as usize;

    if needed > room {
      self.grow(needed - room)?;
    }

    unsafe {
      let block = Block::write(self.cursor, Block::new(size, false, ptr::null_mut()));

      if self.first.is_null() {
        self.first = block;
      } else {
        (*self.last).next = block;
      }
      self.last = block;
      self.cursor = self.cursor.add(needed);

      heap_event!(self, trace, block = ?block, size, "appended block");

      Ok(block)
    }
  }

  fn grow(
    &mut self,
    shortfall: usize,
  ) -> Result<()> {
    (self.end as usize)
      .checked_add(shortfall)
      .ok_or(HeapError::SizeOverflow(shortfall))?;

    let previous = match self.brk.extend(shortfall) {
      Ok(previous) => previous.as_ptr(),
      Err(err) => {
        heap_event!(self, warn, shortfall, %err, "heap growth refused");
        return Err(HeapError::Grow(err));
      }
    };

    // The span just obtained is abandoned: it does not touch the region.
    if previous != self.end {
      heap_event!(self, warn, expected = ?self.end, actual = ?previous, "program break moved under the heap");
      return Err(HeapError::Discontiguous {
        expected: self.end as usize,
        actual: previous as usize,
      });
    }

    self.end = self.end.wrapping_add(shortfall);

    heap_event!(self, debug, shortfall, end = ?self.end, "heap grown");

    Ok(())
  }

  /// Sweeps the whole list, folding each free block into a free predecessor.
  unsafe fn coalesce(&mut self) {
    unsafe {
      let mut current = self.first;

      while !current.is_null() && !(*current).next.is_null() {
        let next = (*current).next;

        if (*current).is_free && (*next).is_free {
          (*current).size += (*next).size + HEADER_SIZE;
          (*current).next = (*next).next;

          if self.last == next {
            self.last = current;
          }

          heap_event!(self, debug, block = ?current, size = (*current).size, "merged block with next");
        } else {
          current = next;
        }
      }
    }
  }

  #[cold]
  fn abort_init(
    &self,
    err: BreakError,
  ) -> ! {
    heap_event!(self, error, %err, "cannot reserve the initial heap");
    eprintln!("hmm: {}", HeapError::Init(err));
    unsafe { libc::_exit(1) }
  }
}

impl<B> fmt::Debug for Heap<B> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Heap")
      .field("region", &self.region())
      .field("stats", &self.stats())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::brk::ArenaBreak;

  const W: usize = WORD_SIZE;

  fn heap(capacity: usize) -> Heap<ArenaBreak> {
    small_heap(capacity, capacity)
  }

  fn small_heap(
    initial_size: usize,
    capacity: usize,
  ) -> Heap<ArenaBreak> {
    Heap::with_config(
      ArenaBreak::new(capacity),
      HeapConfig::new().with_initial_size(initial_size),
    )
  }

  fn block_of(ptr: *mut u8) -> *mut Block {
    Block::from_payload(ptr)
  }

  fn layout(heap: &Heap<ArenaBreak>) -> Vec<(usize, bool)> {
    heap.blocks().map(|block| (block.size, block.is_free)).collect()
  }

  /// Blocks are packed in address order, word-sized, and end at the cursor.
  fn assert_packed(heap: &Heap<ArenaBreak>) {
    let region = heap.region().expect("heap initialized");
    let mut expected = region.start;

    for block in heap.blocks() {
      assert_eq!(block.header, expected);
      assert_eq!(block.size % W, 0);
      assert_eq!(block.payload as usize % W, 0);
      expected = block.payload.wrapping_add(block.size);
    }

    assert_eq!(expected, region.cursor);
    assert!(region.cursor <= region.end);
  }

  #[test]
  fn test_zero_size_is_null_before_init() {
    let mut heap = heap(4096);

    assert!(heap.allocate(0).is_null());
    assert_eq!(heap.try_allocate(0), Err(HeapError::ZeroSize));
    assert!(!heap.is_initialized());
  }

  #[test]
  fn test_zero_size_does_not_touch_heap() {
    let mut heap = heap(4096);

    heap.allocate(3 * W);
    let before = (heap.region(), heap.stats());

    assert!(heap.allocate(0).is_null());

    assert_eq!((heap.region(), heap.stats()), before);
  }

  #[test]
  fn test_lazy_init_reserves_initial_span() {
    let mut heap = small_heap(64 * W, 1024 * W);

    heap.allocate(1);

    let region = heap.region().unwrap();
    assert!(!region.is_empty());
    assert_eq!(region.len(), 64 * W);
    assert_eq!(heap.brk.used(), 64 * W);
    assert_eq!(region.start, heap.brk.base());
  }

  #[test]
  fn test_init_is_idempotent() {
    let mut heap = small_heap(16 * W, 64 * W);

    heap.init().unwrap();
    heap.init().unwrap();

    assert_eq!(heap.brk.used(), 16 * W);
  }

  #[test]
  fn test_init_failure_is_reported() {
    let mut heap = small_heap(1024 * 1024, 64);

    let expected = HeapError::Init(BreakError::Exhausted {
      requested: 1024 * 1024,
      available: 64,
    });

    assert_eq!(heap.init(), Err(expected));
    assert_eq!(heap.try_allocate(8), Err(expected));
    assert!(!heap.is_initialized());
  }

  #[test]
  fn test_fresh_heap_has_no_region() {
    let heap = heap(4096);

    assert!(heap.region().is_none());
    assert_eq!(heap.config(), &HeapConfig::new().with_initial_size(4096));
    assert_eq!(heap.blocks().count(), 0);
  }

  #[test]
  fn test_sizes_round_up_to_word() {
    let mut heap = heap(1024 * 1024);

    for size in 1..=(16 * W) {
      let ptr = heap.allocate(size);

      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % W, 0);
      assert_eq!(unsafe { (*block_of(ptr)).size }, crate::align!(size));
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_allocations_do_not_overlap() {
    let mut heap = heap(4096 * W);
    let sizes = [1, 7, 3 * W, 5, 10 * W, 2];

    let ptrs: Vec<*mut u8> = sizes.iter().map(|&size| heap.allocate(size)).collect();

    unsafe {
      for (i, (&ptr, &size)) in ptrs.iter().zip(&sizes).enumerate() {
        ptr::write_bytes(ptr, i as u8 + 1, size);
      }
      for (i, (&ptr, &size)) in ptrs.iter().zip(&sizes).enumerate() {
        for offset in 0..size {
          assert_eq!(*ptr.add(offset), i as u8 + 1);
        }
      }
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_freed_block_is_reused_first_fit() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(8 * W);
      let b = heap.allocate(8 * W);
      let _guard = heap.allocate(W);

      heap.free(b);
      heap.free(a);

      let cursor = heap.region().unwrap().cursor;
      let c = heap.allocate(2 * W);

      // `a` and `b` merged; the lowest address wins.
      assert_eq!(c, a);
      assert_eq!(heap.region().unwrap().cursor, cursor);
    }
  }

  #[test]
  fn test_split_leaves_free_remainder() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(8 * W);
      let _guard = heap.allocate(W);

      heap.free(a);
      let b = heap.allocate(2 * W);

      assert_eq!(b, a);
      assert_eq!(
        layout(&heap),
        vec![(2 * W, false), (8 * W - 2 * W - HEADER_SIZE, true), (W, false)]
      );
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_no_split_without_room_for_a_header() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(2 * W + HEADER_SIZE);
      let _guard = heap.allocate(W);

      heap.free(a);
      let b = heap.allocate(2 * W);

      assert_eq!(b, a);
      assert_eq!((*block_of(b)).size, 2 * W + HEADER_SIZE);
      assert_eq!(heap.stats().free_blocks, 0);
    }
  }

  #[test]
  fn test_split_of_tail_block_keeps_tail_link() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(8 * W);
      heap.free(a);

      let b = heap.allocate(W);
      assert_eq!(b, a);

      // The remainder is now the tail; a fresh block must follow it.
      let fresh = heap.allocate(32 * W);
      assert_eq!(
        layout(&heap),
        vec![(W, false), (8 * W - W - HEADER_SIZE, true), (32 * W, false)]
      );
      assert_eq!(block_of(fresh) as *mut u8, a.add(8 * W));
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_coalesce_forward() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(2 * W);
      let b = heap.allocate(4 * W);
      let _guard = heap.allocate(W);

      heap.free(a);
      heap.free(b);
    }

    assert_eq!(
      layout(&heap),
      vec![(2 * W + 4 * W + HEADER_SIZE, true), (W, false)]
    );
    assert_packed(&heap);
  }

  #[test]
  fn test_coalesce_backward() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(2 * W);
      let b = heap.allocate(4 * W);
      let _guard = heap.allocate(W);

      heap.free(b);
      heap.free(a);
    }

    assert_eq!(
      layout(&heap),
      vec![(2 * W + 4 * W + HEADER_SIZE, true), (W, false)]
    );
  }

  #[test]
  fn test_coalesce_bridges_both_neighbours() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(W);
      let b = heap.allocate(2 * W);
      let c = heap.allocate(3 * W);
      let _guard = heap.allocate(W);

      heap.free(a);
      heap.free(c);
      assert_eq!(heap.stats().free_blocks, 2);

      heap.free(b);
    }

    assert_eq!(
      layout(&heap),
      vec![(W + 2 * W + 3 * W + 2 * HEADER_SIZE, true), (W, false)]
    );
    assert_packed(&heap);
  }

  #[test]
  fn test_coalesce_at_tail_moves_last() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(W);
      let b = heap.allocate(W);

      heap.free(a);
      heap.free(b);
      assert_eq!(layout(&heap), vec![(2 * W + HEADER_SIZE, true)]);

      // Appending must link from the merged block, not the absorbed one.
      let big = heap.allocate(16 * W);
      assert_eq!(
        layout(&heap),
        vec![(2 * W + HEADER_SIZE, true), (16 * W, false)]
      );
      assert_eq!(block_of(big) as *mut u8, Block::end(block_of(a)));
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_free_null_is_noop() {
    let mut heap = heap(4096);

    unsafe { heap.free(ptr::null_mut()) };
    assert!(!heap.is_initialized());

    heap.allocate(W);
    let before = heap.stats();
    unsafe { heap.free(ptr::null_mut()) };
    assert_eq!(heap.stats(), before);
  }

  #[test]
  fn test_double_free_is_tolerated() {
    let mut heap = heap(4096 * W);

    unsafe {
      let a = heap.allocate(4 * W);
      let _guard = heap.allocate(W);

      heap.free(a);
      heap.free(a);

      assert_eq!(layout(&heap), vec![(4 * W, true), (W, false)]);
      assert_eq!(heap.allocate(4 * W), a);
    }
  }

  #[test]
  fn test_reallocate_null_allocates() {
    let mut heap = heap(4096 * W);

    unsafe {
      let ptr = heap.reallocate(ptr::null_mut(), 3);

      assert!(!ptr.is_null());
      assert_eq!((*block_of(ptr)).size, W);
    }
  }

  #[test]
  fn test_reallocate_within_block_keeps_pointer() {
    let mut heap = heap(4096 * W);

    unsafe {
      let ptr = heap.allocate(4 * W);
      for i in 0..4 * W {
        *ptr.add(i) = i as u8;
      }
      let before = heap.stats();

      assert_eq!(heap.reallocate(ptr, 4 * W), ptr);
      assert_eq!(heap.reallocate(ptr, W + 1), ptr);
      assert_eq!(heap.reallocate(ptr, 0), ptr);

      assert_eq!(heap.stats(), before);
      for i in 0..4 * W {
        assert_eq!(*ptr.add(i), i as u8);
      }
    }
  }

  #[test]
  fn test_reallocate_growth_moves_contents() {
    let mut heap = heap(4096 * W);

    unsafe {
      let old = heap.allocate(100);
      for i in 0..100 {
        *old.add(i) = (i * 3) as u8;
      }
      let _guard = heap.allocate(W);

      let new = heap.reallocate(old, 200);

      assert!(!new.is_null());
      assert_ne!(new, old);
      assert!((*block_of(new)).size >= 200);
      for i in 0..100 {
        assert_eq!(*new.add(i), (i * 3) as u8);
      }
      assert!((*block_of(old)).is_free);
    }

    assert_packed(&heap);
  }

  #[test]
  fn test_reallocate_failure_keeps_original() {
    let mut heap = small_heap(32 * W, 32 * W);

    unsafe {
      let ptr = heap.allocate(4 * W);
      ptr::write_bytes(ptr, 0x5A, 4 * W);

      assert!(heap.reallocate(ptr, 64 * W).is_null());

      assert!(!(*block_of(ptr)).is_free);
      for i in 0..4 * W {
        assert_eq!(*ptr.add(i), 0x5A);
      }
    }
  }

  #[test]
  fn test_zero_allocate_clears_reused_memory() {
    let mut heap = heap(4096 * W);

    unsafe {
      let dirty = heap.allocate(8 * W);
      ptr::write_bytes(dirty, 0xAB, 8 * W);
      let _guard = heap.allocate(W);
      heap.free(dirty);

      let zeroed = heap.zero_allocate(4, 2 * W);

      assert_eq!(zeroed, dirty);
      for i in 0..8 * W {
        assert_eq!(*zeroed.add(i), 0);
      }
    }
  }

  #[test]
  fn test_zero_allocate_edge_cases() {
    let mut heap = heap(4096 * W);

    assert!(heap.zero_allocate(0, 8).is_null());
    assert!(heap.zero_allocate(8, 0).is_null());
    assert!(heap.zero_allocate(usize::MAX, 2).is_null());
    assert!(!heap.is_initialized());
  }

  #[test]
  fn test_growth_requests_exact_shortfall() {
    let mut heap = small_heap(16 * W, 1024 * W);

    let ptr = heap.allocate(32 * W);
    assert!(!ptr.is_null());

    let region = heap.region().unwrap();
    assert_eq!(region.len(), 32 * W + HEADER_SIZE);
    assert_eq!(region.cursor, region.end);
    assert_eq!(heap.brk.used(), 32 * W + HEADER_SIZE);

    // Growth accounts for the bytes already left at the tail.
    heap.allocate(W);
    let region = heap.region().unwrap();
    assert_eq!(region.len(), 32 * W + W + 2 * HEADER_SIZE);
    assert_packed(&heap);
  }

  #[test]
  fn test_growth_failure_is_recoverable() {
    let mut heap = small_heap(16 * W, 16 * W);

    assert!(heap.allocate(32 * W).is_null());
    assert!(matches!(
      heap.try_allocate(32 * W),
      Err(HeapError::Grow(BreakError::Exhausted { .. }))
    ));

    let ptr = heap.allocate(2 * W);
    assert!(!ptr.is_null());
    assert_eq!(heap.stats().blocks, 1);
    assert_packed(&heap);
  }

  #[test]
  fn test_growth_rejects_moved_break() {
    let mut heap = small_heap(16 * W, 1024 * W);

    heap.init().unwrap();
    let end = heap.region().unwrap().end;

    // Someone else moves the break past the region.
    let foreign = heap.brk.extend(4 * W).unwrap();
    assert_eq!(foreign.as_ptr(), end);

    assert_eq!(
      heap.try_allocate(32 * W),
      Err(HeapError::Discontiguous {
        expected: end as usize,
        actual: end as usize + 4 * W,
      })
    );
    assert_eq!(heap.region().unwrap().end, end);

    // Requests that fit the existing region are unaffected.
    assert!(!heap.allocate(4 * W).is_null());
  }

  #[test]
  fn test_oversized_request_overflows() {
    let mut heap = heap(4096 * W);

    assert_eq!(
      heap.try_allocate(usize::MAX),
      Err(HeapError::SizeOverflow(usize::MAX))
    );
    assert!(heap.allocate(usize::MAX - HEADER_SIZE).is_null());
    assert!(!heap.allocate(W).is_null());
  }

  #[test]
  fn test_stats() {
    let mut heap = small_heap(64 * W, 64 * W);

    unsafe {
      let a = heap.allocate(4 * W);
      let _b = heap.allocate(2 * W);
      heap.free(a);
    }

    assert_eq!(
      heap.stats(),
      HeapStats {
        blocks: 2,
        free_blocks: 1,
        used_bytes: 2 * W,
        free_bytes: 4 * W,
        header_bytes: 2 * HEADER_SIZE,
        tail_bytes: 64 * W - 6 * W - 2 * HEADER_SIZE,
      }
    );
  }

  #[test]
  fn test_trace_events_do_not_change_behaviour() {
    let mut heap = Heap::with_config(
      ArenaBreak::new(4096 * W),
      HeapConfig::new().with_initial_size(64 * W).with_trace(true),
    );
    assert!(heap.config().trace);
    assert_eq!(heap.config().initial_size, 64 * W);

    unsafe {
      let a = heap.allocate(4 * W);
      let b = heap.allocate(4 * W);
      heap.free(a);
      heap.free(b);
    }

    assert_eq!(layout(&heap), vec![(8 * W + HEADER_SIZE, true)]);
  }

  #[test]
  fn test_end_to_end_scenario() {
    let mut heap = Heap::new(ArenaBreak::new(4 * 1024 * 1024));

    unsafe {
      let p1 = heap.allocate(100);
      assert!(!p1.is_null());
      for i in 0..100 {
        *p1.add(i) = i as u8;
      }

      let p2 = heap.reallocate(p1, 200);
      assert!(!p2.is_null());
      for i in 0..100 {
        assert_eq!(*p2.add(i), i as u8);
      }

      let p3 = heap.zero_allocate(10, 4);
      assert!(!p3.is_null());
      for i in 0..40 {
        assert_eq!(*p3.add(i), 0);
      }

      heap.free(p2);
      heap.free(p2);

      let big = heap.allocate(1024 * 1024);
      assert!(!big.is_null());
      heap.free(big);

      heap.free(p3);
    }

    assert_eq!(heap.stats().used_bytes, 0);
    assert_eq!(heap.stats().free_blocks, 1);
    assert_packed(&heap);
  }
}
