//! Walks through allocate / reallocate / zero-allocate / free and reports
//! pass or fail for each step.
//!
//! By default the steps run on the process heap, which is also installed as
//! the global allocator. With `--arena` they run on a private heap over a
//! simulated break instead, with the engine's own events logged.
//!
//! ```text
//! cargo run --example walkthrough -- --pause
//! cargo run --example walkthrough -- --arena 4194304 --verbose
//! ```

use std::{io::Read, ptr};

use clap::Parser;
use hmm::{ArenaBreak, Heap, HeapConfig, HmmAlloc, brk::program_break};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: HmmAlloc = HmmAlloc::new();

#[derive(Parser, Debug)]
#[command(name = "walkthrough")]
#[command(about = "Exercise the hmm heap step by step")]
#[command(version)]
struct Cli {
  /// Run on a private heap over a simulated break of this many bytes.
  #[arg(long, value_name = "BYTES")]
  arena: Option<usize>,

  /// Initial span of the private heap (only with --arena).
  #[arg(long, value_name = "BYTES", default_value_t = hmm::config::DEFAULT_INITIAL_SIZE)]
  initial_size: usize,

  /// Wait for ENTER between steps, to inspect the process with pmap or gdb.
  #[arg(long)]
  pause: bool,

  /// Enable verbose output (sets RUST_LOG=debug)
  #[arg(short, long)]
  verbose: bool,

  /// Suppress output (only show errors)
  #[arg(short, long, conflicts_with = "verbose")]
  silent: bool,
}

/// The four entry points, on whichever heap the walkthrough targets.
trait Allocator {
  fn malloc(
    &mut self,
    size: usize,
  ) -> *mut u8;

  unsafe fn free(
    &mut self,
    ptr: *mut u8,
  );

  unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8;

  fn calloc(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8;
}

/// The process heap.
struct ProcessHeap;

impl Allocator for ProcessHeap {
  fn malloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    hmm::malloc(size)
  }

  unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    unsafe { hmm::free(ptr) }
  }

  unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe { hmm::realloc(ptr, size) }
  }

  fn calloc(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    hmm::calloc(count, size)
  }
}

impl Allocator for Heap<ArenaBreak> {
  fn malloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    self.allocate(size)
  }

  unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    unsafe { Heap::free(self, ptr) }
  }

  unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe { self.reallocate(ptr, size) }
  }

  fn calloc(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    self.zero_allocate(count, size)
  }
}

/// Waits until the user presses ENTER.
fn block_until_enter_pressed(pause: bool) {
  if pause {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn report(
  step: &str,
  ok: bool,
) -> bool {
  if ok {
    info!(step, "successful");
  } else {
    error!(step, "failed");
  }
  ok
}

fn run(
  heap: &mut impl Allocator,
  pause: bool,
) -> bool {
  let mut passed = true;

  unsafe {
    info!(program_break = ?program_break(), "start");
    block_until_enter_pressed(pause);

    // 1) Basic allocation.
    let ptr = heap.malloc(100);
    passed &= report("allocation", !ptr.is_null());
    if !ptr.is_null() {
      for i in 0..100 {
        ptr.add(i).write(i as u8);
      }
    }
    block_until_enter_pressed(pause);

    // 2) Reallocation keeps the first 100 bytes.
    let ptr = heap.realloc(ptr, 200);
    passed &= report("reallocation", !ptr.is_null());
    passed &= report(
      "reallocation keeps contents",
      !ptr.is_null() && (0..100).all(|i| *ptr.add(i) == i as u8),
    );
    block_until_enter_pressed(pause);

    // 3) Zero allocation of ten 4-byte integers.
    let zeroed = heap.calloc(10, size_of::<i32>());
    passed &= report("zero allocation", !zeroed.is_null());
    passed &= report(
      "memory zero-initialized",
      !zeroed.is_null() && (0..10).all(|i| (zeroed as *const i32).add(i).read() == 0),
    );
    block_until_enter_pressed(pause);

    // 4) Free, then free the same pointer again.
    heap.free(ptr);
    heap.free(ptr);
    passed &= report("double free", true);
    block_until_enter_pressed(pause);

    // 5) Large allocation grows the heap.
    info!(program_break = ?program_break(), "before large allocation");
    let big = heap.malloc(1024 * 1024);
    passed &= report("large allocation", !big.is_null());
    if !big.is_null() {
      ptr::write_bytes(big, 0xAB, 1024 * 1024);
      heap.free(big);
    }
    info!(program_break = ?program_break(), "after large allocation");

    heap.free(zeroed);
  }

  passed
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose {
    "debug"
  } else if cli.silent {
    "error"
  } else {
    "info"
  };

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::from_default_env().add_directive(default_level.parse().expect("static directive")),
    )
    .with_target(false)
    .init();

  let passed = match cli.arena {
    Some(capacity) => {
      let config = HeapConfig::new()
        .with_initial_size(cli.initial_size)
        .with_trace(true);
      let mut heap = Heap::with_config(ArenaBreak::new(capacity), config);
      info!(capacity, config = ?heap.config(), "private heap");

      let passed = run(&mut heap, cli.pause);
      info!(stats = ?heap.stats(), "private heap");
      passed
    }
    None => {
      let passed = run(&mut ProcessHeap, cli.pause);
      info!(stats = ?hmm::global::stats(), "process heap");
      passed
    }
  };

  if !passed {
    std::process::exit(1);
  }
}
