/// Size of the span reserved on first use (1 MiB).
pub const DEFAULT_INITIAL_SIZE: usize = 1024 * 1024;

/// Heap engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Bytes requested from the break when the heap is first used.
  pub initial_size: usize,
  /// Emit `tracing` events from the engine. Leave this off for any heap that
  /// serves the global allocator.
  pub trace: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      initial_size: DEFAULT_INITIAL_SIZE,
      trace: false,
    }
  }

  pub const fn with_initial_size(
    mut self,
    initial_size: usize,
  ) -> Self {
    self.initial_size = initial_size;
    self
  }

  pub const fn with_trace(
    mut self,
    trace: bool,
  ) -> Self {
    self.trace = trace;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
