use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter tagging in-flight requests.
///
/// A completion carrying anything but the latest generation handed out for
/// its request is stale and must be dropped by the receiver.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	last: Arc<AtomicU64>,
}

impl GenerationClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation, starting at 1.
	pub fn next(&self) -> u64 {
		self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}
