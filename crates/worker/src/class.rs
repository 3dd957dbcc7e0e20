/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Async coordination work (message forwarding, debounce timers).
	Background,
	/// Blocking file I/O: parsing a library, writing a save or a backup.
	IoBlocking,
	/// CPU-heavy blocking work such as index rebuilds.
	CpuBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
			Self::CpuBlocking => "cpu_blocking",
		}
	}
}
