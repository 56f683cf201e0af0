use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-engine operation counters.
///
/// Counters are exact: every `get`, hit, first-time `set`, eviction and
/// cleaned node is counted once, with no undercount from races.
#[derive(Debug, Default)]
pub(crate) struct Stats {
	gets: AtomicU64,
	hits: AtomicU64,
	sets: AtomicU64,
	evictions: AtomicU64,
	cleanups: AtomicU64,
}

impl Stats {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn incr_gets(&self) {
		self.gets.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn incr_hits(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn incr_sets(&self) {
		self.sets.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn incr_evictions(&self) {
		self.evictions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn incr_cleanups(&self) {
		self.cleanups.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			gets: self.gets.load(Ordering::Relaxed),
			hits: self.hits.load(Ordering::Relaxed),
			sets: self.sets.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			cleanups: self.cleanups.load(Ordering::Relaxed),
		}
	}
}

/// Point-in-time copy of an engine's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
	/// Total `get` calls.
	pub gets: u64,
	/// `get` calls answered from the map.
	pub hits: u64,
	/// First-time inserts (repeat `set`s of a present key do not count).
	pub sets: u64,
	/// Head advances performed by the eviction pass.
	pub evictions: u64,
	/// Nodes drained by the cleanup pass.
	pub cleanups: u64,
}

impl StatsSnapshot {
	/// Fraction of `get` calls that hit, in `[0, 1]`.
	pub fn hit_ratio(&self) -> f64 {
		if self.gets == 0 {
			0.0
		} else {
			self.hits as f64 / self.gets as f64
		}
	}

	/// Emit the counters as a tracing event.
	pub fn log(&self) {
		tracing::info!(
			gets = self.gets,
			hits = self.hits,
			sets = self.sets,
			evictions = self.evictions,
			cleanups = self.cleanups,
			"cache stats"
		);
	}
}

impl fmt::Display for StatsSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"gets: {} hits: {} sets: {} evictions: {} cleanups: {}",
			self.gets, self.hits, self.sets, self.evictions, self.cleanups
		)
	}
}
