use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::promote::PromotionCache;
use crate::traits::ValueLoader;

pub(crate) const DEFAULT_EXPIRE: Duration = Duration::from_millis(500);
pub(crate) const DEFAULT_CLEANUP_FACTOR: usize = 2;
pub(crate) const DEFAULT_SHARDS: usize = 16;

/// Builder for configuring a [`Cache`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hotline_cache::{CacheBuilder, LoadError};
///
/// let cache = CacheBuilder::new()
///     .maximum_size(1000)
///     .expire_after(Duration::from_millis(500))
///     .cleanup_factor(3)
///     .build(|key: &u32| Ok::<_, LoadError>(key.to_string()));
///
/// assert_eq!(cache.size(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct CacheBuilder {
	pub(crate) maximum_size: usize,
	pub(crate) expire_after: Duration,
	pub(crate) cleanup_factor: usize,
	pub(crate) shards: usize,
}

impl CacheBuilder {
	/// Create a builder with default settings: unbounded size, 500 ms
	/// expiry, cleanup factor 2, 16 map shards.
	pub fn new() -> Self {
		Self {
			maximum_size: usize::MAX,
			expire_after: DEFAULT_EXPIRE,
			cleanup_factor: DEFAULT_CLEANUP_FACTOR,
			shards: DEFAULT_SHARDS,
		}
	}

	/// Maximum number of entries. The eviction pass starts trimming once
	/// the map passes 75% of this (the high-water mark).
	///
	/// Default: `usize::MAX` (unbounded).
	pub fn maximum_size(mut self, size: usize) -> Self {
		assert!(size > 0, "maximum_size must be non-zero");
		self.maximum_size = size;
		self
	}

	/// Time after the last touch at which an entry expires. Expiry is
	/// checked on access and during the eviction scan, not by a timer.
	///
	/// Default: 500 ms.
	pub fn expire_after(mut self, ttl: Duration) -> Self {
		self.expire_after = ttl;
		self
	}

	/// Sizing factor for the pending-cleanup queue: the queue's hard
	/// capacity is `maximum_size * factor`, and a cleanup pass is attempted
	/// at 75% of that. Clamped into `[2, 10]`.
	///
	/// Default: 2.
	pub fn cleanup_factor(mut self, factor: usize) -> Self {
		self.cleanup_factor = factor.clamp(2, 10);
		self
	}

	/// Number of shards for the key map, rounded up to a power of two.
	/// More shards reduce write contention on the insert path.
	///
	/// Default: 16.
	pub fn shards(mut self, count: usize) -> Self {
		assert!(count > 0, "shards must be non-zero");
		self.shards = count;
		self
	}

	/// Build a cache that answers misses through `loader`.
	pub fn build<K, V, L>(self, loader: L) -> Cache<K, V>
	where
		K: Hash + Eq + Clone + Send + Sync + 'static,
		V: Send + Sync + 'static,
		L: ValueLoader<K, V> + 'static,
	{
		Cache::new(self, Some(Arc::new(loader)), None)
	}

	/// Build a cache whose misses are routed through a frequency-gated
	/// promotion tier. The tier is wired once, at construction.
	pub fn build_with_promotion<K, V, L>(self, loader: L, tier: PromotionCache<K, V>) -> Cache<K, V>
	where
		K: Hash + Eq + Clone + Send + Sync + 'static,
		V: Send + Sync + 'static,
		L: ValueLoader<K, V> + 'static,
	{
		Cache::new(self, Some(Arc::new(loader)), Some(Arc::new(tier)))
	}
}

impl Default for CacheBuilder {
	fn default() -> Self {
		Self::new()
	}
}
