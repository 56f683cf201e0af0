use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::builder::CacheBuilder;
use crate::cache::Cache;
use crate::error::CacheError;
use crate::stats::StatsSnapshot;

/// Default number of counted accesses within one TTL window that promotes
/// a key into the primary cache.
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 3;

/// Frequency-gated admission tier.
///
/// Wraps a second engine (with its own, usually larger, capacity and its
/// own TTL) used purely as a per-key access counter. Misses on the primary
/// cache are routed here; each access loads the value, bumps the key's
/// counter within the tier's TTL window, and once the threshold is crossed
/// the key is promoted into the primary cache while the tier drops its
/// tracking entry.
///
/// There is no single-argument `get` on this type: the tier can only be
/// driven through the two-argument counting path.
pub struct PromotionCache<K, V> {
	inner: Cache<K, V>,
	threshold: u32,
}

impl<K, V> PromotionCache<K, V>
where
	K: Hash + Eq + Clone + Send + Sync + 'static,
	V: Send + Sync + 'static,
{
	/// Build a tier with the default promotion threshold.
	pub fn new(builder: CacheBuilder) -> Self {
		Self::with_threshold(builder, DEFAULT_PROMOTION_THRESHOLD)
	}

	/// Build a tier promoting after `threshold` accesses within one TTL
	/// window. A threshold of 0 is treated as 1.
	pub fn with_threshold(builder: CacheBuilder, threshold: u32) -> Self {
		Self {
			inner: Cache::new(builder, None, None),
			threshold: threshold.max(1),
		}
	}

	/// Count an access to `key` and load its value through the primary
	/// cache's loader; promote the key into `primary` once the window
	/// count reaches the threshold.
	///
	/// Promotion goes through the primary's normal insert path (including
	/// its high-water eviction trigger), and the tier's tracking entry is
	/// removed, its superseded node routed into the tier's own cleanup
	/// queue. The loaded value is returned regardless of the promotion
	/// outcome.
	pub fn get(&self, key: &K, primary: &Cache<K, V>) -> Result<Arc<V>, CacheError> {
		let (entry, _inserted) = self.inner.insert_entry(key.clone(), None);

		let loader = primary
			.value_loader()
			.ok_or(CacheError::Configuration("primary cache has no value loader"))?;
		let value = Arc::new(loader.load(key)?);
		entry.store_value(value.clone());

		let count = entry.count_access(self.inner.now(), self.inner.expire_millis());
		if count >= self.threshold {
			debug!(count, "promoting hot key into primary cache");
			primary.set_shared(key.clone(), value.clone());
			if let Some(tracked) = self.inner.remove_key(key) {
				if let Some(superseded) = self.inner.detach(&tracked) {
					self.inner.purge(superseded);
				}
			}
		}

		Ok(value)
	}

	/// Insert directly into the tier's own map (insert-if-absent).
	pub fn set(&self, key: K, value: V) {
		self.inner.set(key, value);
	}

	/// Number of keys currently being tracked.
	pub fn size(&self) -> usize {
		self.inner.size()
	}

	/// Snapshot of the tier engine's counters.
	pub fn stats(&self) -> StatsSnapshot {
		self.inner.stats()
	}

	/// The configured promotion threshold.
	pub fn threshold(&self) -> u32 {
		self.threshold
	}
}
