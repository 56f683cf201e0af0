use std::collections::hash_map::Entry as MapSlot;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use crossbeam_queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::builder::CacheBuilder;
use crate::entry::{Clock, Entry};
use crate::error::CacheError;
use crate::list::{AccessList, Node};
use crate::promote::PromotionCache;
use crate::stats::{Stats, StatsSnapshot};
use crate::traits::ValueLoader;

type Shard<K, V> = RwLock<HashMap<K, Arc<Entry<K, V>>, RandomState>>;

/// Concurrent size- and time-bounded cache.
///
/// The engine keeps a sharded key→entry map next to a lock-free
/// access-order list. Hits refresh an entry's position by appending a new
/// node at the tail; the superseded node is queued for a batched cleanup
/// pass. Capacity pressure and expiry are handled by an eviction pass that
/// trims the front of the list. Both passes run under compare-and-swap
/// acquired flags; a mutex is taken only as backpressure when the map or
/// the pending queue is over its hard capacity.
///
/// All methods take `&self`; share the cache across threads via
/// `Arc<Cache>`.
pub struct Cache<K, V> {
	shards: Box<[Shard<K, V>]>,
	shard_mask: usize,
	hasher: RandomState,
	list: AccessList<K>,
	/// Superseded nodes awaiting physical unlinking.
	pending: SegQueue<Arc<Node<K>>>,
	pending_count: AtomicUsize,
	entry_count: AtomicUsize,
	stats: Stats,
	clock: Clock,
	capacity: usize,
	hwm_capacity: usize,
	expire_millis: u64,
	cleanup_capacity: usize,
	hwm_cleanup_capacity: usize,
	evict_flag: AtomicBool,
	cleanup_flag: AtomicBool,
	evict_lock: Mutex<()>,
	cleanup_lock: Mutex<()>,
	loader: Option<Arc<dyn ValueLoader<K, V>>>,
	promotion: Option<Arc<PromotionCache<K, V>>>,
}

impl<K, V> Cache<K, V>
where
	K: Hash + Eq + Clone + Send + Sync + 'static,
	V: Send + Sync + 'static,
{
	pub(crate) fn new(
		builder: CacheBuilder,
		loader: Option<Arc<dyn ValueLoader<K, V>>>,
		promotion: Option<Arc<PromotionCache<K, V>>>,
	) -> Self {
		let capacity = builder.maximum_size;
		let cleanup_factor = builder.cleanup_factor.clamp(2, 10);
		let cleanup_capacity = capacity.saturating_mul(cleanup_factor);
		let shard_count = builder.shards.next_power_of_two();
		let shards = (0..shard_count)
			.map(|_| RwLock::new(HashMap::with_hasher(RandomState::new())))
			.collect::<Vec<_>>()
			.into_boxed_slice();

		Self {
			shards,
			shard_mask: shard_count - 1,
			hasher: RandomState::new(),
			list: AccessList::new(),
			pending: SegQueue::new(),
			pending_count: AtomicUsize::new(0),
			entry_count: AtomicUsize::new(0),
			stats: Stats::new(),
			clock: Clock::new(),
			capacity,
			hwm_capacity: capacity - capacity / 4,
			expire_millis: builder.expire_after.as_millis() as u64,
			cleanup_capacity,
			hwm_cleanup_capacity: cleanup_capacity - cleanup_capacity / 4,
			evict_flag: AtomicBool::new(false),
			cleanup_flag: AtomicBool::new(false),
			evict_lock: Mutex::new(()),
			cleanup_lock: Mutex::new(()),
			loader,
			promotion,
		}
	}

	/// Look up `key`, refreshing its position on a hit and loading through
	/// the configured loader (or promotion tier) on a miss.
	///
	/// An entry whose last touch is older than the configured expiry is
	/// removed on access and treated as a miss.
	pub fn get(&self, key: &K) -> Result<Arc<V>, CacheError> {
		self.stats.incr_gets();

		let entry = match self.lookup(key) {
			Some(entry) => entry,
			None => {
				trace!("miss");
				return self.load_miss(key);
			}
		};

		let superseded = self.offer(&entry);

		if entry.expired(self.clock.now(), self.expire_millis) {
			debug!("entry expired on access");
			self.remove_key(key);
			return self.load_miss(key);
		}

		if let Some(old) = superseded {
			self.purge(old);
		}

		match entry.value() {
			Some(value) => {
				self.stats.incr_hits();
				Ok(value)
			}
			None => self.load_miss(key),
		}
	}

	/// Insert `key` if absent. A present key keeps its existing value: the
	/// first write wins, which resolves concurrent first-time insert races
	/// by discarding the loser's value.
	pub fn set(&self, key: K, value: V) {
		self.insert_entry(key, Some(Arc::new(value)));
	}

	pub(crate) fn set_shared(&self, key: K, value: Arc<V>) {
		self.insert_entry(key, Some(value));
	}

	/// Number of entries currently in the map.
	pub fn size(&self) -> usize {
		self.entry_count.load(Ordering::Relaxed)
	}

	pub fn is_empty(&self) -> bool {
		self.size() == 0
	}

	/// Whether `key` is present, without touching its position or the
	/// counters.
	pub fn contains(&self, key: &K) -> bool {
		self.shard(key).read().contains_key(key)
	}

	/// Snapshot of the engine's counters.
	pub fn stats(&self) -> StatsSnapshot {
		self.stats.snapshot()
	}

	/// The loader supplied at construction, if any.
	pub fn value_loader(&self) -> Option<Arc<dyn ValueLoader<K, V>>> {
		self.loader.clone()
	}

	pub(crate) fn expire_millis(&self) -> u64 {
		self.expire_millis
	}

	pub(crate) fn now(&self) -> u64 {
		self.clock.now()
	}

	fn shard(&self, key: &K) -> &Shard<K, V> {
		let hash = self.hasher.hash_one(key) as usize;
		&self.shards[hash & self.shard_mask]
	}

	fn lookup(&self, key: &K) -> Option<Arc<Entry<K, V>>> {
		self.shard(key).read().get(key).cloned()
	}

	/// Remove `key` from the map, returning the detached entry.
	pub(crate) fn remove_key(&self, key: &K) -> Option<Arc<Entry<K, V>>> {
		let removed = self.shard(key).write().remove(key);
		if removed.is_some() {
			self.entry_count.fetch_sub(1, Ordering::Relaxed);
		}
		removed
	}

	/// Insert-if-absent. Returns the retained entry and whether this call
	/// inserted it. A first-time insert appends the entry's node at the
	/// tail and triggers the eviction pass past the high-water mark.
	pub(crate) fn insert_entry(&self, key: K, value: Option<Arc<V>>) -> (Arc<Entry<K, V>>, bool) {
		let entry = Arc::new(Entry::new(key.clone(), value, self.clock.now()));
		let node = entry.node();

		let existing = {
			let mut map = self.shard(&key).write();
			match map.entry(key) {
				MapSlot::Occupied(slot) => Some(slot.get().clone()),
				MapSlot::Vacant(slot) => {
					slot.insert(entry.clone());
					None
				}
			}
		};

		if let Some(existing) = existing {
			return (existing, false);
		}

		self.entry_count.fetch_add(1, Ordering::Relaxed);
		self.stats.incr_sets();
		self.list.append_tail(&node);
		if self.high_water_mark() {
			self.evict();
		}
		(entry, true)
	}

	fn load_miss(&self, key: &K) -> Result<Arc<V>, CacheError> {
		if let Some(tier) = &self.promotion {
			return tier.get(key, self);
		}
		let loader = self
			.loader
			.as_ref()
			.ok_or(CacheError::Configuration("cache has no value loader"))?;
		let value = Arc::new(loader.load(key)?);
		// Insert-if-absent: a concurrent loader for the same key may have
		// won the insert race, in which case its value is the one retained.
		let (entry, _inserted) = self.insert_entry(key.clone(), Some(value.clone()));
		Ok(entry.value().unwrap_or(value))
	}

	/// Refresh `entry`'s position and report the superseded node.
	///
	/// No-op when the entry's node is already the tail. Otherwise a single
	/// identity CAS moves the entry to a fresh node; the winner marks the
	/// old node empty and appends the fresh node at the tail (unless the
	/// entry has expired, in which case it must not re-enter the list).
	/// A loser returns `None` and discards its work.
	fn offer(&self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Node<K>>> {
		self.refresh(entry, true)
	}

	/// `offer` without the tail append, for detaching an entry that is
	/// leaving the map (tier promotion).
	pub(crate) fn detach(&self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Node<K>>> {
		self.refresh(entry, false)
	}

	fn refresh(&self, entry: &Arc<Entry<K, V>>, append: bool) -> Option<Arc<Node<K>>> {
		let current = entry.node();
		if let Some(tail) = self.list.tail() {
			if Arc::ptr_eq(&current, &tail) {
				return None;
			}
		}

		let fresh = Arc::new(Node::new(entry.key().clone()));
		if !entry.swap_node(&current, fresh.clone()) {
			return None;
		}
		current.mark_empty();
		if append && !entry.expired(self.clock.now(), self.expire_millis) {
			self.list.append_tail(&fresh);
		}
		Some(current)
	}

	fn high_water_mark(&self) -> bool {
		self.size() > self.hwm_capacity
	}

	fn full(&self) -> bool {
		self.size() > self.capacity
	}

	/// Race for the eviction flag and run the scan.
	///
	/// When the map is over hard capacity the thread first serializes on
	/// the eviction mutex — pure backpressure against CAS retry storms —
	/// and then spins until it personally wins the flag. Otherwise the
	/// flag is tried once and the current holder is left to do the work.
	fn evict(&self) {
		let over = self.full();
		let _backpressure = if over { Some(self.evict_lock.lock()) } else { None };
		let must_run = over;
		loop {
			if self
				.evict_flag
				.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				self.evict_scan();
				break;
			}
			if !must_run {
				break;
			}
			std::hint::spin_loop();
		}
	}

	/// The head scan. Caller must hold the eviction flag; the flag is
	/// released on return.
	///
	/// Trims the front of the list one CAS at a time until the map is back
	/// under the high-water mark and the front node's entry is present and
	/// fresh. Only this scan ever removes the head node.
	fn evict_scan(&self) {
		trace!("eviction pass");
		loop {
			let head = match self.list.head() {
				Some(head) => head,
				None => break,
			};
			let next = match head.next() {
				Some(next) => next,
				None => break,
			};

			let now = self.clock.now();
			let successor_live = !next.is_empty()
				&& self
					.lookup(next.key())
					.map_or(false, |entry| !entry.expired(now, self.expire_millis));
			if !self.high_water_mark() && successor_live {
				break;
			}

			// Captured before the CAS: a concurrent offer may mark the
			// head empty afterwards, but the map removal decision belongs
			// to the state we advanced past.
			let head_empty = head.is_empty();
			if self.list.advance_head(&head, &next) {
				self.stats.incr_evictions();
				if !head_empty {
					if self.remove_key(head.key()).is_some() {
						debug!("evicted entry");
					}
				}
				head.clear_links();
			}
		}
		self.evict_flag.store(false, Ordering::Release);
	}

	/// Queue a superseded node for the cleanup pass, and run the pass when
	/// the pending queue crosses its high-water mark.
	///
	/// Over the hard cleanup capacity, threads serialize on the cleanup
	/// mutex as backpressure. The flag winner also takes the eviction flag
	/// so the two passes never interleave: the queue is drained first, then
	/// the eviction scan runs in the same critical section.
	pub(crate) fn purge(&self, node: Arc<Node<K>>) {
		self.pending.push(node);
		let pending = self.pending_count.fetch_add(1, Ordering::AcqRel) + 1;
		if pending <= self.hwm_cleanup_capacity {
			return;
		}

		let over = self.pending_count.load(Ordering::Acquire) > self.cleanup_capacity;
		let _backpressure = if over { Some(self.cleanup_lock.lock()) } else { None };
		let must_run = over;
		loop {
			if self
				.cleanup_flag
				.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				while self
					.evict_flag
					.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
					.is_err()
				{
					std::hint::spin_loop();
				}
				self.clean_scan();
				self.evict_scan();
				break;
			}
			if !must_run {
				break;
			}
			std::hint::spin_loop();
		}
	}

	/// Drain the pending queue. Caller must hold both flags; the cleanup
	/// flag is released here, the eviction flag by the following scan.
	///
	/// Isolated nodes are already detached and are skipped. The current
	/// head is never spliced, even when empty — removing the head is the
	/// eviction scan's job, so the list cannot lose its anchor while an
	/// eviction is in flight.
	fn clean_scan(&self) {
		debug!(pending = self.pending_count.load(Ordering::Relaxed), "cleanup pass");
		loop {
			let node = match self.pending.pop() {
				Some(node) => node,
				None => break,
			};
			if node.isolated() {
				continue;
			}
			let at_head = self
				.list
				.head()
				.map_or(false, |head| Arc::ptr_eq(&head, &node));
			if !at_head {
				self.list.unlink(&node);
			}
			self.stats.incr_cleanups();
		}
		self.pending_count.store(0, Ordering::Release);
		self.cleanup_flag.store(false, Ordering::Release);
	}
}

impl<K, V> Drop for Cache<K, V> {
	fn drop(&mut self) {
		// Break the forward chain iteratively; recursive Arc drops would
		// overflow the stack on a long list.
		self.list.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::LoadError;
	use std::sync::atomic::AtomicUsize;
	use std::thread;
	use std::time::Duration;

	fn echo_cache(capacity: usize) -> Cache<u32, String> {
		CacheBuilder::new()
			.maximum_size(capacity)
			.expire_after(Duration::from_secs(60))
			.build(|key: &u32| Ok::<_, LoadError>(key.to_string()))
	}

	#[test]
	fn test_set_then_get() {
		let cache = echo_cache(16);
		cache.set(1, "one".to_string());

		assert_eq!(*cache.get(&1).unwrap(), "one");
		assert_eq!(cache.size(), 1);
	}

	#[test]
	fn test_miss_loads_and_inserts() {
		let cache = echo_cache(16);

		assert_eq!(*cache.get(&7).unwrap(), "7");
		assert!(cache.contains(&7));
		assert_eq!(cache.size(), 1);

		// Second access is a hit.
		assert_eq!(*cache.get(&7).unwrap(), "7");
		assert_eq!(cache.stats().hits, 1);
	}

	#[test]
	fn test_set_is_first_write_wins() {
		let cache = echo_cache(16);
		cache.set(1, "first".to_string());
		cache.set(1, "second".to_string());

		assert_eq!(*cache.get(&1).unwrap(), "first");
		assert_eq!(cache.size(), 1);
		assert_eq!(cache.stats().sets, 1);
	}

	#[test]
	fn test_expire_on_access_reloads() {
		let loads = Arc::new(AtomicUsize::new(0));
		let counter = loads.clone();
		let cache: Cache<u32, String> = CacheBuilder::new()
			.maximum_size(16)
			.expire_after(Duration::from_millis(50))
			.build(move |key: &u32| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok::<_, LoadError>(key.to_string())
			});

		cache.set(1, "cached".to_string());
		thread::sleep(Duration::from_millis(60));

		// Expired on access: removed, loader invoked, fresh value returned.
		assert_eq!(*cache.get(&1).unwrap(), "1");
		assert_eq!(loads.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_eviction_trims_over_high_water() {
		let cache = echo_cache(4); // high-water mark = 3

		for key in 0..4u32 {
			cache.set(key, key.to_string());
		}

		// The fourth insert pushed the map over the high-water mark; the
		// eviction pass trims from the head (oldest first).
		assert!(cache.size() <= 3);
		assert!(!cache.contains(&0));
		assert!(cache.contains(&3));
		assert!(cache.stats().evictions >= 1);
	}

	#[test]
	fn test_eviction_skips_fresh_front_under_high_water() {
		let cache = echo_cache(16); // high-water mark = 12
		for key in 0..4u32 {
			cache.set(key, key.to_string());
		}
		assert_eq!(cache.size(), 4);
		assert_eq!(cache.stats().evictions, 0);
	}

	#[test]
	fn test_cleanup_pass_drains_superseded_nodes() {
		// capacity 4 * factor 2 = 8 pending hard capacity, high-water 6.
		let cache: Cache<u32, String> = CacheBuilder::new()
			.maximum_size(4)
			.cleanup_factor(2)
			.expire_after(Duration::from_secs(60))
			.build(|key: &u32| Ok::<_, LoadError>(key.to_string()));

		cache.set(1, "a".to_string());
		cache.set(2, "b".to_string());

		// Alternating hits supersede a node each time; enough of them push
		// the pending queue over its high-water mark.
		for _ in 0..8 {
			cache.get(&1).unwrap();
			cache.get(&2).unwrap();
		}

		assert!(cache.stats().cleanups > 0);
		assert_eq!(*cache.get(&1).unwrap(), "a");
		assert_eq!(*cache.get(&2).unwrap(), "b");
	}

	#[test]
	fn test_stats_exact() {
		let cache = echo_cache(16);
		cache.set(1, "one".to_string());

		cache.get(&1).unwrap(); // hit
		cache.get(&2).unwrap(); // miss, loads
		cache.get(&3).unwrap(); // miss, loads

		let snap = cache.stats();
		assert_eq!(snap.gets, 3);
		assert_eq!(snap.hits, 1);
		assert_eq!(snap.sets, 3); // one set + two load-inserts
	}

	#[test]
	fn test_loader_error_propagates() {
		let cache: Cache<u32, String> = CacheBuilder::new()
			.maximum_size(16)
			.build(|_key: &u32| Err::<String, _>(LoadError::message("backend down")));

		let err = cache.get(&1).unwrap_err();
		assert!(matches!(err, CacheError::Load(_)));
		assert!(!cache.contains(&1));
	}

	#[test]
	fn test_concurrent_get_set() {
		let cache = Arc::new(echo_cache(2048));
		let mut handles = Vec::new();

		for t in 0..4u32 {
			let cache = cache.clone();
			handles.push(thread::spawn(move || {
				for i in 0..200u32 {
					let key = t * 200 + i;
					cache.set(key, key.to_string());
					assert_eq!(*cache.get(&key).unwrap(), key.to_string());
				}
			}));
		}
		for handle in handles {
			handle.join().unwrap();
		}

		assert_eq!(cache.size(), 800);
		assert_eq!(cache.stats().gets, 800);
		assert_eq!(cache.stats().hits, 800);
	}

	#[test]
	fn test_concurrent_same_key_refresh() {
		let cache = Arc::new(echo_cache(64));
		cache.set(1, "one".to_string());

		let mut handles = Vec::new();
		for _ in 0..4 {
			let cache = cache.clone();
			handles.push(thread::spawn(move || {
				for _ in 0..500 {
					assert_eq!(*cache.get(&1).unwrap(), "one");
				}
			}));
		}
		for handle in handles {
			handle.join().unwrap();
		}

		assert_eq!(cache.size(), 1);
		assert_eq!(cache.stats().gets, 2000);
	}

	#[test]
	fn test_is_send_sync() {
		fn assert_send<T: Send>() {}
		fn assert_sync<T: Sync>() {}

		assert_send::<Cache<u32, String>>();
		assert_sync::<Cache<u32, String>>();
	}
}
