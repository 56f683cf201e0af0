use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::list::Node;

/// Monotonic millisecond clock, one per engine.
pub(crate) struct Clock {
	start: Instant,
}

impl Clock {
	pub(crate) fn new() -> Self {
		Self {
			start: Instant::now(),
		}
	}

	pub(crate) fn now(&self) -> u64 {
		self.start.elapsed().as_millis() as u64
	}
}

/// The stored key/value pair.
///
/// An entry is owned jointly by the map (by key) and by the list through its
/// current node. Primary entries carry a value from creation; counting
/// entries in the promotion tier start without one and are filled in on
/// every counted access. `hits` is the tier's window counter and is never
/// read by the primary engine.
pub(crate) struct Entry<K, V> {
	key: K,
	value: ArcSwapOption<V>,
	touched: AtomicU64,
	node: ArcSwap<Node<K>>,
	hits: AtomicU32,
}

impl<K: Clone, V> Entry<K, V> {
	pub(crate) fn new(key: K, value: Option<Arc<V>>, now: u64) -> Self {
		let node = Arc::new(Node::new(key.clone()));
		Self {
			key,
			value: ArcSwapOption::new(value),
			touched: AtomicU64::new(now),
			node: ArcSwap::new(node),
			hits: AtomicU32::new(0),
		}
	}

	pub(crate) fn key(&self) -> &K {
		&self.key
	}

	pub(crate) fn value(&self) -> Option<Arc<V>> {
		self.value.load_full()
	}

	pub(crate) fn store_value(&self, value: Arc<V>) {
		self.value.store(Some(value));
	}

	/// The entry's current position node.
	pub(crate) fn node(&self) -> Arc<Node<K>> {
		self.node.load_full()
	}

	/// Single identity-based compare-and-swap of the position handle.
	///
	/// Exactly one of any set of concurrent refreshers wins; losers keep the
	/// node they observed and discard the replacement.
	pub(crate) fn swap_node(&self, current: &Arc<Node<K>>, fresh: Arc<Node<K>>) -> bool {
		let expected = Arc::as_ptr(current);
		let previous = self.node.compare_and_swap(expected, fresh);
		ptr::eq(Arc::as_ptr(&previous), expected)
	}

	pub(crate) fn touched(&self) -> u64 {
		self.touched.load(Ordering::Acquire)
	}

	pub(crate) fn touch(&self, now: u64) {
		self.touched.store(now, Ordering::Release);
	}

	pub(crate) fn expired(&self, now: u64, ttl_millis: u64) -> bool {
		now.saturating_sub(self.touched()) > ttl_millis
	}

	/// Count an access inside the tier's TTL window.
	///
	/// Within the window the counter is atomically incremented; once the
	/// window has lapsed it restarts at 1 with a fresh stamp. A burst that
	/// straddles the boundary restarts counting rather than decaying.
	pub(crate) fn count_access(&self, now: u64, ttl_millis: u64) -> u32 {
		if now.saturating_sub(self.touched()) < ttl_millis {
			self.hits.fetch_add(1, Ordering::AcqRel) + 1
		} else {
			self.touch(now);
			self.hits.store(1, Ordering::Release);
			1
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_expiry_boundary() {
		let entry: Entry<u32, String> = Entry::new(1, None, 100);

		assert!(!entry.expired(100, 50));
		assert!(!entry.expired(150, 50)); // exactly at ttl is still fresh
		assert!(entry.expired(151, 50));
	}

	#[test]
	fn test_touch_refreshes_expiry() {
		let entry: Entry<u32, String> = Entry::new(1, None, 0);
		assert!(entry.expired(100, 50));

		entry.touch(100);
		assert!(!entry.expired(120, 50));
	}

	#[test]
	fn test_count_access_within_window() {
		let entry: Entry<u32, String> = Entry::new(1, None, 0);

		assert_eq!(entry.count_access(10, 100), 1);
		assert_eq!(entry.count_access(20, 100), 2);
		assert_eq!(entry.count_access(30, 100), 3);
	}

	#[test]
	fn test_count_access_window_reset() {
		let entry: Entry<u32, String> = Entry::new(1, None, 0);

		assert_eq!(entry.count_access(10, 100), 1);
		assert_eq!(entry.count_access(20, 100), 2);

		// Window lapsed: the count restarts at 1 with a fresh stamp.
		assert_eq!(entry.count_access(200, 100), 1);
		assert_eq!(entry.touched(), 200);
		assert_eq!(entry.count_access(210, 100), 2);
	}

	#[test]
	fn test_swap_node_identity() {
		let entry: Entry<u32, String> = Entry::new(1, None, 0);
		let current = entry.node();
		let fresh = Arc::new(Node::new(1));

		assert!(entry.swap_node(&current, fresh.clone()));
		assert!(Arc::ptr_eq(&entry.node(), &fresh));

		// A loser holding the stale node must fail.
		let stale_attempt = Arc::new(Node::new(1));
		assert!(!entry.swap_node(&current, stale_attempt));
		assert!(Arc::ptr_eq(&entry.node(), &fresh));
	}

	#[test]
	fn test_value_slot() {
		let entry: Entry<u32, String> = Entry::new(1, None, 0);
		assert!(entry.value().is_none());

		entry.store_value(Arc::new("hello".to_string()));
		assert_eq!(*entry.value().unwrap(), "hello");
	}
}
