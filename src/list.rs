use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::{ArcSwapOption, ArcSwapWeak};

/// A cell in the access-order list.
///
/// Nodes are append-only: refreshing an entry's position allocates a new
/// node at the tail and marks the superseded one *empty* rather than moving
/// it. An empty node stays physically linked until the cleanup pass splices
/// it out, or the eviction pass advances the head past it.
///
/// The node carries the key (not the entry) so the eviction scan can resolve
/// the owning entry through the map. `prev` is a weak link; the forward
/// chain owns the nodes from head to tail, which keeps a doubly-linked chain
/// of `Arc`s free of reference cycles.
pub(crate) struct Node<K> {
	key: K,
	empty: AtomicBool,
	prev: ArcSwapWeak<Node<K>>,
	next: ArcSwapOption<Node<K>>,
}

impl<K> Node<K> {
	pub(crate) fn new(key: K) -> Self {
		Self {
			key,
			empty: AtomicBool::new(false),
			prev: ArcSwapWeak::new(Weak::new()),
			next: ArcSwapOption::empty(),
		}
	}

	pub(crate) fn key(&self) -> &K {
		&self.key
	}

	/// Whether this node has been superseded (its entry moved on).
	pub(crate) fn is_empty(&self) -> bool {
		self.empty.load(Ordering::Acquire)
	}

	pub(crate) fn mark_empty(&self) {
		self.empty.store(true, Ordering::Release);
	}

	pub(crate) fn next(&self) -> Option<Arc<Node<K>>> {
		self.next.load_full()
	}

	pub(crate) fn prev(&self) -> Option<Arc<Node<K>>> {
		self.prev.load().upgrade()
	}

	/// A node that was never linked, or has been fully unlinked.
	pub(crate) fn isolated(&self) -> bool {
		self.prev.load().upgrade().is_none() && self.next.load().is_none()
	}

	/// Drop both links and mark the node empty.
	pub(crate) fn clear_links(&self) {
		self.prev.store(Weak::new());
		self.next.store(None);
		self.mark_empty();
	}
}

/// The doubly-linked access-order list: oldest at head, newest at tail.
///
/// `head` and `tail` are only ever moved by identity-based compare-and-swap;
/// interior `prev`/`next` links are plain stores whose brief inconsistency
/// under concurrent appends is tolerated by the scans.
pub(crate) struct AccessList<K> {
	head: ArcSwapOption<Node<K>>,
	tail: ArcSwapOption<Node<K>>,
}

impl<K> AccessList<K> {
	pub(crate) fn new() -> Self {
		Self {
			head: ArcSwapOption::empty(),
			tail: ArcSwapOption::empty(),
		}
	}

	pub(crate) fn head(&self) -> Option<Arc<Node<K>>> {
		self.head.load_full()
	}

	pub(crate) fn tail(&self) -> Option<Arc<Node<K>>> {
		self.tail.load_full()
	}

	/// Lock-free append at the tail.
	///
	/// An empty list installs the node as head and tail through a single
	/// compare-and-swap on the head. Otherwise the node's `prev` is pointed
	/// at the observed tail and the tail reference is swapped; the winner
	/// links the old tail's `next` forward. The tail is re-read on every
	/// retry.
	pub(crate) fn append_tail(&self, node: &Arc<Node<K>>) {
		loop {
			match self.tail.load_full() {
				None => {
					if cas_slot(&self.head, None, Some(node.clone())) {
						self.tail.store(Some(node.clone()));
						return;
					}
				}
				Some(tail) => {
					node.prev.store(Arc::downgrade(&tail));
					if cas_slot(&self.tail, Some(&tail), Some(node.clone())) {
						tail.next.store(Some(node.clone()));
						return;
					}
				}
			}
		}
	}

	/// Try to move the head from `from` to `to`. Used only by the eviction
	/// scan, which is the sole remover of head nodes.
	pub(crate) fn advance_head(&self, from: &Arc<Node<K>>, to: &Arc<Node<K>>) -> bool {
		cas_slot(&self.head, Some(from), Some(to.clone()))
	}

	/// Splice an interior node out of the chain and clear it.
	///
	/// Callers must not pass the current head; the head is only removed by
	/// [`advance_head`](Self::advance_head) so the list never loses its
	/// anchor mid-eviction.
	pub(crate) fn unlink(&self, node: &Arc<Node<K>>) {
		let prev = node.prev();
		let next = node.next();
		if let Some(prev) = prev.as_ref() {
			prev.next.store(next.clone());
		}
		if let Some(next) = next.as_ref() {
			match prev.as_ref() {
				Some(prev) => next.prev.store(Arc::downgrade(prev)),
				None => next.prev.store(Weak::new()),
			}
		}
		node.clear_links();
	}

	/// Detach the whole chain iteratively.
	///
	/// The forward links own the nodes, so dropping a long list through the
	/// usual recursive `Arc` drops would overflow the stack.
	pub(crate) fn clear(&self) {
		self.tail.store(None);
		let mut cursor = self.head.swap(None);
		while let Some(node) = cursor {
			cursor = node.next.swap(None);
		}
	}
}

/// Identity-based compare-and-swap of a node slot.
///
/// Success requires observing exactly the expected `Arc` (pointer identity,
/// matching the original's reference CAS); the loser's replacement handle is
/// dropped.
fn cas_slot<K>(
	slot: &ArcSwapOption<Node<K>>,
	current: Option<&Arc<Node<K>>>,
	new: Option<Arc<Node<K>>>,
) -> bool {
	let expected: *const Node<K> = current.map_or(ptr::null(), |node| Arc::as_ptr(node));
	let previous = slot.compare_and_swap(expected, new);
	let observed: *const Node<K> = (*previous).as_ref().map_or(ptr::null(), |node| Arc::as_ptr(node));
	ptr::eq(observed, expected)
}
