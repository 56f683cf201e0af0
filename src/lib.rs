//! # hotline-cache
//!
//! A concurrent, size- and time-bounded cache with lock-free access-order
//! bookkeeping and an optional frequency-gated promotion tier.
//!
//! The engine pairs a sharded key→entry map with a doubly-linked
//! access-order list (oldest at head, newest at tail). Recency is
//! approximated without locks by *appending*: a hit swaps the entry onto a
//! fresh tail node via a single compare-and-swap and marks the old node
//! empty. Empty nodes are spliced out in batched cleanup passes; expired
//! and excess entries are trimmed from the head by flag-guarded eviction
//! passes. Exact LRU order is deliberately traded for lock-freedom.
//!
//! Misses are answered by a [`ValueLoader`] supplied at construction, or —
//! when a [`PromotionCache`] is wired in — by a counting tier that only
//! admits a key into the primary cache once it has been requested a
//! configurable number of times within one TTL window.
//!
//! ## Quick start
//!
//! ```
//! use std::time::Duration;
//! use hotline_cache::{CacheBuilder, LoadError};
//!
//! let cache = CacheBuilder::new()
//!     .maximum_size(1000)
//!     .expire_after(Duration::from_millis(500))
//!     .build(|key: &u32| Ok::<_, LoadError>(key.to_string()));
//!
//! cache.set(1, "one".to_string());
//! assert_eq!(*cache.get(&1).unwrap(), "one");
//!
//! // A miss loads through the supplied loader and caches the result.
//! assert_eq!(*cache.get(&2).unwrap(), "2");
//! assert_eq!(cache.size(), 2);
//! ```
//!
//! ## Hot-data admission
//!
//! ```
//! use hotline_cache::{CacheBuilder, LoadError, PromotionCache};
//!
//! // Promote a key into the primary cache after 3 accesses in one window.
//! let tier = PromotionCache::new(CacheBuilder::new().maximum_size(2000));
//! let cache = CacheBuilder::new()
//!     .maximum_size(1000)
//!     .build_with_promotion(|key: &u32| Ok::<_, LoadError>(key * 2), tier);
//!
//! for _ in 0..3 {
//!     assert_eq!(*cache.get(&21).unwrap(), 42);
//! }
//! assert!(cache.contains(&21));
//! ```
//!
//! ## Thread safety
//!
//! The cache is `Send + Sync`; share it across threads via `Arc`. Hit and
//! miss paths take no global lock — blocking is confined to two narrow
//! backpressure valves used only when the map or the pending-cleanup queue
//! is over its hard capacity.

mod builder;
mod cache;
mod entry;
mod error;
mod list;
mod promote;
mod stats;
mod traits;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use error::{CacheError, LoadError};
pub use promote::{PromotionCache, DEFAULT_PROMOTION_THRESHOLD};
pub use stats::StatsSnapshot;
pub use traits::ValueLoader;
