use std::time::Duration;

use proptest::prelude::*;

use hotline_cache::{Cache, CacheBuilder, LoadError};

fn echo_cache(capacity: usize) -> Cache<u64, String> {
	CacheBuilder::new()
		.maximum_size(capacity)
		.expire_after(Duration::from_secs(60))
		.build(|key: &u64| Ok::<_, LoadError>(key.to_string()))
}

proptest! {
	#[test]
	fn test_set_get_consistency(keys in prop::collection::vec(0u64..100, 1..50)) {
		let cache = echo_cache(1024); // large enough to avoid eviction

		for key in &keys {
			cache.set(*key, key.to_string());
		}

		for key in &keys {
			prop_assert!(cache.contains(key));
			prop_assert_eq!((*cache.get(key).unwrap()).clone(), key.to_string());
		}
	}

	#[test]
	fn test_first_write_wins(key in 0u64..100, values in prop::collection::vec(".*", 2..5)) {
		let cache = echo_cache(1024);

		cache.set(key, values[0].clone());
		for value in &values[1..] {
			cache.set(key, value.clone());
		}

		prop_assert_eq!((*cache.get(&key).unwrap()).clone(), values[0].clone());
	}

	#[test]
	fn test_size_stays_bounded(keys in prop::collection::vec(0u64..500, 1..200)) {
		let capacity = 8;
		let cache = echo_cache(capacity);

		for key in &keys {
			cache.set(*key, key.to_string());
			// Single-threaded: every insert past the high-water mark runs
			// the eviction pass before returning.
			prop_assert!(cache.size() <= capacity);
		}
	}

	#[test]
	fn test_get_counter_is_exact(keys in prop::collection::vec(0u64..50, 1..100)) {
		let cache = echo_cache(1024);

		for key in &keys {
			cache.get(key).unwrap();
		}

		let snap = cache.stats();
		prop_assert_eq!(snap.gets, keys.len() as u64);
		prop_assert_eq!(snap.hits + snap.sets, keys.len() as u64);
	}

	#[test]
	fn test_churn_preserves_values(
		keys in prop::collection::vec(0u64..8, 10..100),
	) {
		let cache = echo_cache(64);

		for key in &keys {
			// Mixed workload: every access either loads or hits, and the
			// retained value for a key never changes.
			prop_assert_eq!((*cache.get(key).unwrap()).clone(), key.to_string());
		}

		for key in &keys {
			prop_assert!(cache.contains(key));
		}
	}
}
