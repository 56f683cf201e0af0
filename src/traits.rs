use crate::error::LoadError;

/// External capability that produces a value for a key on a cache miss.
///
/// The loader is supplied at construction and invoked with no cache lock
/// held; it may block or perform arbitrary I/O. A failed load is returned
/// to the caller unchanged and nothing is cached for the key.
///
/// Any `Fn(&K) -> Result<V, LoadError>` closure is a loader:
///
/// ```
/// use hotline_cache::{CacheBuilder, LoadError};
///
/// let cache = CacheBuilder::new()
///     .maximum_size(64)
///     .build(|key: &u32| Ok::<_, LoadError>(key.to_string()));
///
/// assert_eq!(*cache.get(&7).unwrap(), "7");
/// ```
pub trait ValueLoader<K, V>: Send + Sync {
	/// Load the value for `key`.
	fn load(&self, key: &K) -> Result<V, LoadError>;
}

impl<K, V, F> ValueLoader<K, V> for F
where
	F: Fn(&K) -> Result<V, LoadError> + Send + Sync,
{
	fn load(&self, key: &K) -> Result<V, LoadError> {
		self(key)
	}
}
