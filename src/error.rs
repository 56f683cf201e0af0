use std::error::Error;

/// Failure produced by a [`ValueLoader`](crate::ValueLoader) on a cache miss.
///
/// The cache never retries a failed load; the error is propagated verbatim
/// to the caller of `get`.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct LoadError(Box<dyn Error + Send + Sync>);

impl LoadError {
	/// Wrap an arbitrary error as a load failure.
	pub fn new<E>(err: E) -> Self
	where
		E: Into<Box<dyn Error + Send + Sync>>,
	{
		Self(err.into())
	}

	/// Build a load failure from a plain message.
	pub fn message(msg: impl Into<String>) -> Self {
		Self(msg.into().into())
	}
}

/// Errors surfaced by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	/// The external value loader failed.
	#[error("value loader failed: {0}")]
	Load(#[from] LoadError),

	/// The engine cannot serve the request as configured, e.g. a miss
	/// reached an engine with neither a loader nor a promotion tier.
	#[error("cache configuration error: {0}")]
	Configuration(&'static str),
}
