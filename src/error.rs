//! Error types for duplicate pair discovery and resolution

use thiserror::Error;

use crate::media::MediaId;

/// Top-level error for factories, sessions and the review engine.
///
/// Two kinds of failure are distinguished:
///
/// ### Backing-store failures
/// Anything the [`DuplicatesStore`](crate::store::DuplicatesStore) reports is
/// wrapped in [`DupError::Store`] and handed straight back to the caller. The
/// core never retries a store call; retry and backoff belong to whatever sits
/// behind the store.
///
/// ### Sequencing errors
/// Factories are driven by an external scheduler. Asking a factory about its
/// results before it was initialised, or after a commit invalidated its
/// candidate snapshot, is a scheduling bug and surfaces as
/// [`DupError::InvalidState`] instead of looking like "no candidates".
///
/// Empty results are never errors.
///
/// ```rust
/// use dupr::DupError;
///
/// let err = DupError::InvalidState {
/// 	operation: "search_work_is_done",
/// 	reason: "candidate pairs have not been fetched".to_string(),
/// };
/// assert!(err.to_string().contains("search_work_is_done"));
/// ```
#[derive(Debug, Error)]
pub enum DupError {
	/// Failure reported by the backing store
	#[error("Store error: {0}")]
	Store(#[from] StoreError),

	/// A factory or session operation was called in a state that does not allow it
	#[error("Invalid state for {operation}: {reason}")]
	InvalidState {
		operation: &'static str,
		reason: String,
	},

	/// Configuration validation errors with descriptive messages
	#[error("Configuration error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	/// The engine's command or event channel closed underneath us
	#[error("Channel closed: {0}")]
	Channel(String),
}

/// Errors raised by backing-store adapters
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Store I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Store JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Unknown file hash: {hash}")]
	UnknownHash { hash: String },

	#[error("Unknown media id: {media_id}")]
	UnknownMedia { media_id: MediaId },

	#[error("Store query {operation} failed: {reason}")]
	Query {
		operation: &'static str,
		reason: String,
	},
}

/// Convenience alias used throughout the crate.
pub type DupResult<T> = Result<T, DupError>;

/// Convenience alias for store operation results.
pub type StoreResult<T> = Result<T, StoreError>;

impl DupError {
	pub(crate) fn invalid_state(operation: &'static str, reason: impl Into<String>) -> Self {
		DupError::InvalidState {
			operation,
			reason: reason.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn test_dup_error_display() {
		let error = DupError::Config("min_block_size must be at least 1".to_string());
		assert_eq!(
			error.to_string(),
			"Configuration error: min_block_size must be at least 1"
		);

		let error = DupError::invalid_state("do_search_work", "not initialised");
		assert_eq!(
			error.to_string(),
			"Invalid state for do_search_work: not initialised"
		);
	}

	#[test_log::test]
	fn test_store_error_display() {
		let error = StoreError::UnknownHash {
			hash: "abcd".to_string(),
		};
		assert_eq!(error.to_string(), "Unknown file hash: abcd");

		let error = StoreError::UnknownMedia {
			media_id: MediaId(7),
		};
		assert_eq!(error.to_string(), "Unknown media id: 7");

		let error = StoreError::Query {
			operation: "write_content_updates",
			reason: "lock poisoned".to_string(),
		};
		assert_eq!(
			error.to_string(),
			"Store query write_content_updates failed: lock poisoned"
		);
	}

	#[test_log::test]
	fn test_error_conversion() {
		let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot missing");
		let store_error: StoreError = io_error.into();
		assert!(matches!(store_error, StoreError::Io(_)));

		let dup_error: DupError = store_error.into();
		assert!(matches!(dup_error, DupError::Store(StoreError::Io(_))));
	}
}
