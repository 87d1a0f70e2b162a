//! # Potential Duplicate Pair Review
//!
//! Discovery and resolution of potential duplicate file pairs.
//! Candidate pairs come from a backing store, are grouped into connected
//! duplicate groups or streamed flat, and are handed out in bounded batches
//! whose size adapts to how fast the store answers. Decisions about a pair
//! turn into content-update packages that are written back through the store.

pub mod compare;
pub mod config;
pub mod content;
pub mod decision;
pub mod error;
pub mod factory;
pub mod graph;
pub mod location;
pub mod media;
pub mod media_pairs;
pub mod merge;
pub mod pairs;
pub mod session;
pub mod store;
pub mod throttle;

pub mod engine;

// Re-export main API types
pub use config::ReviewConfig;
pub use decision::{AutoResolutionRuleRef, DuplicatePairDecision, DuplicateType};
pub use error::{DupError, DupResult, StoreError, StoreResult};
pub use factory::{
	AutoResolutionReviewPairFactory, DbPairFactory, MediaResultsPairFactory, PairFactory, SearchMode,
};
pub use media::{MediaId, MediaResult, ServiceKey};
pub use media_pairs::{MediaResultPair, MediaResultPairs};
pub use pairs::{IdPairAndDistance, PotentialIdPairs};
pub use session::{CommitSummary, ReviewSession, StepOutcome};
pub use store::{DuplicatesStore, MemoryStore};
