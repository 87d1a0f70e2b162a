//! Typed read/write interface to the backing store
//!
//! Factories depend only on [`DuplicatesStore`]. Every method is a
//! synchronous call that may block for as long as the store needs; the
//! elapsed time is what the autothrottle feeds on. Store failures are
//! returned as-is and never retried by callers in this crate.

mod memory;
mod snapshot;
mod table;

pub use memory::{MemoryStore, StoreData, VerdictRecord};
pub use table::PairTable;

use crate::content::ContentUpdatePackage;
use crate::decision::AutoResolutionRuleRef;
use crate::error::StoreResult;
use crate::location::{LocationContext, PotentialDuplicatesSearchContext};
use crate::media_pairs::MediaResultPairs;
use crate::pairs::PotentialIdPairs;

pub trait DuplicatesStore: Send + Sync {
	/// Full candidate scan for everything in `location`
	fn potential_duplicate_id_pairs_and_distances(
		&self,
		location: &LocationContext,
	) -> StoreResult<PotentialIdPairs>;

	/// Cheap probe: the rows of `block` that still resolve to live files
	/// matching `search_context`. No hydration.
	fn potential_duplicate_id_pairs_and_distances_fragmentary(
		&self,
		search_context: &PotentialDuplicatesSearchContext,
		block: &PotentialIdPairs,
	) -> StoreResult<PotentialIdPairs>;

	/// Full hydration of the live rows of `block`, optionally capped
	fn potential_duplicate_media_result_pairs_and_distances_fragmentary(
		&self,
		search_context: &PotentialDuplicatesSearchContext,
		block: &PotentialIdPairs,
		no_more_than: Option<usize>,
	) -> StoreResult<MediaResultPairs>;

	/// Apply one package atomically
	fn write_content_updates(&self, package: &ContentUpdatePackage) -> StoreResult<()>;

	/// Record an operator verdict on a rule-proposed decision
	fn write_auto_resolution_verdict(
		&self,
		rule: &AutoResolutionRuleRef,
		hash_a: &str,
		hash_b: &str,
		approved: bool,
	) -> StoreResult<()>;
}
