//! Potential duplicate pair factories
//!
//! A factory turns the backing store's candidate pairs into batches of
//! hydrated pairs for a decision maker. It never spawns threads: a scheduler
//! calls the `do_*` methods repeatedly, and each call performs at most one
//! bounded unit of store work, so cancellation is just "stop calling".
//!
//! Lifecycle shared by every variant:
//!
//! ```text
//! Uninitialised -> Initialising -> Initialised (no candidates)
//!                               -> Initialised (has candidates) -> Searching -> HasResults
//!                                                                  ^               |
//!                               Initialising <- Invalidated <------+--- commit ----+
//! ```

mod auto_review;
mod db;
mod media_results;

pub use auto_review::AutoResolutionReviewPairFactory;
pub use db::{DbPairFactory, SearchMode};
pub use media_results::MediaResultsPairFactory;

use crate::error::DupResult;
use crate::media_pairs::MediaResultPairs;

pub trait PairFactory: Send {
	/// Fetch the full candidate set. Only valid while initialisation is needed.
	fn do_initialisation_work(&mut self) -> DupResult<bool>;

	fn initialisation_work_needed(&self) -> bool;

	fn initialisation_work_started(&self) -> bool;

	fn notify_initialisation_work_started(&mut self);

	fn notify_initialisation_work_finished(&mut self);

	/// Whether initialisation found anything to search. Empty is not an error.
	fn initialisation_work_looks_good(&self) -> DupResult<bool>;

	/// One bounded unit of search. `true` means calling again may make progress.
	fn do_search_work(&mut self) -> DupResult<bool>;

	/// Results were found, or there is nothing left to search
	fn search_work_is_done(&self) -> DupResult<bool>;

	/// The current batch. Asking a factory that has no candidate set loaded
	/// is a scheduling bug and fails.
	fn media_result_pairs(&self) -> DupResult<&MediaResultPairs>;

	/// Apply the configured sort and put the probably-better file first
	fn sort_and_ab_pairs(&mut self);

	/// Restart the search cursor from the full candidate set
	fn notify_fetch_more_pairs(&mut self);

	/// Drop the cached candidate set; a commit may have changed it
	fn notify_commit_done(&mut self);

	/// Tell the factory whether the system is idle, which widens its work budget
	fn notify_idle_state(&mut self, _idle: bool) {}

	/// Progress text for display only
	fn get_work_status(&self) -> String;
}
