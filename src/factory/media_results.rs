//! Factory over a fixed, already ordered list of pairs

use tracing::debug;

use super::PairFactory;
use crate::error::DupResult;
use crate::media_pairs::MediaResultPairs;

/// One-shot review queue. The caller's order and A/B assignment are part of
/// the payload, so this factory never reorders anything.
#[derive(Debug, Clone, Default)]
pub struct MediaResultsPairFactory {
	pairs: MediaResultPairs,
}

impl MediaResultsPairFactory {
	pub fn new(pairs: MediaResultPairs) -> Self {
		Self { pairs }
	}
}

impl PairFactory for MediaResultsPairFactory {
	fn do_initialisation_work(&mut self) -> DupResult<bool> {
		Ok(true)
	}

	fn initialisation_work_needed(&self) -> bool {
		false
	}

	fn initialisation_work_started(&self) -> bool {
		false
	}

	fn notify_initialisation_work_started(&mut self) {}

	fn notify_initialisation_work_finished(&mut self) {}

	fn initialisation_work_looks_good(&self) -> DupResult<bool> {
		Ok(!self.pairs.is_empty())
	}

	fn do_search_work(&mut self) -> DupResult<bool> {
		Ok(false)
	}

	fn search_work_is_done(&self) -> DupResult<bool> {
		Ok(true)
	}

	fn media_result_pairs(&self) -> DupResult<&MediaResultPairs> {
		Ok(&self.pairs)
	}

	fn sort_and_ab_pairs(&mut self) {}

	fn notify_fetch_more_pairs(&mut self) {}

	fn notify_commit_done(&mut self) {
		debug!("Factory: review queue of {} pairs committed", self.pairs.len());
		self.pairs.clear();
	}

	fn get_work_status(&self) -> String {
		format!("{} pairs to review", self.pairs.len())
	}
}
