//! Review queue for the proposals of one automated resolution rule

use super::{MediaResultsPairFactory, PairFactory};
use crate::decision::AutoResolutionRuleRef;
use crate::error::DupResult;
use crate::media_pairs::MediaResultPairs;

/// A [`MediaResultsPairFactory`] that remembers which rule produced its pairs.
#[derive(Debug, Clone)]
pub struct AutoResolutionReviewPairFactory {
	rule: AutoResolutionRuleRef,
	inner: MediaResultsPairFactory,
}

impl AutoResolutionReviewPairFactory {
	pub fn new(rule: AutoResolutionRuleRef, pairs: MediaResultPairs) -> Self {
		Self {
			rule,
			inner: MediaResultsPairFactory::new(pairs),
		}
	}

	pub fn rule(&self) -> &AutoResolutionRuleRef {
		&self.rule
	}
}

impl PairFactory for AutoResolutionReviewPairFactory {
	fn do_initialisation_work(&mut self) -> DupResult<bool> {
		self.inner.do_initialisation_work()
	}

	fn initialisation_work_needed(&self) -> bool {
		self.inner.initialisation_work_needed()
	}

	fn initialisation_work_started(&self) -> bool {
		self.inner.initialisation_work_started()
	}

	fn notify_initialisation_work_started(&mut self) {
		self.inner.notify_initialisation_work_started();
	}

	fn notify_initialisation_work_finished(&mut self) {
		self.inner.notify_initialisation_work_finished();
	}

	fn initialisation_work_looks_good(&self) -> DupResult<bool> {
		self.inner.initialisation_work_looks_good()
	}

	fn do_search_work(&mut self) -> DupResult<bool> {
		self.inner.do_search_work()
	}

	fn search_work_is_done(&self) -> DupResult<bool> {
		self.inner.search_work_is_done()
	}

	fn media_result_pairs(&self) -> DupResult<&MediaResultPairs> {
		self.inner.media_result_pairs()
	}

	fn sort_and_ab_pairs(&mut self) {
		self.inner.sort_and_ab_pairs();
	}

	fn notify_fetch_more_pairs(&mut self) {
		self.inner.notify_fetch_more_pairs();
	}

	fn notify_commit_done(&mut self) {
		self.inner.notify_commit_done();
	}

	fn get_work_status(&self) -> String {
		format!("rule '{}': {}", self.rule.name, self.inner.get_work_status())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::media::{MediaId, MediaResult};
	use crate::media_pairs::MediaResultPair;

	#[test_log::test]
	fn test_status_names_rule() {
		let pairs = MediaResultPairs::new(vec![MediaResultPair::new(
			MediaResult::new(MediaId(1), "aa", "image/png", 1),
			MediaResult::new(MediaId(2), "bb", "image/png", 2),
			0,
		)]);
		let mut factory =
			AutoResolutionReviewPairFactory::new(AutoResolutionRuleRef::new(3, "png over jpeg"), pairs);
		assert_eq!(factory.get_work_status(), "rule 'png over jpeg': 1 pairs to review");
		assert_eq!(factory.rule().id, 3);

		let before = factory.media_result_pairs().unwrap().clone();
		factory.sort_and_ab_pairs();
		assert_eq!(factory.media_result_pairs().unwrap(), &before);

		factory.notify_commit_done();
		assert_eq!(factory.get_work_status(), "rule 'png over jpeg': 0 pairs to review");
	}
}
