//! Cooperative review session: one bounded unit of work per step

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::ReviewConfig;
use crate::decision::DuplicatePairDecision;
use crate::error::DupResult;
use crate::factory::{DbPairFactory, PairFactory};
use crate::location::PotentialDuplicatesSearchContext;
use crate::media_pairs::MediaResultPairs;
use crate::store::DuplicatesStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
	/// The candidate set was (re)fetched
	Initialised { has_candidates: bool },
	/// One unit of search ran and more may be needed
	Searching,
	/// A batch of this many pairs is waiting for decisions
	Ready { pairs: usize },
	/// Nothing left to review
	Exhausted,
	Cancelled,
}

impl StepOutcome {
	/// Whether the driver should stop stepping and look at the session
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			StepOutcome::Ready { .. } | StepOutcome::Exhausted | StepOutcome::Cancelled
		)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
	pub decisions: usize,
	pub skipped: usize,
	pub packages_written: usize,
	pub verdicts_written: usize,
}

impl CommitSummary {
	pub fn wrote_anything(&self) -> bool {
		self.packages_written + self.verdicts_written > 0
	}
}

pub struct ReviewSession {
	factory: Box<dyn PairFactory>,
	store: Arc<dyn DuplicatesStore>,
	sorted: bool,
}

impl ReviewSession {
	pub fn new(factory: Box<dyn PairFactory>, store: Arc<dyn DuplicatesStore>) -> Self {
		Self {
			factory,
			store,
			sorted: false,
		}
	}

	/// Session over the store's pair table, in the mode `config` asks for
	pub fn from_config(
		store: Arc<dyn DuplicatesStore>,
		search_context: PotentialDuplicatesSearchContext,
		config: &ReviewConfig,
	) -> Self {
		let factory = DbPairFactory::from_config(store.clone(), search_context, config);
		Self::new(Box::new(factory), store)
	}

	pub fn factory(&self) -> &dyn PairFactory {
		self.factory.as_ref()
	}

	pub fn media_result_pairs(&self) -> DupResult<&MediaResultPairs> {
		self.factory.media_result_pairs()
	}

	pub fn work_status(&self) -> String {
		self.factory.get_work_status()
	}

	pub fn notify_idle_state(&mut self, idle: bool) {
		self.factory.notify_idle_state(idle);
	}

	/// Drop the current batch and restart the search cursor
	pub fn fetch_more(&mut self) {
		self.factory.notify_fetch_more_pairs();
		self.sorted = false;
	}

	fn finish_search(&mut self) -> DupResult<StepOutcome> {
		let pairs = self.factory.media_result_pairs()?.len();
		if pairs == 0 {
			return Ok(StepOutcome::Exhausted);
		}
		if !self.sorted {
			self.factory.sort_and_ab_pairs();
			self.sorted = true;
			info!("Session: batch of {} pairs ready", pairs);
		}
		Ok(StepOutcome::Ready { pairs })
	}

	/// Perform at most one initialisation or search call.
	pub fn step(&mut self) -> DupResult<StepOutcome> {
		if self.factory.initialisation_work_needed() {
			self.factory.notify_initialisation_work_started();
			let result = self.factory.do_initialisation_work();
			self.factory.notify_initialisation_work_finished();
			result?;
			self.sorted = false;
			let has_candidates = self.factory.initialisation_work_looks_good()?;
			debug!("Session: initialised, candidates: {}", has_candidates);
			return Ok(StepOutcome::Initialised { has_candidates });
		}

		if !self.factory.initialisation_work_looks_good()? {
			return Ok(StepOutcome::Exhausted);
		}
		if self.factory.search_work_is_done()? {
			return self.finish_search();
		}

		self.factory.do_search_work()?;
		if self.factory.search_work_is_done()? {
			return self.finish_search();
		}
		Ok(StepOutcome::Searching)
	}

	/// Step until a batch is ready, the pool is exhausted, or `cancel` is set.
	/// The flag is checked between units of work.
	pub fn run_until_ready(&mut self, cancel: &AtomicBool) -> DupResult<StepOutcome> {
		loop {
			if cancel.load(Ordering::Relaxed) {
				debug!("Session: cancelled");
				return Ok(StepOutcome::Cancelled);
			}
			let outcome = self.step()?;
			if outcome.is_terminal() {
				return Ok(outcome);
			}
		}
	}

	/// Write every decision that has work, then invalidate the factory.
	///
	/// If the store fails partway, whatever was already written stays written
	/// and the factory is still told its candidate set is stale.
	pub fn commit(&mut self, decisions: Vec<DuplicatePairDecision>) -> DupResult<CommitSummary> {
		let mut summary = CommitSummary {
			decisions: decisions.len(),
			..CommitSummary::default()
		};
		let result = self.write_decisions(&decisions, &mut summary);

		if summary.wrote_anything() {
			self.factory.notify_commit_done();
		} else {
			self.factory.notify_fetch_more_pairs();
		}
		self.sorted = false;

		match result {
			Ok(()) => {
				info!(
					"Session: committed {} decisions ({} packages, {} verdicts, {} skipped)",
					summary.decisions,
					summary.packages_written,
					summary.verdicts_written,
					summary.skipped
				);
				Ok(summary)
			}
			Err(e) => {
				warn!("Session: commit failed after {} packages: {}", summary.packages_written, e);
				Err(e)
			}
		}
	}

	fn write_decisions(
		&self,
		decisions: &[DuplicatePairDecision],
		summary: &mut CommitSummary,
	) -> DupResult<()> {
		for decision in decisions {
			if !decision.has_work_to_do() {
				summary.skipped += 1;
				continue;
			}
			if let DuplicatePairDecision::ApproveDeny {
				pair,
				rule,
				approved,
			} = decision
			{
				self.store
					.write_auto_resolution_verdict(rule, &pair.a.hash, &pair.b.hash, *approved)?;
				summary.verdicts_written += 1;
				continue;
			}
			for package in decision.content_update_packages() {
				self.store.write_content_updates(package)?;
				summary.packages_written += 1;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::FactoryMode;
	use crate::decision::{AutoResolutionRuleRef, DuplicateType};
	use crate::factory::AutoResolutionReviewPairFactory;
	use crate::media::{MediaId, MediaResult};
	use crate::store::MemoryStore;

	fn store() -> Arc<MemoryStore> {
		let store = MemoryStore::new();
		for id in 1..=5 {
			store
				.insert_media(MediaResult::new(MediaId(id), format!("h{id}"), "image/png", id * 10))
				.unwrap();
		}
		for (a, b, d) in [(1, 2, 2), (2, 3, 5), (4, 5, 1)] {
			store.add_potential_pair(MediaId(a), MediaId(b), d).unwrap();
		}
		Arc::new(store)
	}

	fn config(mode: FactoryMode) -> ReviewConfig {
		let mut config = ReviewConfig::default();
		config.factory.mode = mode;
		config.factory.seed = Some(17);
		config
	}

	#[test_log::test]
	fn test_session_runs_until_exhausted() {
		let store = store();
		let mut session = ReviewSession::from_config(
			store.clone(),
			PotentialDuplicatesSearchContext::default(),
			&config(FactoryMode::Group),
		);
		let cancel = AtomicBool::new(false);
		let mut batches = 0;

		loop {
			match session.run_until_ready(&cancel).unwrap() {
				StepOutcome::Ready { pairs } => {
					assert_eq!(pairs, session.media_result_pairs().unwrap().len());
					let decisions = session
						.media_result_pairs()
						.unwrap()
						.iter()
						.cloned()
						.map(|pair| {
							DuplicatePairDecision::duplicates_action(pair, DuplicateType::SameQuality, None, false)
						})
						.collect();
					let summary = session.commit(decisions).unwrap();
					assert!(summary.wrote_anything());
					assert!(session.factory().initialisation_work_needed());
					batches += 1;
				}
				StepOutcome::Exhausted => break,
				other => panic!("unexpected outcome {other:?}"),
			}
			assert!(batches <= 2);
		}

		assert_eq!(batches, 2);
		assert_eq!(store.potential_pair_count().unwrap(), 0);
	}

	#[test_log::test]
	fn test_skip_only_commit_fetches_more() {
		let mut session = ReviewSession::from_config(
			store(),
			PotentialDuplicatesSearchContext::default(),
			&config(FactoryMode::Mixed),
		);
		let cancel = AtomicBool::new(false);
		assert!(matches!(
			session.run_until_ready(&cancel).unwrap(),
			StepOutcome::Ready { pairs: 3 }
		));

		let decisions = session
			.media_result_pairs()
			.unwrap()
			.iter()
			.cloned()
			.map(DuplicatePairDecision::skip_manual)
			.collect();
		let summary = session.commit(decisions).unwrap();
		assert_eq!(summary.skipped, 3);
		assert!(!summary.wrote_anything());
		// the candidate set is kept, only the cursor restarts
		assert!(!session.factory().initialisation_work_needed());
		assert!(matches!(
			session.run_until_ready(&cancel).unwrap(),
			StepOutcome::Ready { pairs: 3 }
		));
	}

	#[test_log::test]
	fn test_cancel_stops_between_steps() {
		let mut session = ReviewSession::from_config(
			store(),
			PotentialDuplicatesSearchContext::default(),
			&config(FactoryMode::Group),
		);
		let cancel = AtomicBool::new(true);
		assert_eq!(session.run_until_ready(&cancel).unwrap(), StepOutcome::Cancelled);
		assert!(session.factory().initialisation_work_needed());
		assert!(session.media_result_pairs().is_err());
	}

	#[test_log::test]
	fn test_step_reports_initialisation_then_ready() {
		let mut session = ReviewSession::from_config(
			store(),
			PotentialDuplicatesSearchContext::default(),
			&config(FactoryMode::Mixed),
		);
		assert_eq!(
			session.step().unwrap(),
			StepOutcome::Initialised {
				has_candidates: true
			}
		);
		let mut outcome = session.step().unwrap();
		while outcome == StepOutcome::Searching {
			outcome = session.step().unwrap();
		}
		assert_eq!(outcome, StepOutcome::Ready { pairs: 3 });
		// stepping a ready session does no further work
		assert_eq!(session.step().unwrap(), StepOutcome::Ready { pairs: 3 });
		assert_eq!(session.work_status(), "found 3 pairs");
	}

	#[test_log::test]
	fn test_auto_review_verdicts() {
		let store = store();
		let pairs: MediaResultPairs = [(1, 2), (4, 5)]
			.into_iter()
			.map(|(a, b)| {
				crate::media_pairs::MediaResultPair::new(
					store.media(MediaId(a)).unwrap().unwrap(),
					store.media(MediaId(b)).unwrap().unwrap(),
					0,
				)
			})
			.collect();
		let rule = AutoResolutionRuleRef::new(8, "keep larger");
		let factory = AutoResolutionReviewPairFactory::new(rule.clone(), pairs);
		let mut session = ReviewSession::new(Box::new(factory), store.clone());
		let cancel = AtomicBool::new(false);

		assert_eq!(
			session.run_until_ready(&cancel).unwrap(),
			StepOutcome::Ready { pairs: 2 }
		);
		let first = session.media_result_pairs().unwrap().as_slice()[0].clone();
		assert_eq!(first.a.media_id, MediaId(1));

		let decisions: Vec<_> = session
			.media_result_pairs()
			.unwrap()
			.iter()
			.cloned()
			.enumerate()
			.map(|(i, pair)| DuplicatePairDecision::approve_deny(pair, rule.clone(), i == 0))
			.collect();
		let summary = session.commit(decisions).unwrap();
		assert_eq!(summary.verdicts_written, 2);
		assert_eq!(session.run_until_ready(&cancel).unwrap(), StepOutcome::Exhausted);

		let verdicts = store.verdicts().unwrap();
		assert_eq!(verdicts.len(), 2);
		assert!(verdicts[0].approved && !verdicts[1].approved);
	}
}
