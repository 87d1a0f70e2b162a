//! Factory backed by the store's potential-duplicate pair table

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::PairFactory;
use crate::config::{FactoryMode, ReviewConfig, ThrottleConfig};
use crate::error::{DupError, DupResult};
use crate::location::PotentialDuplicatesSearchContext;
use crate::media::MediaId;
use crate::media_pairs::{MediaResultPairs, PairSortConfig};
use crate::pairs::PotentialIdPairs;
use crate::store::DuplicatesStore;
use crate::throttle::Autothrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
	/// Find one connected group and serve all of its pairs together
	Group,
	/// Serve a flat stream of up to `no_more_than` pairs
	Mixed { no_more_than: usize },
}

impl SearchMode {
	pub fn from_config(config: &ReviewConfig) -> Self {
		match config.factory.mode {
			FactoryMode::Group => SearchMode::Group,
			FactoryMode::Mixed => SearchMode::Mixed {
				no_more_than: config.factory.no_more_than,
			},
		}
	}
}

pub struct DbPairFactory {
	store: Arc<dyn DuplicatesStore>,
	search_context: PotentialDuplicatesSearchContext,
	mode: SearchMode,
	throttle_config: ThrottleConfig,
	sort: PairSortConfig,
	rng: StdRng,
	/// Full candidate set; `None` until fetched and again after a commit
	initial: Option<PotentialIdPairs>,
	still_to_search: PotentialIdPairs,
	group: Option<BTreeSet<MediaId>>,
	results: MediaResultPairs,
	initialisation_started: bool,
	idle: bool,
}

impl DbPairFactory {
	pub fn new(
		store: Arc<dyn DuplicatesStore>,
		search_context: PotentialDuplicatesSearchContext,
		mode: SearchMode,
		config: &ReviewConfig,
	) -> Self {
		let rng = match config.factory.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		let throttle = Autothrottle::from_config(&config.throttle);
		Self {
			store,
			search_context,
			mode,
			throttle_config: config.throttle.clone(),
			sort: config.factory.sort,
			rng,
			initial: None,
			still_to_search: PotentialIdPairs::default().with_throttle(throttle),
			group: None,
			results: MediaResultPairs::default(),
			initialisation_started: false,
			idle: false,
		}
	}

	/// Mode taken from the `[factory]` section
	pub fn from_config(
		store: Arc<dyn DuplicatesStore>,
		search_context: PotentialDuplicatesSearchContext,
		config: &ReviewConfig,
	) -> Self {
		Self::new(store, search_context, SearchMode::from_config(config), config)
	}

	pub fn mode(&self) -> SearchMode {
		self.mode
	}

	/// Ids of the group currently being served, if any
	pub fn current_group(&self) -> Option<&BTreeSet<MediaId>> {
		self.group.as_ref()
	}

	pub fn block_size(&self) -> usize {
		self.still_to_search.block_size()
	}

	fn target_work_time(&self) -> Duration {
		self.throttle_config.target_work_time(self.idle)
	}

	fn initial(&self, operation: &'static str) -> DupResult<&PotentialIdPairs> {
		self.initial.as_ref().ok_or_else(|| {
			DupError::invalid_state(operation, "candidate pairs have not been fetched")
		})
	}

	fn is_done(&self) -> bool {
		match self.mode {
			SearchMode::Group => {
				!self.results.is_empty() || (self.still_to_search.is_empty() && self.group.is_none())
			}
			SearchMode::Mixed { no_more_than } => {
				self.results.len() >= no_more_than || self.still_to_search.is_empty()
			}
		}
	}

	fn reset_cursor(&mut self) {
		let throttle = self.still_to_search.throttle().clone();
		self.still_to_search = match &self.initial {
			Some(initial) => initial.duplicate().with_throttle(throttle),
			None => PotentialIdPairs::default().with_throttle(throttle),
		};
		self.still_to_search.randomise_blocks(&mut self.rng);
		self.group = None;
		self.results.clear();
	}

	fn mixed_search_step(&mut self, no_more_than: usize) -> DupResult<bool> {
		let block = self.still_to_search.pop_block();
		if block.is_empty() {
			return Ok(false);
		}
		let remaining = no_more_than.saturating_sub(self.results.len());

		let started = Instant::now();
		let found = self
			.store
			.potential_duplicate_media_result_pairs_and_distances_fragmentary(
				&self.search_context,
				&block,
				Some(remaining),
			)?;
		let elapsed = started.elapsed();
		let target = self.target_work_time();
		self.still_to_search
			.notify_work_time_for_autothrottle(elapsed, target);

		debug!(
			"Factory: hydrated {} of {} pairs in {:?}",
			found.len(),
			block.len(),
			elapsed
		);
		self.results.extend(found);
		// the store honours the cap, this only guards a misbehaving adapter
		self.results.truncate(no_more_than);

		if self.is_done() {
			info!("Factory: found {} pairs", self.results.len());
		}
		Ok(!self.is_done())
	}

	fn group_search_step(&mut self) -> DupResult<bool> {
		if let Some(group) = &self.group {
			let group_rows = self.initial("do_search_work")?.filter_by_media_ids(group);
			let found = self
				.store
				.potential_duplicate_media_result_pairs_and_distances_fragmentary(
					&self.search_context,
					&group_rows,
					None,
				)?;
			if found.is_empty() {
				debug!(
					"Factory: group of {} files has no live pairs left",
					group.len()
				);
				self.group = None;
				return Ok(!self.is_done());
			}
			info!(
				"Factory: found {} pairs in group of {} files",
				found.len(),
				group.len()
			);
			self.results = found;
			return Ok(false);
		}

		let block = self.still_to_search.pop_block();
		if block.is_empty() {
			return Ok(false);
		}

		let started = Instant::now();
		let probed = self
			.store
			.potential_duplicate_id_pairs_and_distances_fragmentary(&self.search_context, &block)?;
		let elapsed = started.elapsed();
		let target = self.target_work_time();
		self.still_to_search
			.notify_work_time_for_autothrottle(elapsed, target);
		trace!(
			"Factory: probed block of {}, {} alive, took {:?}",
			block.len(),
			probed.len(),
			elapsed
		);

		let alive: Vec<_> = probed.iter().copied().collect();
		let Some(seed) = alive.choose(&mut self.rng).copied() else {
			return Ok(!self.still_to_search.is_empty());
		};

		let initial = self.initial("do_search_work")?;
		let group = initial
			.filter_wider_potential_group([seed.smaller, seed.larger])
			.media_ids();
		info!(
			"Factory: selected group of {} files around {}-{}",
			group.len(),
			seed.smaller,
			seed.larger
		);
		self.group = Some(group);
		Ok(true)
	}
}

impl PairFactory for DbPairFactory {
	fn do_initialisation_work(&mut self) -> DupResult<bool> {
		if self.initial.is_some() {
			return Err(DupError::invalid_state(
				"do_initialisation_work",
				"candidate pairs are already loaded",
			));
		}

		let started = Instant::now();
		let pairs = self
			.store
			.potential_duplicate_id_pairs_and_distances(&self.search_context.location)?;
		info!(
			"Factory: initialised with {} candidate pairs in {:?}",
			pairs.len(),
			started.elapsed()
		);

		self.initial = Some(pairs);
		self.reset_cursor();
		Ok(true)
	}

	fn initialisation_work_needed(&self) -> bool {
		self.initial.is_none()
	}

	fn initialisation_work_started(&self) -> bool {
		self.initialisation_started
	}

	fn notify_initialisation_work_started(&mut self) {
		self.initialisation_started = true;
	}

	fn notify_initialisation_work_finished(&mut self) {
		self.initialisation_started = false;
	}

	fn initialisation_work_looks_good(&self) -> DupResult<bool> {
		Ok(!self.initial("initialisation_work_looks_good")?.is_empty())
	}

	fn do_search_work(&mut self) -> DupResult<bool> {
		self.initial("do_search_work")?;
		if self.is_done() {
			return Ok(false);
		}
		match self.mode {
			SearchMode::Group => self.group_search_step(),
			SearchMode::Mixed { no_more_than } => self.mixed_search_step(no_more_than),
		}
	}

	fn search_work_is_done(&self) -> DupResult<bool> {
		self.initial("search_work_is_done")?;
		Ok(self.is_done())
	}

	fn media_result_pairs(&self) -> DupResult<&MediaResultPairs> {
		self.initial("media_result_pairs")?;
		Ok(&self.results)
	}

	fn sort_and_ab_pairs(&mut self) {
		self.results.sort(&self.sort, &mut self.rng);
		self.results.ab_pairs();
	}

	fn notify_fetch_more_pairs(&mut self) {
		debug!("Factory: fetching more pairs");
		self.reset_cursor();
	}

	fn notify_commit_done(&mut self) {
		debug!("Factory: commit done, dropping candidate set");
		self.initial = None;
		self.initialisation_started = false;
		self.reset_cursor();
	}

	fn notify_idle_state(&mut self, idle: bool) {
		self.idle = idle;
	}

	fn get_work_status(&self) -> String {
		let Some(initial) = &self.initial else {
			return "initialising".to_string();
		};
		if !self.results.is_empty() {
			return format!("found {} pairs", self.results.len());
		}
		if self.still_to_search.is_empty() && self.group.is_none() {
			return "no pairs left to search".to_string();
		}
		let total = initial.len();
		let searched = total - self.still_to_search.len();
		let mut status = format!("searching: {searched} of {total} pairs probed");
		if let Some(group) = &self.group {
			status.push_str(&format!(", group of {} files", group.len()));
		}
		status
	}
}
