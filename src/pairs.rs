//! Blockable collection of candidate id pairs

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, trace};

use crate::graph::PairGraph;
use crate::media::MediaId;
use crate::throttle::Autothrottle;

/// An unordered candidate pair plus its similarity distance (lower is closer).
///
/// Always stored with `smaller < larger` so `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdPairAndDistance {
	pub smaller: MediaId,
	pub larger: MediaId,
	pub distance: u32,
}

impl IdPairAndDistance {
	pub fn new(a: MediaId, b: MediaId, distance: u32) -> Self {
		let (smaller, larger) = if a <= b { (a, b) } else { (b, a) };
		Self {
			smaller,
			larger,
			distance,
		}
	}

	pub fn key(&self) -> (MediaId, MediaId) {
		(self.smaller, self.larger)
	}

	pub fn involves(&self, media_id: MediaId) -> bool {
		self.smaller == media_id || self.larger == media_id
	}
}

/// Ordered candidate rows consumed one autothrottled block at a time.
#[derive(Debug, Clone, Default)]
pub struct PotentialIdPairs {
	rows: VecDeque<IdPairAndDistance>,
	throttle: Autothrottle,
	graph: OnceLock<PairGraph>,
}

impl PotentialIdPairs {
	/// Builds a collection, keeping the first occurrence of every pair and
	/// dropping self-pairs.
	pub fn new<I>(rows: I, throttle: Autothrottle) -> Self
	where
		I: IntoIterator<Item = IdPairAndDistance>,
	{
		let mut seen = HashSet::new();
		let mut kept = VecDeque::new();
		for row in rows {
			if row.smaller == row.larger {
				trace!("Pairs: dropping self-pair on {}", row.smaller);
				continue;
			}
			if seen.insert(row.key()) {
				kept.push_back(row);
			}
		}
		Self {
			rows: kept,
			throttle,
			graph: OnceLock::new(),
		}
	}

	pub fn from_rows<I>(rows: I) -> Self
	where
		I: IntoIterator<Item = IdPairAndDistance>,
	{
		Self::new(rows, Autothrottle::default())
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &IdPairAndDistance> {
		self.rows.iter()
	}

	pub fn block_size(&self) -> usize {
		self.throttle.block_size()
	}

	pub fn throttle(&self) -> &Autothrottle {
		&self.throttle
	}

	/// Replace the block-size state, keeping what an earlier cursor learned
	pub fn with_throttle(mut self, throttle: Autothrottle) -> Self {
		self.throttle = throttle;
		self
	}

	/// Independent copy of the rows and throttle state
	pub fn duplicate(&self) -> Self {
		Self {
			rows: self.rows.clone(),
			throttle: self.throttle.clone(),
			graph: OnceLock::new(),
		}
	}

	/// Remove and return the next block from the front
	pub fn pop_block(&mut self) -> PotentialIdPairs {
		let take = self.throttle.block_size().min(self.rows.len());
		let block: VecDeque<_> = self.rows.drain(..take).collect();
		self.graph = OnceLock::new();
		trace!("Pairs: popped block of {} ({} left)", block.len(), self.rows.len());
		Self {
			rows: block,
			throttle: self.throttle.clone(),
			graph: OnceLock::new(),
		}
	}

	/// Shuffle the order of blocks at the current block size. Rows keep their
	/// order within a block.
	pub fn randomise_blocks<R: Rng + ?Sized>(&mut self, rng: &mut R) {
		let block_size = self.throttle.block_size().max(1);
		let rows: Vec<_> = self.rows.drain(..).collect();
		let mut blocks: Vec<&[IdPairAndDistance]> = rows.chunks(block_size).collect();
		blocks.shuffle(rng);
		self.rows = blocks.into_iter().flatten().copied().collect();
		self.graph = OnceLock::new();
		debug!(
			"Pairs: randomised {} rows in blocks of {}",
			self.rows.len(),
			block_size
		);
	}

	pub fn notify_work_time_for_autothrottle(&mut self, actual: Duration, target: Duration) {
		self.throttle.notify_work_time(actual, target);
	}

	pub fn media_ids(&self) -> BTreeSet<MediaId> {
		self.rows
			.iter()
			.flat_map(|row| [row.smaller, row.larger])
			.collect()
	}

	pub fn graph(&self) -> &PairGraph {
		self.graph.get_or_init(|| PairGraph::build(self.rows.iter()))
	}

	/// Rows whose two ends both belong to `media_ids`
	pub fn filter_by_media_ids(&self, media_ids: &BTreeSet<MediaId>) -> PotentialIdPairs {
		let rows = self
			.rows
			.iter()
			.filter(|row| media_ids.contains(&row.smaller) && media_ids.contains(&row.larger))
			.copied();
		Self::new(rows, self.throttle.clone())
	}

	/// Rows of the connected component that contains any of `seed`.
	///
	/// Connectivity is taken from this collection's own rows only.
	pub fn filter_wider_potential_group<I>(&self, seed: I) -> PotentialIdPairs
	where
		I: IntoIterator<Item = MediaId>,
	{
		let component = self.graph().component(seed);
		self.filter_by_media_ids(&component)
	}
}

impl FromIterator<IdPairAndDistance> for PotentialIdPairs {
	fn from_iter<T: IntoIterator<Item = IdPairAndDistance>>(iter: T) -> Self {
		Self::from_rows(iter)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn pair(a: u64, b: u64, distance: u32) -> IdPairAndDistance {
		IdPairAndDistance::new(MediaId(a), MediaId(b), distance)
	}

	fn numbered(count: u64) -> PotentialIdPairs {
		PotentialIdPairs::new(
			(0..count).map(|i| pair(i * 2, i * 2 + 1, 0)),
			Autothrottle::new(4, 1, 64),
		)
	}

	#[test_log::test]
	fn test_pairs_are_normalised_and_deduplicated() {
		let pairs = PotentialIdPairs::from_rows([pair(2, 1, 3), pair(1, 2, 9), pair(5, 5, 0), pair(3, 1, 0)]);
		assert_eq!(pairs.len(), 2);
		let first = pairs.iter().next().unwrap();
		assert_eq!((first.smaller, first.larger, first.distance), (MediaId(1), MediaId(2), 3));
	}

	#[test_log::test]
	fn test_pop_block_loses_nothing() {
		let mut pairs = numbered(10);
		let original = pairs.duplicate();

		let block = pairs.pop_block();
		assert_eq!(block.len(), 4);
		assert_eq!(original.len(), block.len() + pairs.len());

		let mut seen: Vec<_> = block.iter().chain(pairs.iter()).copied().collect();
		seen.sort();
		let mut expected: Vec<_> = original.iter().copied().collect();
		expected.sort();
		assert_eq!(seen, expected);

		pairs.pop_block();
		let last = pairs.pop_block();
		assert_eq!(last.len(), 2);
		assert!(pairs.is_empty());
		assert!(pairs.pop_block().is_empty());
	}

	#[test_log::test]
	fn test_randomise_blocks_keeps_rows_within_block() {
		let mut pairs = numbered(12);
		let mut rng = StdRng::seed_from_u64(7);
		pairs.randomise_blocks(&mut rng);
		assert_eq!(pairs.len(), 12);

		// every popped block is one of the original blocks, in order
		while !pairs.is_empty() {
			let block: Vec<_> = pairs.pop_block().iter().map(|row| row.smaller.0).collect();
			assert_eq!(block.len(), 4);
			assert_eq!(block[0] % 8, 0);
			for window in block.windows(2) {
				assert_eq!(window[1], window[0] + 2);
			}
		}
	}

	#[test_log::test]
	fn test_filter_wider_potential_group_is_connected_and_idempotent() {
		let pairs = PotentialIdPairs::from_rows([
			pair(1, 2, 2),
			pair(2, 3, 5),
			pair(4, 5, 1),
			pair(3, 6, 0),
		]);

		let group = pairs.filter_wider_potential_group([MediaId(1), MediaId(2)]);
		assert_eq!(group.len(), 3);
		assert_eq!(
			group.media_ids(),
			BTreeSet::from([MediaId(1), MediaId(2), MediaId(3), MediaId(6)])
		);

		let again = pairs.filter_wider_potential_group([MediaId(1), MediaId(2)]);
		assert_eq!(again.media_ids(), group.media_ids());

		let other = pairs.filter_wider_potential_group([MediaId(5)]);
		assert_eq!(other.media_ids(), BTreeSet::from([MediaId(4), MediaId(5)]));
	}

	#[test_log::test]
	fn test_duplicate_is_independent() {
		let mut pairs = numbered(5);
		let copy = pairs.duplicate();
		pairs.pop_block();
		pairs.notify_work_time_for_autothrottle(Duration::ZERO, Duration::from_millis(100));
		assert_eq!(copy.len(), 5);
		assert_eq!(copy.block_size(), 4);
		assert_eq!(pairs.block_size(), 8);
	}
}
