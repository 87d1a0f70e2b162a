//! Hydrated candidate pairs and their presentation order

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::compare::fast_comparison_score;
use crate::media::{MediaId, MediaResult};
use crate::pairs::IdPairAndDistance;

/// Two hydrated records and their distance. `a` is the file shown first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResultPair {
	pub a: MediaResult,
	pub b: MediaResult,
	pub distance: u32,
}

impl MediaResultPair {
	pub fn new(a: MediaResult, b: MediaResult, distance: u32) -> Self {
		Self { a, b, distance }
	}

	pub fn swapped(self) -> Self {
		Self {
			a: self.b,
			b: self.a,
			distance: self.distance,
		}
	}

	pub fn id_pair(&self) -> IdPairAndDistance {
		IdPairAndDistance::new(self.a.media_id, self.b.media_id, self.distance)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSortType {
	/// By the larger of the two file sizes
	#[default]
	MaxFilesize,
	/// By the smaller of the two file sizes
	MinFilesize,
	/// By distance
	Similarity,
	Random,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSortConfig {
	pub sort_type: PairSortType,
	/// Smallest key first when set
	pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaResultPairs {
	pairs: Vec<MediaResultPair>,
}

impl MediaResultPairs {
	pub fn new(pairs: Vec<MediaResultPair>) -> Self {
		Self { pairs }
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &MediaResultPair> {
		self.pairs.iter()
	}

	pub fn as_slice(&self) -> &[MediaResultPair] {
		&self.pairs
	}

	pub fn push(&mut self, pair: MediaResultPair) {
		self.pairs.push(pair);
	}

	pub fn extend(&mut self, other: MediaResultPairs) {
		self.pairs.extend(other.pairs);
	}

	pub fn truncate(&mut self, len: usize) {
		self.pairs.truncate(len);
	}

	pub fn clear(&mut self) {
		self.pairs.clear();
	}

	pub fn into_vec(self) -> Vec<MediaResultPair> {
		self.pairs
	}

	pub fn media_ids(&self) -> BTreeSet<MediaId> {
		self.pairs
			.iter()
			.flat_map(|pair| [pair.a.media_id, pair.b.media_id])
			.collect()
	}

	/// Stable sort by the configured key. `Random` shuffles instead.
	pub fn sort<R: Rng + ?Sized>(&mut self, config: &PairSortConfig, rng: &mut R) {
		let key: fn(&MediaResultPair) -> u64 = match config.sort_type {
			PairSortType::MaxFilesize => |pair| pair.a.size.max(pair.b.size),
			PairSortType::MinFilesize => |pair| pair.a.size.min(pair.b.size),
			PairSortType::Similarity => |pair| pair.distance as u64,
			PairSortType::Random => {
				self.pairs.shuffle(rng);
				return;
			}
		};
		if config.ascending {
			self.pairs.sort_by_key(key);
		} else {
			self.pairs.sort_by_key(|pair| std::cmp::Reverse(key(pair)));
		}
	}

	/// Put the probably-better file of every pair in the `a` slot
	pub fn ab_pairs(&mut self) {
		for pair in self.pairs.iter_mut() {
			if fast_comparison_score(&pair.b, &pair.a) > 0 {
				std::mem::swap(&mut pair.a, &mut pair.b);
			}
		}
	}
}

impl FromIterator<MediaResultPair> for MediaResultPairs {
	fn from_iter<T: IntoIterator<Item = MediaResultPair>>(iter: T) -> Self {
		Self::new(iter.into_iter().collect())
	}
}

impl IntoIterator for MediaResultPairs {
	type Item = MediaResultPair;
	type IntoIter = std::vec::IntoIter<MediaResultPair>;

	fn into_iter(self) -> Self::IntoIter {
		self.pairs.into_iter()
	}
}
