//! Candidate graph over media ids
//!
//! Built once per full candidate fetch. Group discovery asks it for the
//! connected component around a seed instead of re-scanning the flat pair list.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::media::MediaId;
use crate::pairs::IdPairAndDistance;

#[derive(Debug, Clone, Default)]
pub struct PairGraph {
	adjacency: HashMap<MediaId, Vec<MediaId>>,
}

impl PairGraph {
	pub fn build<'a, I>(rows: I) -> Self
	where
		I: IntoIterator<Item = &'a IdPairAndDistance>,
	{
		let mut adjacency: HashMap<MediaId, Vec<MediaId>> = HashMap::new();
		for row in rows {
			adjacency.entry(row.smaller).or_default().push(row.larger);
			adjacency.entry(row.larger).or_default().push(row.smaller);
		}
		Self { adjacency }
	}

	pub fn node_count(&self) -> usize {
		self.adjacency.len()
	}

	pub fn contains(&self, media_id: MediaId) -> bool {
		self.adjacency.contains_key(&media_id)
	}

	/// Every id reachable from any seed. Seeds absent from the graph are ignored.
	pub fn component<I>(&self, seeds: I) -> BTreeSet<MediaId>
	where
		I: IntoIterator<Item = MediaId>,
	{
		let mut seen = BTreeSet::new();
		let mut queue = VecDeque::new();
		for seed in seeds {
			if self.contains(seed) && seen.insert(seed) {
				queue.push_back(seed);
			}
		}

		while let Some(current) = queue.pop_front() {
			if let Some(neighbours) = self.adjacency.get(&current) {
				for &next in neighbours {
					if seen.insert(next) {
						queue.push_back(next);
					}
				}
			}
		}
		seen
	}

	pub fn component_count(&self) -> usize {
		let mut visited: HashSet<MediaId> = HashSet::with_capacity(self.adjacency.len());
		let mut count = 0;
		for &start in self.adjacency.keys() {
			if visited.contains(&start) {
				continue;
			}
			count += 1;
			visited.extend(self.component([start]));
		}
		count
	}
}
