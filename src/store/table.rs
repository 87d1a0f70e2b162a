//! Potential-duplicate pair table

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::media::MediaId;
use crate::pairs::IdPairAndDistance;

/// Potential pairs keyed by `(smaller, larger)` with a per-file partner index,
/// so lookups and the pairs touching one file never scan the whole table.
///
/// Serialised as a flat row list. Rows are normalised on the way in: reversed
/// rows are flipped, self-pairs are dropped and repeats keep the smaller
/// distance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<IdPairAndDistance>", into = "Vec<IdPairAndDistance>")]
pub struct PairTable {
	distances: BTreeMap<(MediaId, MediaId), u32>,
	partners: HashMap<MediaId, BTreeSet<MediaId>>,
}

impl PairTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.distances.len()
	}

	pub fn is_empty(&self) -> bool {
		self.distances.is_empty()
	}

	pub fn distance(&self, a: MediaId, b: MediaId) -> Option<u32> {
		self.distances.get(&IdPairAndDistance::new(a, b, 0).key()).copied()
	}

	/// Insert a pair. A pair already present keeps the smaller distance.
	/// Returns whether the pair is new.
	pub fn insert(&mut self, row: IdPairAndDistance) -> bool {
		let row = IdPairAndDistance::new(row.smaller, row.larger, row.distance);
		if row.smaller == row.larger {
			return false;
		}
		match self.distances.entry(row.key()) {
			Entry::Occupied(mut entry) => {
				let distance = entry.get_mut();
				*distance = (*distance).min(row.distance);
				false
			}
			Entry::Vacant(entry) => {
				entry.insert(row.distance);
				self.partners.entry(row.smaller).or_default().insert(row.larger);
				self.partners.entry(row.larger).or_default().insert(row.smaller);
				true
			}
		}
	}

	pub fn remove(&mut self, a: MediaId, b: MediaId) -> Option<IdPairAndDistance> {
		let (smaller, larger) = IdPairAndDistance::new(a, b, 0).key();
		let distance = self.distances.remove(&(smaller, larger))?;
		self.unlink(smaller, larger);
		self.unlink(larger, smaller);
		Some(IdPairAndDistance::new(smaller, larger, distance))
	}

	fn unlink(&mut self, from: MediaId, to: MediaId) {
		if let Some(partners) = self.partners.get_mut(&from) {
			partners.remove(&to);
			if partners.is_empty() {
				self.partners.remove(&from);
			}
		}
	}

	/// Remove and return every pair involving `media_id`
	pub fn take_pairs_of(&mut self, media_id: MediaId) -> Vec<IdPairAndDistance> {
		let partners = self.partners.remove(&media_id).unwrap_or_default();
		let mut rows = Vec::with_capacity(partners.len());
		for partner in partners {
			let key = IdPairAndDistance::new(media_id, partner, 0).key();
			if let Some(distance) = self.distances.remove(&key) {
				self.unlink(partner, media_id);
				rows.push(IdPairAndDistance::new(key.0, key.1, distance));
			}
		}
		rows
	}

	pub fn partners(&self, media_id: MediaId) -> impl Iterator<Item = MediaId> + '_ {
		self.partners.get(&media_id).into_iter().flatten().copied()
	}

	/// Rows in `(smaller, larger)` order
	pub fn iter(&self) -> impl Iterator<Item = IdPairAndDistance> + '_ {
		self.distances
			.iter()
			.map(|(&(smaller, larger), &distance)| IdPairAndDistance {
				smaller,
				larger,
				distance,
			})
	}
}

// The partner index is derived from the distances
impl PartialEq for PairTable {
	fn eq(&self, other: &Self) -> bool {
		self.distances == other.distances
	}
}

impl FromIterator<IdPairAndDistance> for PairTable {
	fn from_iter<I: IntoIterator<Item = IdPairAndDistance>>(iter: I) -> Self {
		let mut table = PairTable::new();
		for row in iter {
			table.insert(row);
		}
		table
	}
}

impl From<Vec<IdPairAndDistance>> for PairTable {
	fn from(rows: Vec<IdPairAndDistance>) -> Self {
		rows.into_iter().collect()
	}
}

impl From<PairTable> for Vec<IdPairAndDistance> {
	fn from(table: PairTable) -> Self {
		table.iter().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(a: u64, b: u64, distance: u32) -> IdPairAndDistance {
		IdPairAndDistance::new(MediaId(a), MediaId(b), distance)
	}

	#[test_log::test]
	fn test_insert_keeps_smaller_distance() {
		let mut table = PairTable::new();
		assert!(table.insert(row(2, 1, 6)));
		assert!(!table.insert(row(1, 2, 3)));
		assert!(!table.insert(row(1, 2, 9)));
		assert!(!table.insert(row(4, 4, 0)));
		assert_eq!(table.len(), 1);
		assert_eq!(table.distance(MediaId(2), MediaId(1)), Some(3));
	}

	#[test_log::test]
	fn test_take_pairs_of_unlinks_partners() {
		let mut table: PairTable = [row(1, 2, 0), row(2, 3, 1), row(3, 4, 2)].into_iter().collect();
		let taken = table.take_pairs_of(MediaId(2));
		assert_eq!(taken, vec![row(1, 2, 0), row(2, 3, 1)]);
		assert_eq!(table.len(), 1);
		assert_eq!(table.partners(MediaId(1)).count(), 0);
		assert_eq!(table.partners(MediaId(3)).collect::<Vec<_>>(), vec![MediaId(4)]);

		assert_eq!(table.remove(MediaId(4), MediaId(3)), Some(row(3, 4, 2)));
		assert!(table.is_empty());
		assert_eq!(table.partners(MediaId(3)).count(), 0);
	}

	#[test_log::test]
	fn test_deserialize_normalises_rows() {
		let json = r#"[
			{ "smaller": 5, "larger": 2, "distance": 7 },
			{ "smaller": 2, "larger": 5, "distance": 4 },
			{ "smaller": 3, "larger": 3, "distance": 0 },
			{ "smaller": 1, "larger": 2, "distance": 1 }
		]"#;
		let table: PairTable = serde_json::from_str(json).unwrap();
		assert_eq!(table.iter().collect::<Vec<_>>(), vec![row(1, 2, 1), row(2, 5, 4)]);
		assert_eq!(table.partners(MediaId(2)).collect::<Vec<_>>(), vec![MediaId(1), MediaId(5)]);

		let back: Vec<IdPairAndDistance> = serde_json::from_str(&serde_json::to_string(&table).unwrap()).unwrap();
		assert_eq!(back, vec![row(1, 2, 1), row(2, 5, 4)]);
	}
}
