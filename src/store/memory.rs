//! In-memory backing store
//!
//! Holds media records, the potential-duplicate pair table, duplicate group
//! membership and the auto-resolution verdict log behind one `RwLock`.
//! Every hash a content-update package names is resolved before anything is
//! applied, so a package either lands whole or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace, warn};

use super::DuplicatesStore;
use super::table::PairTable;
use crate::content::{ContentUpdate, ContentUpdatePackage};
use crate::decision::{AutoResolutionRuleRef, DuplicateType};
use crate::error::{StoreError, StoreResult};
use crate::graph::PairGraph;
use crate::location::{LocationContext, PotentialDuplicatesSearchContext};
use crate::media::{MediaId, MediaResult};
use crate::media_pairs::{MediaResultPair, MediaResultPairs};
use crate::pairs::{IdPairAndDistance, PotentialIdPairs};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
	pub rule_id: u64,
	pub rule_name: String,
	pub hash_a: String,
	pub hash_b: String,
	pub approved: bool,
	pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
	media: BTreeMap<MediaId, MediaResult>,
	potential_pairs: PairTable,
	/// Duplicate group membership, member -> king. Kings map to nothing.
	groups: BTreeMap<MediaId, MediaId>,
	verdicts: Vec<VerdictRecord>,
	#[serde(skip)]
	by_hash: HashMap<String, MediaId>,
	/// king -> members, the reverse of `groups`
	#[serde(skip)]
	members: HashMap<MediaId, BTreeSet<MediaId>>,
}

// The hash and member indexes are derived from the other fields
impl PartialEq for StoreData {
	fn eq(&self, other: &Self) -> bool {
		self.media == other.media
			&& self.potential_pairs == other.potential_pairs
			&& self.groups == other.groups
			&& self.verdicts == other.verdicts
	}
}

impl StoreData {
	pub fn media(&self) -> &BTreeMap<MediaId, MediaResult> {
		&self.media
	}

	pub fn potential_pairs(&self) -> &PairTable {
		&self.potential_pairs
	}

	pub fn groups(&self) -> &BTreeMap<MediaId, MediaId> {
		&self.groups
	}

	pub fn verdicts(&self) -> &[VerdictRecord] {
		&self.verdicts
	}

	pub fn king_of(&self, media_id: MediaId) -> MediaId {
		self.groups.get(&media_id).copied().unwrap_or(media_id)
	}

	pub fn group_members(&self, king: MediaId) -> BTreeSet<MediaId> {
		let mut members = self.members.get(&king).cloned().unwrap_or_default();
		members.insert(king);
		members
	}

	/// Rebuild the lookup indexes after deserializing
	fn reindex(&mut self) {
		self.by_hash = self
			.media
			.values()
			.map(|media| (media.hash.clone(), media.media_id))
			.collect();
		self.members.clear();
		for (member, king) in &self.groups {
			self.members.entry(*king).or_default().insert(*member);
		}
	}

	fn insert_media(&mut self, media: MediaResult) {
		let media_id = media.media_id;
		if let Some(old) = self.media.get(&media_id) {
			if old.hash != media.hash && self.by_hash.get(&old.hash) == Some(&media_id) {
				self.by_hash.remove(&old.hash);
			}
		}
		self.by_hash.insert(media.hash.clone(), media_id);
		self.media.insert(media_id, media);
	}

	fn resolve(&self, hash: &str) -> StoreResult<MediaId> {
		self.by_hash
			.get(hash)
			.copied()
			.filter(|media_id| self.media.contains_key(media_id))
			.ok_or_else(|| StoreError::UnknownHash {
				hash: hash.to_string(),
			})
	}

	/// Rows of `block` still in the pair table whose files match `search_context`
	fn matching_rows<'a>(
		&'a self,
		search_context: &PotentialDuplicatesSearchContext,
		block: &PotentialIdPairs,
	) -> Vec<(IdPairAndDistance, &'a MediaResult, &'a MediaResult)> {
		let mut rows = Vec::new();
		for row in block.iter() {
			let Some(distance) = self.potential_pairs.distance(row.smaller, row.larger) else {
				trace!("Store: pair {}-{} no longer potential", row.smaller, row.larger);
				continue;
			};
			let (Some(a), Some(b)) = (self.media.get(&row.smaller), self.media.get(&row.larger)) else {
				warn!("Store: pair {}-{} refers to unknown media", row.smaller, row.larger);
				continue;
			};
			if search_context.matches_pair(a, b, distance) {
				rows.push((IdPairAndDistance::new(row.smaller, row.larger, distance), a, b));
			}
		}
		rows
	}

	fn apply_relationship(&mut self, duplicate_type: DuplicateType, a: MediaId, b: MediaId) {
		let (a, b) = match duplicate_type {
			DuplicateType::Worse => (b, a),
			_ => (a, b),
		};
		let king_a = self.king_of(a);
		let king_b = self.king_of(b);

		if duplicate_type.merges_groups() {
			if king_a == king_b {
				self.potential_pairs.remove(a, b);
				return;
			}
			let absorbed = self.group_members(king_b);
			for member in &absorbed {
				self.groups.insert(*member, king_a);
			}
			self.members.remove(&king_b);
			self.members.entry(king_a).or_default().extend(absorbed.iter().copied());

			// Only rows touching the absorbed group can move or become internal
			let (mut inherited, mut dropped) = (0, 0);
			for member in &absorbed {
				for row in self.potential_pairs.take_pairs_of(*member) {
					let other = if row.smaller == *member { row.larger } else { row.smaller };
					if self.king_of(other) == king_a {
						dropped += 1;
						continue;
					}
					self.potential_pairs
						.insert(IdPairAndDistance::new(king_a, other, row.distance));
					inherited += 1;
				}
			}
			debug!(
				"Store: {} group of {} into {} ({} pairs inherited, {} dropped)",
				duplicate_type, king_b, king_a, inherited, dropped
			);
		} else {
			let group_a = self.group_members(king_a);
			let group_b = self.group_members(king_b);
			let (near, far) = if group_a.len() <= group_b.len() {
				(&group_a, &group_b)
			} else {
				(&group_b, &group_a)
			};
			let mut dropped = 0;
			for member in near {
				let between: Vec<MediaId> = self
					.potential_pairs
					.partners(*member)
					.filter(|partner| far.contains(partner))
					.collect();
				for partner in between {
					if self.potential_pairs.remove(*member, partner).is_some() {
						dropped += 1;
					}
				}
			}
			debug!(
				"Store: {} between {} and {} dropped {} potential pairs",
				duplicate_type, king_a, king_b, dropped
			);
		}
	}

	fn apply_package(&mut self, package: &ContentUpdatePackage) -> StoreResult<()> {
		let mut resolved = Vec::with_capacity(package.len());
		for (service_key, update) in package.iter() {
			let media_ids = update
				.hashes()
				.into_iter()
				.map(|hash| self.resolve(hash))
				.collect::<StoreResult<Vec<_>>>()?;
			resolved.push((service_key, update, media_ids));
		}

		for (service_key, update, media_ids) in resolved {
			match (update, media_ids.as_slice()) {
				(ContentUpdate::SetDuplicateRelationship { duplicate_type, .. }, &[a, b]) => {
					self.apply_relationship(*duplicate_type, a, b);
				}
				(update, media_ids) => {
					for media_id in media_ids {
						if let Some(media) = self.media.get_mut(media_id) {
							update.apply_to(service_key, media);
						}
					}
				}
			}
		}
		Ok(())
	}
}

/// Thread-safe in-memory [`DuplicatesStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
	data: RwLock<StoreData>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_data(mut data: StoreData) -> Self {
		data.reindex();
		Self {
			data: RwLock::new(data),
		}
	}

	fn read(&self, operation: &'static str) -> StoreResult<RwLockReadGuard<'_, StoreData>> {
		self.data.read().map_err(|_| StoreError::Query {
			operation,
			reason: "store lock poisoned".to_string(),
		})
	}

	fn write(&self, operation: &'static str) -> StoreResult<RwLockWriteGuard<'_, StoreData>> {
		self.data.write().map_err(|_| StoreError::Query {
			operation,
			reason: "store lock poisoned".to_string(),
		})
	}

	/// Copy of everything the store holds
	pub fn snapshot(&self) -> StoreResult<StoreData> {
		Ok(self.read("snapshot")?.clone())
	}

	pub fn insert_media(&self, media: MediaResult) -> StoreResult<()> {
		self.write("insert_media")?.insert_media(media);
		Ok(())
	}

	/// Record a potential pair. A pair already present keeps the smaller distance.
	pub fn add_potential_pair(&self, a: MediaId, b: MediaId, distance: u32) -> StoreResult<()> {
		let mut data = self.write("add_potential_pair")?;
		for media_id in [a, b] {
			if !data.media.contains_key(&media_id) {
				return Err(StoreError::UnknownMedia { media_id });
			}
		}
		data.potential_pairs.insert(IdPairAndDistance::new(a, b, distance));
		Ok(())
	}

	pub fn media(&self, media_id: MediaId) -> StoreResult<Option<MediaResult>> {
		Ok(self.read("media")?.media.get(&media_id).cloned())
	}

	pub fn media_by_hash(&self, hash: &str) -> StoreResult<Option<MediaResult>> {
		let data = self.read("media_by_hash")?;
		Ok(data
			.by_hash
			.get(hash)
			.and_then(|media_id| data.media.get(media_id))
			.cloned())
	}

	pub fn file_count(&self) -> StoreResult<usize> {
		Ok(self.read("file_count")?.media.len())
	}

	pub fn potential_pair_count(&self) -> StoreResult<usize> {
		Ok(self.read("potential_pair_count")?.potential_pairs.len())
	}

	/// Number of connected groups in the potential pair table
	pub fn potential_group_count(&self) -> StoreResult<usize> {
		let data = self.read("potential_group_count")?;
		let rows: Vec<IdPairAndDistance> = data.potential_pairs.iter().collect();
		Ok(PairGraph::build(rows.iter()).component_count())
	}

	pub fn king_of(&self, media_id: MediaId) -> StoreResult<MediaId> {
		Ok(self.read("king_of")?.king_of(media_id))
	}

	pub fn verdicts(&self) -> StoreResult<Vec<VerdictRecord>> {
		Ok(self.read("verdicts")?.verdicts.clone())
	}
}

impl DuplicatesStore for MemoryStore {
	fn potential_duplicate_id_pairs_and_distances(
		&self,
		location: &LocationContext,
	) -> StoreResult<PotentialIdPairs> {
		let data = self.read("potential_duplicate_id_pairs_and_distances")?;
		let rows = data.potential_pairs.iter().filter(|row| {
			match (data.media.get(&row.smaller), data.media.get(&row.larger)) {
				(Some(a), Some(b)) => location.includes(a) && location.includes(b),
				_ => false,
			}
		});
		let pairs = PotentialIdPairs::from_rows(rows);
		debug!("Store: {} potential pairs in scope", pairs.len());
		Ok(pairs)
	}

	fn potential_duplicate_id_pairs_and_distances_fragmentary(
		&self,
		search_context: &PotentialDuplicatesSearchContext,
		block: &PotentialIdPairs,
	) -> StoreResult<PotentialIdPairs> {
		let data = self.read("potential_duplicate_id_pairs_and_distances_fragmentary")?;
		let rows = data
			.matching_rows(search_context, block)
			.into_iter()
			.map(|(row, _, _)| row);
		Ok(PotentialIdPairs::from_rows(rows))
	}

	fn potential_duplicate_media_result_pairs_and_distances_fragmentary(
		&self,
		search_context: &PotentialDuplicatesSearchContext,
		block: &PotentialIdPairs,
		no_more_than: Option<usize>,
	) -> StoreResult<MediaResultPairs> {
		let data = self.read("potential_duplicate_media_result_pairs_and_distances_fragmentary")?;
		let limit = no_more_than.unwrap_or(usize::MAX);
		Ok(data
			.matching_rows(search_context, block)
			.into_iter()
			.take(limit)
			.map(|(row, a, b)| MediaResultPair::new(a.clone(), b.clone(), row.distance))
			.collect())
	}

	fn write_content_updates(&self, package: &ContentUpdatePackage) -> StoreResult<()> {
		self.write("write_content_updates")?.apply_package(package)?;
		info!("Store: applied package of {} updates", package.len());
		Ok(())
	}

	fn write_auto_resolution_verdict(
		&self,
		rule: &AutoResolutionRuleRef,
		hash_a: &str,
		hash_b: &str,
		approved: bool,
	) -> StoreResult<()> {
		let mut data = self.write("write_auto_resolution_verdict")?;
		for hash in [hash_a, hash_b] {
			data.resolve(hash)?;
		}
		data.verdicts.push(VerdictRecord {
			rule_id: rule.id,
			rule_name: rule.name.clone(),
			hash_a: hash_a.to_string(),
			hash_b: hash_b.to_string(),
			approved,
			recorded_at: Utc::now(),
		});
		info!(
			"Store: rule '{}' {} for {} / {}",
			rule.name,
			if approved { "approved" } else { "denied" },
			hash_a,
			hash_b
		);
		Ok(())
	}
}
