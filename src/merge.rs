//! Content merge options: how metadata flows between the two files of a pair
//!
//! A is always the kept file. One-way actions copy from B into A. Every
//! action only emits the difference between the two records, so applying the
//! output and running the merge again produces no metadata updates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::content::{ContentUpdate, ContentUpdatePackage};
use crate::decision::DuplicateType;
use crate::media::{MediaResult, ServiceKey};

/// Tag and rating sync between the two files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
	/// B's values are added to A
	Copy,
	/// B's values are added to A and removed from B
	Move,
	/// Each file gets what only the other has
	TwoWay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSyncAction {
	#[default]
	Ignore,
	Copy,
	TwoWay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSyncAction {
	#[default]
	Ignore,
	Copy,
	TwoWay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveSyncAction {
	#[default]
	Ignore,
	/// Archive both if either is archived
	IfEitherArchived,
	Always,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateContentMergeOptions {
	pub tag_service_actions: BTreeMap<ServiceKey, SyncAction>,
	pub rating_service_actions: BTreeMap<ServiceKey, SyncAction>,
	pub sync_notes_action: NoteSyncAction,
	pub sync_urls_action: UrlSyncAction,
	pub sync_archive_action: ArchiveSyncAction,
}

fn missing_tags(from: &MediaResult, into: &MediaResult, service_key: &ServiceKey) -> BTreeSet<String> {
	let Some(from_tags) = from.tags_for(service_key) else {
		return BTreeSet::new();
	};
	match into.tags_for(service_key) {
		Some(into_tags) => from_tags.difference(into_tags).cloned().collect(),
		None => from_tags.clone(),
	}
}

fn missing_notes<'a>(from: &'a MediaResult, into: &MediaResult) -> Vec<(&'a String, &'a String)> {
	from.notes
		.iter()
		.filter(|(name, _)| !into.notes.contains_key(*name))
		.collect()
}

impl DuplicateContentMergeOptions {
	/// Options that only ever produce deletions
	pub fn none() -> Self {
		Self::default()
	}

	pub fn defaults_for(duplicate_type: DuplicateType) -> Self {
		match duplicate_type {
			DuplicateType::Better | DuplicateType::Worse => Self {
				tag_service_actions: BTreeMap::from([(ServiceKey::local_tags(), SyncAction::Move)]),
				rating_service_actions: BTreeMap::from([(ServiceKey::local_ratings(), SyncAction::Copy)]),
				sync_notes_action: NoteSyncAction::Copy,
				sync_urls_action: UrlSyncAction::Copy,
				sync_archive_action: ArchiveSyncAction::IfEitherArchived,
			},
			DuplicateType::SameQuality => Self {
				tag_service_actions: BTreeMap::from([(ServiceKey::local_tags(), SyncAction::TwoWay)]),
				rating_service_actions: BTreeMap::from([(ServiceKey::local_ratings(), SyncAction::TwoWay)]),
				sync_notes_action: NoteSyncAction::TwoWay,
				sync_urls_action: UrlSyncAction::TwoWay,
				sync_archive_action: ArchiveSyncAction::IfEitherArchived,
			},
			DuplicateType::Alternate | DuplicateType::FalsePositive => Self::none(),
		}
	}

	/// Metadata updates for the pair, then a separate deletion package if
	/// either file is to be deleted.
	pub fn process_pair_into_content_update_packages(
		&self,
		a: &MediaResult,
		b: &MediaResult,
		delete_a: bool,
		delete_b: bool,
		reason: Option<&str>,
	) -> Vec<ContentUpdatePackage> {
		let mut packages = Vec::new();

		let metadata = self.metadata_package(a, b);
		if !metadata.is_empty() {
			packages.push(metadata);
		}

		let mut deletion = ContentUpdatePackage::new();
		for (media, delete) in [(a, delete_a), (b, delete_b)] {
			if !delete {
				continue;
			}
			for service_key in &media.locations {
				deletion.add(
					service_key.clone(),
					ContentUpdate::DeleteFiles {
						hashes: vec![media.hash.clone()],
						reason: reason.map(str::to_string),
					},
				);
			}
		}
		if !deletion.is_empty() {
			packages.push(deletion);
		}

		packages
	}

	fn metadata_package(&self, a: &MediaResult, b: &MediaResult) -> ContentUpdatePackage {
		let mut package = ContentUpdatePackage::new();

		for (service_key, action) in &self.tag_service_actions {
			let b_to_a = missing_tags(b, a, service_key);
			if !b_to_a.is_empty() {
				package.add(
					service_key.clone(),
					ContentUpdate::AddTags {
						hashes: vec![a.hash.clone()],
						tags: b_to_a,
					},
				);
			}
			match action {
				SyncAction::Copy => {}
				SyncAction::Move => {
					if let Some(b_tags) = b.tags_for(service_key).filter(|tags| !tags.is_empty()) {
						package.add(
							service_key.clone(),
							ContentUpdate::DeleteTags {
								hashes: vec![b.hash.clone()],
								tags: b_tags.clone(),
							},
						);
					}
				}
				SyncAction::TwoWay => {
					let a_to_b = missing_tags(a, b, service_key);
					if !a_to_b.is_empty() {
						package.add(
							service_key.clone(),
							ContentUpdate::AddTags {
								hashes: vec![b.hash.clone()],
								tags: a_to_b,
							},
						);
					}
				}
			}
		}

		for (service_key, action) in &self.rating_service_actions {
			let a_rating = a.ratings.get(service_key).copied();
			let b_rating = b.ratings.get(service_key).copied();
			match (a_rating, b_rating, action) {
				// both rated is a conflict and left alone
				(None, Some(rating), _) => {
					package.add(
						service_key.clone(),
						ContentUpdate::SetRating {
							hashes: vec![a.hash.clone()],
							rating: Some(rating),
						},
					);
					if *action == SyncAction::Move {
						package.add(
							service_key.clone(),
							ContentUpdate::SetRating {
								hashes: vec![b.hash.clone()],
								rating: None,
							},
						);
					}
				}
				(Some(rating), None, SyncAction::TwoWay) => {
					package.add(
						service_key.clone(),
						ContentUpdate::SetRating {
							hashes: vec![b.hash.clone()],
							rating: Some(rating),
						},
					);
				}
				_ => {}
			}
		}

		let note_directions: Vec<(&MediaResult, &MediaResult)> = match self.sync_notes_action {
			NoteSyncAction::Ignore => Vec::new(),
			NoteSyncAction::Copy => vec![(b, a)],
			NoteSyncAction::TwoWay => vec![(b, a), (a, b)],
		};
		for (from, into) in note_directions {
			for (name, text) in missing_notes(from, into) {
				package.add(
					ServiceKey::notes(),
					ContentUpdate::SetNote {
						hash: into.hash.clone(),
						name: name.clone(),
						text: text.clone(),
					},
				);
			}
		}

		let url_directions: Vec<(&MediaResult, &MediaResult)> = match self.sync_urls_action {
			UrlSyncAction::Ignore => Vec::new(),
			UrlSyncAction::Copy => vec![(b, a)],
			UrlSyncAction::TwoWay => vec![(b, a), (a, b)],
		};
		for (from, into) in url_directions {
			let urls: BTreeSet<String> = from.urls.difference(&into.urls).cloned().collect();
			if !urls.is_empty() {
				package.add(
					ServiceKey::my_files(),
					ContentUpdate::AddUrls {
						hashes: vec![into.hash.clone()],
						urls,
					},
				);
			}
		}

		let to_archive: Vec<String> = match self.sync_archive_action {
			ArchiveSyncAction::Ignore => Vec::new(),
			ArchiveSyncAction::IfEitherArchived if !(a.archived || b.archived) => Vec::new(),
			ArchiveSyncAction::IfEitherArchived | ArchiveSyncAction::Always => [a, b]
				.into_iter()
				.filter(|media| !media.archived)
				.map(|media| media.hash.clone())
				.collect(),
		};
		if !to_archive.is_empty() {
			package.add(ServiceKey::my_files(), ContentUpdate::Archive { hashes: to_archive });
		}

		package
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::media::MediaId;

	fn records() -> (MediaResult, MediaResult) {
		let mut a = MediaResult::new(MediaId(1), "aa", "image/png", 2_000)
			.with_tags(ServiceKey::local_tags(), ["cat", "blue"]);
		a.notes.insert("source".to_string(), "scan".to_string());
		a.urls.insert("https://a.example/1".to_string());

		let mut b = MediaResult::new(MediaId(2), "bb", "image/jpeg", 900)
			.with_tags(ServiceKey::local_tags(), ["cat", "kitten"]);
		b.ratings.insert(ServiceKey::local_ratings(), 0.75);
		b.notes.insert("source".to_string(), "different scan".to_string());
		b.notes.insert("translation".to_string(), "meow".to_string());
		b.urls.insert("https://b.example/2".to_string());
		b.archived = true;
		(a, b)
	}

	fn apply(packages: &[ContentUpdatePackage], a: &mut MediaResult, b: &mut MediaResult) {
		for package in packages {
			package.apply_to(a);
			package.apply_to(b);
		}
	}

	#[test_log::test]
	fn test_better_merge_moves_into_a() {
		let (mut a, mut b) = records();
		let options = DuplicateContentMergeOptions::defaults_for(DuplicateType::Better);
		let packages = options.process_pair_into_content_update_packages(&a, &b, false, false, None);
		assert_eq!(packages.len(), 1);
		apply(&packages, &mut a, &mut b);

		assert_eq!(
			a.tags_for(&ServiceKey::local_tags()).unwrap(),
			&BTreeSet::from(["blue".to_string(), "cat".to_string(), "kitten".to_string()])
		);
		assert!(b.tags_for(&ServiceKey::local_tags()).is_none());
		assert_eq!(a.ratings.get(&ServiceKey::local_ratings()), Some(&0.75));
		// conflicting note is left as it is
		assert_eq!(a.notes["source"], "scan");
		assert_eq!(a.notes["translation"], "meow");
		assert!(a.urls.contains("https://b.example/2"));
		assert!(a.archived);
	}

	#[test_log::test]
	fn test_merge_is_idempotent() {
		for duplicate_type in [DuplicateType::Better, DuplicateType::SameQuality] {
			let (mut a, mut b) = records();
			let options = DuplicateContentMergeOptions::defaults_for(duplicate_type);

			let packages = options.process_pair_into_content_update_packages(&a, &b, false, false, None);
			assert!(!packages.is_empty());
			apply(&packages, &mut a, &mut b);

			let again = options.process_pair_into_content_update_packages(&a, &b, false, false, None);
			assert!(again.is_empty(), "{duplicate_type} produced {again:?}");
		}
	}

	#[test_log::test]
	fn test_two_way_shares_both_directions() {
		let (mut a, mut b) = records();
		let options = DuplicateContentMergeOptions::defaults_for(DuplicateType::SameQuality);
		let packages = options.process_pair_into_content_update_packages(&a, &b, false, false, None);
		apply(&packages, &mut a, &mut b);

		assert_eq!(a.tags_for(&ServiceKey::local_tags()), b.tags_for(&ServiceKey::local_tags()));
		assert_eq!(a.ratings, b.ratings);
		assert_eq!(a.urls, b.urls);
		assert_eq!(b.notes["source"], "different scan");
	}

	#[test_log::test]
	fn test_deletion_package_is_last() {
		let (a, b) = records();
		let options = DuplicateContentMergeOptions::defaults_for(DuplicateType::Better);
		let packages = options.process_pair_into_content_update_packages(&a, &b, false, true, Some("worse"));
		assert_eq!(packages.len(), 2);

		let deletion = packages.last().unwrap();
		assert_eq!(
			deletion.updates_for(&ServiceKey::my_files()),
			&[ContentUpdate::DeleteFiles {
				hashes: vec!["bb".to_string()],
				reason: Some("worse".to_string()),
			}]
		);
	}

	#[test_log::test]
	fn test_alternate_does_nothing() {
		let (a, b) = records();
		let options = DuplicateContentMergeOptions::defaults_for(DuplicateType::Alternate);
		assert!(options
			.process_pair_into_content_update_packages(&a, &b, false, false, None)
			.is_empty());
	}
}
