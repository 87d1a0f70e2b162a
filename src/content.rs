//! Content-update packages: the only way decisions mutate the backing store

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::decision::DuplicateType;
use crate::media::{MediaResult, ServiceKey};

/// A single typed update record. Files are addressed by content hash so a
/// package stays meaningful across stores that number files differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentUpdate {
	AddTags {
		hashes: Vec<String>,
		tags: BTreeSet<String>,
	},
	DeleteTags {
		hashes: Vec<String>,
		tags: BTreeSet<String>,
	},
	/// `None` clears the rating
	SetRating {
		hashes: Vec<String>,
		rating: Option<f64>,
	},
	SetNote {
		hash: String,
		name: String,
		text: String,
	},
	AddUrls {
		hashes: Vec<String>,
		urls: BTreeSet<String>,
	},
	Archive {
		hashes: Vec<String>,
	},
	SetDuplicateRelationship {
		duplicate_type: DuplicateType,
		hash_a: String,
		hash_b: String,
	},
	DeleteFiles {
		hashes: Vec<String>,
		reason: Option<String>,
	},
}

impl ContentUpdate {
	/// Hashes of every file this update touches
	pub fn hashes(&self) -> Vec<&str> {
		match self {
			ContentUpdate::AddTags { hashes, .. }
			| ContentUpdate::DeleteTags { hashes, .. }
			| ContentUpdate::SetRating { hashes, .. }
			| ContentUpdate::AddUrls { hashes, .. }
			| ContentUpdate::Archive { hashes }
			| ContentUpdate::DeleteFiles { hashes, .. } => hashes.iter().map(String::as_str).collect(),
			ContentUpdate::SetNote { hash, .. } => vec![hash.as_str()],
			ContentUpdate::SetDuplicateRelationship { hash_a, hash_b, .. } => {
				vec![hash_a.as_str(), hash_b.as_str()]
			}
		}
	}

	/// Apply the per-file part of this update to `media` if it is addressed.
	///
	/// Duplicate relationships are not per-file state and are left to the store.
	/// Returns whether anything was addressed to `media`.
	pub fn apply_to(&self, service_key: &ServiceKey, media: &mut MediaResult) -> bool {
		if !self.hashes().contains(&media.hash.as_str()) {
			return false;
		}
		match self {
			ContentUpdate::AddTags { tags, .. } => {
				media
					.tags
					.entry(service_key.clone())
					.or_default()
					.extend(tags.iter().cloned());
			}
			ContentUpdate::DeleteTags { tags, .. } => {
				if let Some(existing) = media.tags.get_mut(service_key) {
					existing.retain(|tag| !tags.contains(tag));
					if existing.is_empty() {
						media.tags.remove(service_key);
					}
				}
			}
			ContentUpdate::SetRating { rating, .. } => match rating {
				Some(rating) => {
					media.ratings.insert(service_key.clone(), *rating);
				}
				None => {
					media.ratings.remove(service_key);
				}
			},
			ContentUpdate::SetNote { name, text, .. } => {
				media.notes.insert(name.clone(), text.clone());
			}
			ContentUpdate::AddUrls { urls, .. } => {
				media.urls.extend(urls.iter().cloned());
			}
			ContentUpdate::Archive { .. } => {
				media.archived = true;
			}
			ContentUpdate::DeleteFiles { .. } => {
				if media.locations.remove(service_key) {
					media.deleted_from.insert(service_key.clone());
				}
			}
			ContentUpdate::SetDuplicateRelationship { .. } => {}
		}
		true
	}
}

/// Service-key-scoped list of update records, applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentUpdatePackage {
	updates: BTreeMap<ServiceKey, Vec<ContentUpdate>>,
}

impl ContentUpdatePackage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn single(service_key: ServiceKey, update: ContentUpdate) -> Self {
		let mut package = Self::new();
		package.add(service_key, update);
		package
	}

	pub fn add(&mut self, service_key: ServiceKey, update: ContentUpdate) {
		self.updates.entry(service_key).or_default().push(update);
	}

	/// Append every update of `other`, keeping per-service order
	pub fn extend(&mut self, other: ContentUpdatePackage) {
		for (service_key, updates) in other.updates {
			self.updates.entry(service_key).or_default().extend(updates);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.updates.values().all(Vec::is_empty)
	}

	/// Number of update records across all services
	pub fn len(&self) -> usize {
		self.updates.values().map(Vec::len).sum()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &ContentUpdate)> {
		self.updates
			.iter()
			.flat_map(|(key, updates)| updates.iter().map(move |u| (key, u)))
	}

	pub fn updates_for(&self, service_key: &ServiceKey) -> &[ContentUpdate] {
		self.updates
			.get(service_key)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	pub fn hashes(&self) -> BTreeSet<&str> {
		self.iter().flat_map(|(_, update)| update.hashes()).collect()
	}

	/// Apply every update addressed to `media`, in order
	pub fn apply_to(&self, media: &mut MediaResult) -> bool {
		let mut touched = false;
		for (service_key, update) in self.iter() {
			touched |= update.apply_to(service_key, media);
		}
		touched
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn test_package_len_and_hashes() {
		let mut package = ContentUpdatePackage::new();
		assert!(package.is_empty());

		package.add(
			ServiceKey::local_tags(),
			ContentUpdate::AddTags {
				hashes: vec!["aa".to_string()],
				tags: BTreeSet::from(["blue sky".to_string()]),
			},
		);
		package.add(
			ServiceKey::duplicates(),
			ContentUpdate::SetDuplicateRelationship {
				duplicate_type: DuplicateType::Better,
				hash_a: "aa".to_string(),
				hash_b: "bb".to_string(),
			},
		);

		assert!(!package.is_empty());
		assert_eq!(package.len(), 2);
		assert_eq!(package.hashes(), BTreeSet::from(["aa", "bb"]));
		assert_eq!(package.updates_for(&ServiceKey::duplicates()).len(), 1);
		assert!(package.updates_for(&ServiceKey::trash()).is_empty());
	}

	#[test_log::test]
	fn test_extend_keeps_service_order() {
		let mut first = ContentUpdatePackage::single(
			ServiceKey::my_files(),
			ContentUpdate::Archive {
				hashes: vec!["aa".to_string()],
			},
		);
		let second = ContentUpdatePackage::single(
			ServiceKey::my_files(),
			ContentUpdate::DeleteFiles {
				hashes: vec!["bb".to_string()],
				reason: None,
			},
		);
		first.extend(second);

		let updates = first.updates_for(&ServiceKey::my_files());
		assert!(matches!(updates[0], ContentUpdate::Archive { .. }));
		assert!(matches!(updates[1], ContentUpdate::DeleteFiles { .. }));
	}

	#[test_log::test]
	fn test_apply_to_only_touches_addressed_files() {
		use crate::media::MediaId;

		let mut a = MediaResult::new(MediaId(1), "aa", "image/png", 10);
		let mut b = MediaResult::new(MediaId(2), "bb", "image/png", 10);
		let delete = ContentUpdate::DeleteFiles {
			hashes: vec!["aa".to_string()],
			reason: Some("worse duplicate".to_string()),
		};

		assert!(delete.apply_to(&ServiceKey::my_files(), &mut a));
		assert!(!delete.apply_to(&ServiceKey::my_files(), &mut b));
		assert!(a.locations.is_empty());
		assert!(a.deleted_from.contains(&ServiceKey::my_files()));
		assert!(b.locations.contains(&ServiceKey::my_files()));

		let rate = ContentUpdate::SetRating {
			hashes: vec!["bb".to_string()],
			rating: Some(0.8),
		};
		rate.apply_to(&ServiceKey::local_ratings(), &mut b);
		assert_eq!(b.ratings.get(&ServiceKey::local_ratings()), Some(&0.8));
	}

	#[test_log::test]
	fn test_package_serialises_tagged() {
		let package = ContentUpdatePackage::single(
			ServiceKey::my_files(),
			ContentUpdate::Archive {
				hashes: vec!["aa".to_string()],
			},
		);
		let json = serde_json::to_string(&package).unwrap();
		assert!(json.contains("\"kind\":\"archive\""));
		let back: ContentUpdatePackage = serde_json::from_str(&json).unwrap();
		assert_eq!(back, package);
	}
}
