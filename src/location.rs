//! Location and search contexts that scope which files a duplicate search sees

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::media::{MediaResult, ServiceKey};

/// Which file domains are in scope.
///
/// A file is included if it currently lives in any of the `current`
/// domains, or was deleted from any of the `deleted` domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationContext {
	#[serde(default)]
	pub current: BTreeSet<ServiceKey>,
	#[serde(default)]
	pub deleted: BTreeSet<ServiceKey>,
}

impl Default for LocationContext {
	fn default() -> Self {
		Self::current_domain(ServiceKey::my_files())
	}
}

impl LocationContext {
	pub fn current_domain(service_key: ServiceKey) -> Self {
		Self {
			current: BTreeSet::from([service_key]),
			deleted: BTreeSet::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.current.is_empty() && self.deleted.is_empty()
	}

	pub fn includes(&self, media: &MediaResult) -> bool {
		media.locations.iter().any(|key| self.current.contains(key))
			|| media.deleted_from.iter().any(|key| self.deleted.contains(key))
	}
}

/// A simple file predicate: required/excluded tags, mime whitelist and inbox state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFilter {
	pub required_tags: BTreeSet<String>,
	pub excluded_tags: BTreeSet<String>,
	/// Empty means every mime
	pub mimes: BTreeSet<String>,
	pub archived: Option<bool>,
}

impl FileFilter {
	pub fn any() -> Self {
		Self::default()
	}

	pub fn matches(&self, media: &MediaResult) -> bool {
		if !self.mimes.is_empty() && !self.mimes.contains(&media.mime) {
			return false;
		}
		if let Some(archived) = self.archived {
			if media.archived != archived {
				return false;
			}
		}
		if self.required_tags.is_empty() && self.excluded_tags.is_empty() {
			return true;
		}
		let tags = media.all_tags();
		self.required_tags.iter().all(|t| tags.contains(t.as_str()))
			&& !self.excluded_tags.iter().any(|t| tags.contains(t.as_str()))
	}
}

/// How the two file filters are applied to the files of a pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DupeSearchType {
	/// At least one file matches the first filter
	#[default]
	OneFileMatchesOne,
	/// Both files match the first filter
	BothFilesMatchOne,
	/// One file matches the first filter and the other the second
	BothFilesMatchDifferent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelDupesPreference {
	Require,
	#[default]
	Allow,
	Exclude,
}

/// Everything a fragmentary store query needs to decide whether a candidate
/// pair is still worth showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotentialDuplicatesSearchContext {
	pub location: LocationContext,
	pub filter_1: FileFilter,
	pub filter_2: FileFilter,
	pub search_type: DupeSearchType,
	pub pixel_dupes: PixelDupesPreference,
	/// Pairs further apart than this are ignored
	pub max_distance: u32,
}

impl Default for PotentialDuplicatesSearchContext {
	fn default() -> Self {
		Self {
			location: LocationContext::default(),
			filter_1: FileFilter::any(),
			filter_2: FileFilter::any(),
			search_type: DupeSearchType::default(),
			pixel_dupes: PixelDupesPreference::default(),
			max_distance: 8,
		}
	}
}

impl PotentialDuplicatesSearchContext {
	pub fn new(location: LocationContext) -> Self {
		Self {
			location,
			..Self::default()
		}
	}

	pub fn matches_pair(&self, a: &MediaResult, b: &MediaResult, distance: u32) -> bool {
		if distance > self.max_distance {
			return false;
		}
		if !self.location.includes(a) || !self.location.includes(b) {
			return false;
		}
		let pixel_dupes = a.is_pixel_duplicate_of(b);
		match self.pixel_dupes {
			PixelDupesPreference::Require if !pixel_dupes => return false,
			PixelDupesPreference::Exclude if pixel_dupes => return false,
			_ => {}
		}
		match self.search_type {
			DupeSearchType::OneFileMatchesOne => self.filter_1.matches(a) || self.filter_1.matches(b),
			DupeSearchType::BothFilesMatchOne => self.filter_1.matches(a) && self.filter_1.matches(b),
			DupeSearchType::BothFilesMatchDifferent => {
				(self.filter_1.matches(a) && self.filter_2.matches(b))
					|| (self.filter_1.matches(b) && self.filter_2.matches(a))
			}
		}
	}
}
