//! Media records under comparison

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stable numeric identity of a file record in the backing store.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl std::fmt::Display for MediaId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifies a service (file domain, tag service, rating service, ...) that
/// content updates are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(pub String);

impl ServiceKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	/// The default local file domain
	pub fn my_files() -> Self {
		Self::new("my_files")
	}

	pub fn trash() -> Self {
		Self::new("trash")
	}

	pub fn local_tags() -> Self {
		Self::new("local_tags")
	}

	pub fn local_ratings() -> Self {
		Self::new("local_ratings")
	}

	/// Duplicate relationships are filed under this key
	pub fn duplicates() -> Self {
		Self::new("duplicates")
	}

	pub fn notes() -> Self {
		Self::new("notes")
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for ServiceKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// A fully hydrated file record.
///
/// The core treats this as an opaque collaborator type: it reads identity,
/// a few cheap quality signals for A/B ordering, and the metadata that
/// content-merge options copy between two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
	pub media_id: MediaId,
	/// Content hash, hex encoded
	pub hash: String,
	pub mime: String,
	/// File size in bytes
	pub size: u64,
	#[serde(default)]
	pub width: Option<u32>,
	#[serde(default)]
	pub height: Option<u32>,
	#[serde(default)]
	pub duration_ms: Option<u64>,
	/// Equal pixel hashes mean the two files decode to identical pixels
	#[serde(default)]
	pub pixel_hash: Option<String>,
	pub import_time: DateTime<Utc>,
	/// File domains the file currently lives in
	#[serde(default)]
	pub locations: BTreeSet<ServiceKey>,
	/// File domains the file has been deleted from
	#[serde(default)]
	pub deleted_from: BTreeSet<ServiceKey>,
	#[serde(default)]
	pub archived: bool,
	#[serde(default)]
	pub tags: BTreeMap<ServiceKey, BTreeSet<String>>,
	/// Ratings normalised to 0.0..=1.0
	#[serde(default)]
	pub ratings: BTreeMap<ServiceKey, f64>,
	#[serde(default)]
	pub notes: BTreeMap<String, String>,
	#[serde(default)]
	pub urls: BTreeSet<String>,
	#[serde(default)]
	pub views: u32,
	#[serde(default)]
	pub viewtime_ms: u64,
}

impl MediaResult {
	/// Minimal record in the local file domain, mostly useful for fixtures.
	pub fn new(media_id: MediaId, hash: impl Into<String>, mime: impl Into<String>, size: u64) -> Self {
		Self {
			media_id,
			hash: hash.into(),
			mime: mime.into(),
			size,
			width: None,
			height: None,
			duration_ms: None,
			pixel_hash: None,
			import_time: Utc::now(),
			locations: BTreeSet::from([ServiceKey::my_files()]),
			deleted_from: BTreeSet::new(),
			archived: false,
			tags: BTreeMap::new(),
			ratings: BTreeMap::new(),
			notes: BTreeMap::new(),
			urls: BTreeSet::new(),
			views: 0,
			viewtime_ms: 0,
		}
	}

	pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
		self.width = Some(width);
		self.height = Some(height);
		self
	}

	pub fn with_tags<I, S>(mut self, service_key: ServiceKey, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags
			.entry(service_key)
			.or_default()
			.extend(tags.into_iter().map(Into::into));
		self
	}

	pub fn pixel_count(&self) -> Option<u64> {
		match (self.width, self.height) {
			(Some(w), Some(h)) => Some(w as u64 * h as u64),
			_ => None,
		}
	}

	/// Tags across every tag service, deduplicated
	pub fn all_tags(&self) -> BTreeSet<&str> {
		self.tags
			.values()
			.flat_map(|tags| tags.iter().map(String::as_str))
			.collect()
	}

	pub fn tags_for(&self, service_key: &ServiceKey) -> Option<&BTreeSet<String>> {
		self.tags.get(service_key)
	}

	pub fn is_pixel_duplicate_of(&self, other: &MediaResult) -> bool {
		matches!((&self.pixel_hash, &other.pixel_hash), (Some(a), Some(b)) if a == b)
	}
}
