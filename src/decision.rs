//! Decisions an operator or automated rule makes about a candidate pair

use serde::{Deserialize, Serialize};

use crate::content::{ContentUpdate, ContentUpdatePackage};
use crate::media::ServiceKey;
use crate::media_pairs::MediaResultPair;
use crate::merge::DuplicateContentMergeOptions;

/// Classification of the relationship between the two files of a pair.
///
/// `Better` means A is better than B. `Worse` is accepted as input but is
/// always normalised to `Better` with the pair swapped before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateType {
	FalsePositive,
	Alternate,
	SameQuality,
	Better,
	Worse,
}

impl DuplicateType {
	/// Whether this relationship merges the two files into one duplicate group
	pub fn merges_groups(self) -> bool {
		matches!(
			self,
			DuplicateType::SameQuality | DuplicateType::Better | DuplicateType::Worse
		)
	}
}

impl std::fmt::Display for DuplicateType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			DuplicateType::FalsePositive => "false positive",
			DuplicateType::Alternate => "alternate",
			DuplicateType::SameQuality => "same quality",
			DuplicateType::Better => "better",
			DuplicateType::Worse => "worse",
		};
		f.write_str(name)
	}
}

/// Reference to the automated resolution rule whose proposal is under review
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutoResolutionRuleRef {
	pub id: u64,
	pub name: String,
}

impl AutoResolutionRuleRef {
	pub fn new(id: u64, name: impl Into<String>) -> Self {
		Self {
			id,
			name: name.into(),
		}
	}
}

/// What to do about one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicatePairDecision {
	/// The operator skipped the pair
	SkipManual { pair: MediaResultPair },
	/// The pair was skipped without operator input
	SkipAuto { pair: MediaResultPair },
	DuplicatesAction {
		pair: MediaResultPair,
		duplicate_type: DuplicateType,
		content_update_packages: Vec<ContentUpdatePackage>,
	},
	Deletion {
		pair: MediaResultPair,
		content_update_packages: Vec<ContentUpdatePackage>,
	},
	/// Operator verdict on a rule-proposed decision
	ApproveDeny {
		pair: MediaResultPair,
		rule: AutoResolutionRuleRef,
		approved: bool,
	},
}

impl DuplicatePairDecision {
	pub fn skip_manual(pair: MediaResultPair) -> Self {
		DuplicatePairDecision::SkipManual { pair }
	}

	pub fn skip_auto(pair: MediaResultPair) -> Self {
		DuplicatePairDecision::SkipAuto { pair }
	}

	/// Classify the pair and derive the content updates the classification implies.
	///
	/// The relationship update comes first, followed by whatever the merge
	/// options produce. Without explicit options the defaults for the
	/// duplicate type are used.
	pub fn duplicates_action(
		pair: MediaResultPair,
		duplicate_type: DuplicateType,
		merge_options: Option<&DuplicateContentMergeOptions>,
		delete_b: bool,
	) -> Self {
		let (pair, duplicate_type) = match duplicate_type {
			DuplicateType::Worse => (pair.swapped(), DuplicateType::Better),
			other => (pair, other),
		};

		let mut content_update_packages = vec![ContentUpdatePackage::single(
			ServiceKey::duplicates(),
			ContentUpdate::SetDuplicateRelationship {
				duplicate_type,
				hash_a: pair.a.hash.clone(),
				hash_b: pair.b.hash.clone(),
			},
		)];

		let defaults;
		let options = match merge_options {
			Some(options) => options,
			None => {
				defaults = DuplicateContentMergeOptions::defaults_for(duplicate_type);
				&defaults
			}
		};
		let reason = delete_b.then(|| format!("deleted as {duplicate_type} duplicate"));
		content_update_packages.extend(options.process_pair_into_content_update_packages(
			&pair.a,
			&pair.b,
			false,
			delete_b,
			reason.as_deref(),
		));

		DuplicatePairDecision::DuplicatesAction {
			pair,
			duplicate_type,
			content_update_packages,
		}
	}

	/// Delete one or both files, merging metadata first if options are given.
	pub fn deletion(
		pair: MediaResultPair,
		delete_a: bool,
		delete_b: bool,
		merge_options: Option<&DuplicateContentMergeOptions>,
		reason: Option<&str>,
	) -> Self {
		let content_update_packages = if delete_a || delete_b {
			merge_options
				.cloned()
				.unwrap_or_default()
				.process_pair_into_content_update_packages(&pair.a, &pair.b, delete_a, delete_b, reason)
		} else {
			Vec::new()
		};
		DuplicatePairDecision::Deletion {
			pair,
			content_update_packages,
		}
	}

	pub fn approve_deny(pair: MediaResultPair, rule: AutoResolutionRuleRef, approved: bool) -> Self {
		DuplicatePairDecision::ApproveDeny {
			pair,
			rule,
			approved,
		}
	}

	pub fn pair(&self) -> &MediaResultPair {
		match self {
			DuplicatePairDecision::SkipManual { pair }
			| DuplicatePairDecision::SkipAuto { pair }
			| DuplicatePairDecision::DuplicatesAction { pair, .. }
			| DuplicatePairDecision::Deletion { pair, .. }
			| DuplicatePairDecision::ApproveDeny { pair, .. } => pair,
		}
	}

	pub fn has_work_to_do(&self) -> bool {
		match self {
			DuplicatePairDecision::SkipManual { .. } | DuplicatePairDecision::SkipAuto { .. } => false,
			DuplicatePairDecision::DuplicatesAction { .. } => true,
			DuplicatePairDecision::Deletion {
				content_update_packages,
				..
			} => !content_update_packages.is_empty(),
			DuplicatePairDecision::ApproveDeny { .. } => true,
		}
	}

	pub fn content_update_packages(&self) -> &[ContentUpdatePackage] {
		match self {
			DuplicatePairDecision::DuplicatesAction {
				content_update_packages,
				..
			}
			| DuplicatePairDecision::Deletion {
				content_update_packages,
				..
			} => content_update_packages,
			_ => &[],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::media::{MediaId, MediaResult};

	fn pair() -> MediaResultPair {
		let a = MediaResult::new(MediaId(1), "aa", "image/png", 2_000)
			.with_tags(ServiceKey::local_tags(), ["cat"]);
		let b = MediaResult::new(MediaId(2), "bb", "image/jpeg", 1_000)
			.with_tags(ServiceKey::local_tags(), ["kitten"]);
		MediaResultPair::new(a, b, 3)
	}

	#[test_log::test]
	fn test_skips_have_no_work() {
		assert!(!DuplicatePairDecision::skip_manual(pair()).has_work_to_do());
		assert!(!DuplicatePairDecision::skip_auto(pair()).has_work_to_do());
		assert!(DuplicatePairDecision::skip_auto(pair())
			.content_update_packages()
			.is_empty());
	}

	#[test_log::test]
	fn test_duplicates_action_relationship_first() {
		let decision =
			DuplicatePairDecision::duplicates_action(pair(), DuplicateType::Better, None, true);
		assert!(decision.has_work_to_do());

		let packages = decision.content_update_packages();
		let first = packages[0].updates_for(&ServiceKey::duplicates());
		assert!(matches!(
			first[0],
			ContentUpdate::SetDuplicateRelationship {
				duplicate_type: DuplicateType::Better,
				..
			}
		));
		let last = packages.last().unwrap();
		assert!(last
			.iter()
			.any(|(_, u)| matches!(u, ContentUpdate::DeleteFiles { hashes, .. } if hashes == &["bb"])));
	}

	#[test_log::test]
	fn test_worse_is_normalised_to_better() {
		let decision = DuplicatePairDecision::duplicates_action(pair(), DuplicateType::Worse, None, false);
		match &decision {
			DuplicatePairDecision::DuplicatesAction {
				pair,
				duplicate_type,
				content_update_packages,
			} => {
				assert_eq!(*duplicate_type, DuplicateType::Better);
				assert_eq!(pair.a.hash, "bb");
				assert_eq!(
					content_update_packages[0].updates_for(&ServiceKey::duplicates())[0],
					ContentUpdate::SetDuplicateRelationship {
						duplicate_type: DuplicateType::Better,
						hash_a: "bb".to_string(),
						hash_b: "aa".to_string(),
					}
				);
			}
			other => panic!("unexpected decision {other:?}"),
		}
	}

	#[test_log::test]
	fn test_deletion_without_targets_has_no_work() {
		let decision = DuplicatePairDecision::deletion(pair(), false, false, None, None);
		assert!(!decision.has_work_to_do());

		let decision = DuplicatePairDecision::deletion(pair(), true, true, None, Some("both junk"));
		assert!(decision.has_work_to_do());
		let hashes = decision.content_update_packages()[0].hashes();
		assert!(hashes.contains("aa") && hashes.contains("bb"));
	}

	#[test_log::test]
	fn test_approve_deny_has_work() {
		let rule = AutoResolutionRuleRef::new(4, "pixel dupes, keep larger");
		let decision = DuplicatePairDecision::approve_deny(pair(), rule, false);
		assert!(decision.has_work_to_do());
		assert!(decision.content_update_packages().is_empty());
		assert_eq!(decision.pair().distance, 3);
	}
}
