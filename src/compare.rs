//! Cheap quality heuristic used to decide which file of a pair is shown first

use std::cmp::Ordering;

use crate::media::MediaResult;

const RESOLUTION_WEIGHT: i32 = 20;
const SIZE_WEIGHT: i32 = 10;
const DURATION_WEIGHT: i32 = 5;
const TAG_WEIGHT: i32 = 3;
const ARCHIVE_WEIGHT: i32 = 2;
const AGE_WEIGHT: i32 = 1;

fn weigh(ordering: Ordering, weight: i32) -> i32 {
	match ordering {
		Ordering::Greater => weight,
		Ordering::Less => -weight,
		Ordering::Equal => 0,
	}
}

/// Positive when `a` is probably the better file, negative when `b` is.
///
/// Every signal compares the two files symmetrically, so
/// `fast_comparison_score(a, b) == -fast_comparison_score(b, a)`.
pub fn fast_comparison_score(a: &MediaResult, b: &MediaResult) -> i32 {
	let mut score = 0;

	if let (Some(a_pixels), Some(b_pixels)) = (a.pixel_count(), b.pixel_count()) {
		score += weigh(a_pixels.cmp(&b_pixels), RESOLUTION_WEIGHT);
	}

	score += weigh(a.size.cmp(&b.size), SIZE_WEIGHT);

	if let (Some(a_duration), Some(b_duration)) = (a.duration_ms, b.duration_ms) {
		score += weigh(a_duration.cmp(&b_duration), DURATION_WEIGHT);
	}

	score += weigh(a.all_tags().len().cmp(&b.all_tags().len()), TAG_WEIGHT);
	score += weigh(a.archived.cmp(&b.archived), ARCHIVE_WEIGHT);

	// older import wins
	score += weigh(b.import_time.cmp(&a.import_time), AGE_WEIGHT);

	score
}
