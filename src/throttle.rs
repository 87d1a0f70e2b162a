//! Block-size autothrottle
//!
//! Each search step pops one block of candidate pairs and hands it to the
//! backing store. The autothrottle watches how long those calls take and
//! resizes future blocks so one step lands near a target wall-clock budget.

use std::time::Duration;
use tracing::debug;

use crate::config::ThrottleConfig;

/// Fraction of the target inside which no adjustment is made
const DEADBAND: f64 = 0.1;

const MIN_SHRINK: f64 = 0.25;
const MAX_SHRINK: f64 = 0.9;
const MIN_GROW: f64 = 1.1;
const MAX_GROW: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Autothrottle {
	block_size: usize,
	min_block_size: usize,
	max_block_size: usize,
}

impl Default for Autothrottle {
	fn default() -> Self {
		Self::from_config(&ThrottleConfig::default())
	}
}

impl Autothrottle {
	pub fn new(initial: usize, min_block_size: usize, max_block_size: usize) -> Self {
		let min_block_size = min_block_size.max(1);
		let max_block_size = max_block_size.max(min_block_size);
		Self {
			block_size: initial.clamp(min_block_size, max_block_size),
			min_block_size,
			max_block_size,
		}
	}

	pub fn from_config(config: &ThrottleConfig) -> Self {
		Self::new(
			config.initial_block_size,
			config.min_block_size,
			config.max_block_size,
		)
	}

	pub fn block_size(&self) -> usize {
		self.block_size
	}

	/// Feed back how long the last block took against the budget it had.
	///
	/// Slower than target shrinks the block and faster grows it, each by a
	/// bounded factor, so the size never moves the wrong way for a consistent signal.
	pub fn notify_work_time(&mut self, actual: Duration, target: Duration) {
		let target_secs = target.as_secs_f64();
		if target_secs <= 0.0 {
			return;
		}
		let actual_secs = actual.as_secs_f64();
		let previous = self.block_size;

		if actual_secs > target_secs * (1.0 + DEADBAND) {
			let factor = (target_secs / actual_secs).clamp(MIN_SHRINK, MAX_SHRINK);
			let shrunk = (previous as f64 * factor).floor() as usize;
			self.block_size = shrunk.max(self.min_block_size);
		} else if actual_secs < target_secs * (1.0 - DEADBAND) {
			let factor = if actual_secs <= 0.0 {
				MAX_GROW
			} else {
				(target_secs / actual_secs).clamp(MIN_GROW, MAX_GROW)
			};
			let grown = (previous as f64 * factor).ceil() as usize;
			self.block_size = grown.min(self.max_block_size);
		}

		if self.block_size != previous {
			debug!(
				"Throttle: block size {} -> {} (took {:?}, target {:?})",
				previous, self.block_size, actual, target
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn test_slow_work_never_grows_block() {
		let mut throttle = Autothrottle::new(1024, 16, 65_536);
		let mut last = throttle.block_size();
		for ms in [150, 400, 5_000, 111, 200, 120] {
			throttle.notify_work_time(Duration::from_millis(ms), Duration::from_millis(100));
			assert!(throttle.block_size() <= last);
			last = throttle.block_size();
		}
		assert!(last < 1024);
		assert!(last >= 16);
	}

	#[test_log::test]
	fn test_fast_work_never_shrinks_block() {
		let mut throttle = Autothrottle::new(64, 16, 4_096);
		let mut last = throttle.block_size();
		for ms in [0, 10, 50, 89, 1, 0, 0, 0, 0, 0, 0] {
			throttle.notify_work_time(Duration::from_millis(ms), Duration::from_millis(100));
			assert!(throttle.block_size() >= last);
			last = throttle.block_size();
		}
		assert_eq!(last, 4_096);
	}

	#[test_log::test]
	fn test_deadband_holds_steady() {
		let mut throttle = Autothrottle::new(500, 16, 4_096);
		throttle.notify_work_time(Duration::from_millis(95), Duration::from_millis(100));
		throttle.notify_work_time(Duration::from_millis(108), Duration::from_millis(100));
		assert_eq!(throttle.block_size(), 500);
	}

	#[test_log::test]
	fn test_bounds_are_respected() {
		let mut throttle = Autothrottle::new(20, 16, 32);
		throttle.notify_work_time(Duration::from_secs(10), Duration::from_millis(100));
		assert_eq!(throttle.block_size(), 16);
		throttle.notify_work_time(Duration::ZERO, Duration::from_millis(100));
		throttle.notify_work_time(Duration::ZERO, Duration::from_millis(100));
		assert_eq!(throttle.block_size(), 32);

		// zero target is ignored
		throttle.notify_work_time(Duration::from_secs(1), Duration::ZERO);
		assert_eq!(throttle.block_size(), 32);
	}
}
