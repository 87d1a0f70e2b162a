//! Review configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decision::DuplicateType;
use crate::error::{DupError, DupResult};
use crate::media_pairs::PairSortConfig;
use crate::merge::DuplicateContentMergeOptions;

/// How the DB-backed factory selects pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryMode {
	/// Serve one connected group of potential duplicates at a time
	#[default]
	Group,
	/// Serve a capped flat stream of pairs
	Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
	pub mode: FactoryMode,
	/// Mixed mode stops once this many pairs are found
	pub no_more_than: usize,
	/// Fixed seed for block shuffling and group choice; random when unset
	pub seed: Option<u64>,
	pub sort: PairSortConfig,
}

impl Default for FactoryConfig {
	fn default() -> Self {
		Self {
			mode: FactoryMode::Group,
			no_more_than: 50,
			seed: None,
			sort: PairSortConfig::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
	pub initial_block_size: usize,
	pub min_block_size: usize,
	pub max_block_size: usize,
	/// Budget for one search step while the user is active
	pub active_work_ms: u64,
	/// Budget for one search step while the system is idle
	pub idle_work_ms: u64,
}

impl Default for ThrottleConfig {
	fn default() -> Self {
		Self {
			initial_block_size: 4096,
			min_block_size: 16,
			max_block_size: 65_536,
			active_work_ms: 100,
			idle_work_ms: 1000,
		}
	}
}

impl ThrottleConfig {
	pub fn target_work_time(&self, idle: bool) -> Duration {
		if idle {
			Duration::from_millis(self.idle_work_ms)
		} else {
			Duration::from_millis(self.active_work_ms)
		}
	}
}

/// Per-duplicate-type overrides of the default merge options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
	pub better: Option<DuplicateContentMergeOptions>,
	pub same_quality: Option<DuplicateContentMergeOptions>,
	pub alternate: Option<DuplicateContentMergeOptions>,
}

impl MergeConfig {
	pub fn options_for(&self, duplicate_type: DuplicateType) -> DuplicateContentMergeOptions {
		let configured = match duplicate_type {
			DuplicateType::Better | DuplicateType::Worse => self.better.as_ref(),
			DuplicateType::SameQuality => self.same_quality.as_ref(),
			DuplicateType::Alternate => self.alternate.as_ref(),
			DuplicateType::FalsePositive => None,
		};
		configured
			.cloned()
			.unwrap_or_else(|| DuplicateContentMergeOptions::defaults_for(duplicate_type))
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
	pub factory: FactoryConfig,
	pub throttle: ThrottleConfig,
	pub merge: MergeConfig,
}

impl ReviewConfig {
	pub fn from_toml_str(content: &str) -> DupResult<Self> {
		let config: ReviewConfig = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> DupResult<Self> {
		let content = std::fs::read_to_string(path.as_ref())?;
		Self::from_toml_str(&content)
	}

	/// `<config dir>/dupr/config.toml` for the platform
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("dupr").join("config.toml"))
	}

	pub fn validate(&self) -> DupResult<()> {
		let throttle = &self.throttle;
		if throttle.min_block_size == 0 {
			return Err(DupError::Config("min_block_size must be at least 1".to_string()));
		}
		if throttle.min_block_size > throttle.max_block_size {
			return Err(DupError::Config(format!(
				"min_block_size ({}) is larger than max_block_size ({})",
				throttle.min_block_size, throttle.max_block_size
			)));
		}
		if !(throttle.min_block_size..=throttle.max_block_size).contains(&throttle.initial_block_size) {
			return Err(DupError::Config(format!(
				"initial_block_size ({}) must lie between {} and {}",
				throttle.initial_block_size, throttle.min_block_size, throttle.max_block_size
			)));
		}
		if throttle.active_work_ms == 0 || throttle.idle_work_ms == 0 {
			return Err(DupError::Config("work budgets must be non-zero".to_string()));
		}
		if self.factory.no_more_than == 0 {
			return Err(DupError::Config("no_more_than must be at least 1".to_string()));
		}
		Ok(())
	}
}
