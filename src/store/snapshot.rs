//! JSON snapshots of the in-memory store

use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::memory::{MemoryStore, StoreData};
use crate::error::StoreResult;

// On Unix-like systems rename replaces the target atomically. Windows needs
// the target removed first.
fn atomic_rename(from: &Path, to: &Path) -> StoreResult<()> {
	#[cfg(windows)]
	{
		if to.exists() {
			fs::remove_file(to)?;
		}
	}
	fs::rename(from, to)?;
	Ok(())
}

fn atomic_write_json(path: &Path, bytes: &[u8]) -> StoreResult<()> {
	let tmp = path.with_extension("json.tmp");
	let mut file = fs::File::create(&tmp)?;
	file.write_all(bytes)?;
	file.flush()?;
	file.sync_all()?;
	drop(file);
	atomic_rename(&tmp, path)
}

impl MemoryStore {
	pub fn load_json(path: impl AsRef<Path>) -> StoreResult<Self> {
		let path = path.as_ref();
		let bytes = fs::read(path)?;
		let data: StoreData = serde_json::from_slice(&bytes)?;
		info!(
			"Store: loaded {} files and {} potential pairs from {}",
			data.media().len(),
			data.potential_pairs().len(),
			path.display()
		);
		Ok(Self::from_data(data))
	}

	/// Write the store to `path`, replacing any previous snapshot only once
	/// the new one is fully on disk.
	pub fn save_json(&self, path: impl AsRef<Path>) -> StoreResult<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		let data = self.snapshot()?;
		let bytes = serde_json::to_vec_pretty(&data)?;
		atomic_write_json(path, &bytes)?;
		info!("Store: saved snapshot to {}", path.display());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::StoreError;
	use crate::media::{MediaId, MediaResult, ServiceKey};
	use tempfile::TempDir;

	#[test_log::test]
	fn test_snapshot_round_trip() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("nested").join("store.json");

		let store = MemoryStore::new();
		store
			.insert_media(
				MediaResult::new(MediaId(1), "aa", "image/png", 10)
					.with_tags(ServiceKey::local_tags(), ["cat"]),
			)
			.unwrap();
		store
			.insert_media(MediaResult::new(MediaId(2), "bb", "image/png", 12))
			.unwrap();
		store.add_potential_pair(MediaId(2), MediaId(1), 3).unwrap();
		store.save_json(&path).unwrap();

		assert!(path.exists());
		assert!(!path.with_extension("json.tmp").exists());

		let loaded = MemoryStore::load_json(&path).unwrap();
		assert_eq!(loaded.snapshot().unwrap(), store.snapshot().unwrap());
	}

	#[test_log::test]
	fn test_load_normalises_pair_rows() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("store.json");

		let store = MemoryStore::new();
		for (id, hash) in [(1, "aa"), (2, "bb"), (3, "cc")] {
			store
				.insert_media(MediaResult::new(MediaId(id), hash, "image/png", 10))
				.unwrap();
		}
		store.add_potential_pair(MediaId(1), MediaId(2), 3).unwrap();
		store.save_json(&path).unwrap();

		// hand-edited rows: reversed, repeated and a self-pair
		let mut json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
		json["potential_pairs"] = serde_json::json!([
			{ "smaller": 3, "larger": 2, "distance": 5 },
			{ "smaller": 2, "larger": 3, "distance": 1 },
			{ "smaller": 2, "larger": 1, "distance": 3 },
			{ "smaller": 1, "larger": 1, "distance": 0 }
		]);
		fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

		let loaded = MemoryStore::load_json(&path).unwrap();
		let rows: Vec<(u64, u64, u32)> = loaded
			.snapshot()
			.unwrap()
			.potential_pairs()
			.iter()
			.map(|row| (row.smaller.0, row.larger.0, row.distance))
			.collect();
		assert_eq!(rows, vec![(1, 2, 3), (2, 3, 1)]);
		assert_eq!(
			loaded.media_by_hash("cc").unwrap().map(|media| media.media_id),
			Some(MediaId(3))
		);
	}

	#[test_log::test]
	fn test_load_errors() {
		let temp_dir = TempDir::new().unwrap();
		let missing = MemoryStore::load_json(temp_dir.path().join("missing.json"));
		assert!(matches!(missing, Err(StoreError::Io(_))));

		let garbage = temp_dir.path().join("garbage.json");
		fs::write(&garbage, b"{ not json").unwrap();
		assert!(matches!(MemoryStore::load_json(&garbage), Err(StoreError::Json(_))));
	}
}
