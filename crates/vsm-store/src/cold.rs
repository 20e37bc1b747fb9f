//! Cold tier: on-disk storage, crash-safe via write-to-temp-then-rename
//! (spec §6.3: "atomic rename or equivalent"). Key ordering on disk is
//! unspecified, so a single-file sorted index is an adequate encoding.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

const INDEX_FILE: &str = "data.json";

pub struct ColdTier {
    dir: PathBuf,
    // In-memory mirror of what's on disk; cold-tier reads/writes are
    // infrequent enough that a full-file rewrite per mutation is fine for
    // this core, and keeps the "atomic rename" story simple.
    cache: BTreeMap<String, Vec<u8>>,
}

impl ColdTier {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|cause| StoreError::ColdIo {
            key: dir.display().to_string(),
            cause,
        })?;

        let index_path = dir.join(INDEX_FILE);
        let cache = if index_path.exists() {
            let bytes = fs::read(&index_path).map_err(|cause| StoreError::ColdIo {
                key: index_path.display().to_string(),
                cause,
            })?;
            serde_json::from_slice(&bytes).unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        Ok(Self { dir, cache })
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.cache.insert(key.to_string(), value);
        self.flush()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).cloned()
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.cache.remove(key);
        self.flush()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn flush(&self) -> Result<()> {
        let index_path = self.dir.join(INDEX_FILE);
        let tmp_path = tmp_path_for(&index_path);

        let bytes = serde_json::to_vec(&self.cache).map_err(|cause| StoreError::ColdIo {
            key: index_path.display().to_string(),
            cause: std::io::Error::new(std::io::ErrorKind::Other, cause),
        })?;

        fs::write(&tmp_path, bytes).map_err(|cause| StoreError::ColdIo {
            key: tmp_path.display().to_string(),
            cause,
        })?;

        fs::rename(&tmp_path, &index_path).map_err(|cause| StoreError::ColdIo {
            key: index_path.display().to_string(),
            cause,
        })
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("json.tmp");
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trips_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cold = ColdTier::open(dir.path()).unwrap();
            cold.put("k1", b"v1".to_vec()).unwrap();
            assert_eq!(cold.get("k1"), Some(b"v1".to_vec()));
        }

        let mut reopened = ColdTier::open(dir.path()).unwrap();
        assert_eq!(reopened.get("k1"), Some(b"v1".to_vec()));

        reopened.delete("k1").unwrap();
        assert_eq!(reopened.get("k1"), None);

        let reopened_again = ColdTier::open(dir.path()).unwrap();
        assert_eq!(reopened_again.get("k1"), None);
    }
}
