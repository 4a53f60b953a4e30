use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const POSTED_CACHE_FILE: &str = "posted_cache.json";
pub const HANDLE_CACHE_FILE: &str = "did_cache.json";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cache serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Identifiers of feed items already forwarded.
#[derive(Debug, Clone, Default)]
pub struct PostedCache {
    ids: HashSet<String>,
}

impl PostedCache {
    #[allow(dead_code)] // Used in tests
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already present.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn sorted(&self) -> Vec<&String> {
        let mut ids: Vec<&String> = self.ids.iter().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<String> for PostedCache {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// DID to handle lookups that already succeeded.
#[derive(Debug, Clone, Default)]
pub struct HandleCache {
    handles: HashMap<String, String>,
}

impl HandleCache {
    #[allow(dead_code)] // Used in tests
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, did: &str) -> Option<&str> {
        self.handles.get(did).map(String::as_str)
    }

    pub fn insert(&mut self, did: impl Into<String>, handle: impl Into<String>) {
        self.handles.insert(did.into(), handle.into());
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Both caches live as flat JSON files in one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn posted_path(&self) -> PathBuf {
        self.dir.join(POSTED_CACHE_FILE)
    }

    pub fn handle_path(&self) -> PathBuf {
        self.dir.join(HANDLE_CACHE_FILE)
    }

    /// Creates the cache directory if needed. Missing files load as empty caches;
    /// unreadable or corrupt files are logged and also load as empty.
    pub fn load(&self) -> Result<(PostedCache, HandleCache), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let posted = read_or_default::<Vec<String>>(&self.posted_path())
            .into_iter()
            .collect::<PostedCache>();
        let handles = HandleCache {
            handles: read_or_default::<HashMap<String, String>>(&self.handle_path()),
        };

        debug!(
            posted = posted.len(),
            handles = handles.len(),
            "Loaded caches from {}",
            self.dir.display()
        );
        Ok((posted, handles))
    }

    pub fn save(&self, posted: &PostedCache, handles: &HandleCache) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        write_json(&self.posted_path(), &posted.sorted())?;
        write_json(&self.handle_path(), &handles.handles)?;
        Ok(())
    }
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            return T::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Write to a sibling temp file and rename it over the target.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CacheError> {
    let data = serde_json::to_string(value).map_err(|source| CacheError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, data).map_err(|source| CacheError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_posted_cache_check_and_add() {
        let mut posted = PostedCache::new();
        assert!(!posted.check("at://did:plc:a/app.bsky.feed.post/1"));
        assert!(posted.add("at://did:plc:a/app.bsky.feed.post/1"));
        assert!(!posted.add("at://did:plc:a/app.bsky.feed.post/1"));
        assert!(posted.check("at://did:plc:a/app.bsky.feed.post/1"));
        assert_eq!(posted.len(), 1);
    }

    #[test]
    fn test_load_missing_files_gives_empty_caches() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested"));

        let (posted, handles) = store.load().unwrap();
        assert!(posted.is_empty());
        assert!(handles.is_empty());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut posted = PostedCache::new();
        posted.add("at://did:plc:b/app.bsky.feed.post/2");
        posted.add("at://did:plc:a/app.bsky.feed.post/1");
        let mut handles = HandleCache::new();
        handles.insert("did:plc:a", "alice.bsky.social");

        store.save(&posted, &handles).unwrap();

        let raw = fs::read_to_string(store.posted_path()).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            ids,
            vec![
                "at://did:plc:a/app.bsky.feed.post/1".to_string(),
                "at://did:plc:b/app.bsky.feed.post/2".to_string(),
            ]
        );
        assert!(!store.posted_path().with_extension("json.tmp").exists());

        let (posted, handles) = store.load().unwrap();
        assert_eq!(posted.len(), 2);
        assert!(posted.check("at://did:plc:b/app.bsky.feed.post/2"));
        assert_eq!(handles.get("did:plc:a"), Some("alice.bsky.social"));
    }

    #[test]
    fn test_corrupt_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        fs::write(store.posted_path(), "not json").unwrap();
        fs::write(store.handle_path(), r#"{"did:plc:a": "alice.bsky.social"}"#).unwrap();

        let (posted, handles) = store.load().unwrap();
        assert!(posted.is_empty());
        assert_eq!(handles.len(), 1);
    }
}
