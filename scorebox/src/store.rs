use log::{info, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use ulti_common::{portal::roster::RosterCache, snapshot::SessionSnapshot};

/// Key layout of the durable store. Each key is independently readable and
/// removable.
pub mod keys {
    pub const SESSION: &str = "session-snapshot";
    pub const CLOCK_END: &str = "game-clock-end";
    pub const CLOCK_RUNNING: &str = "game-clock-running";
    pub const CLOCK_REMAINING: &str = "game-clock-remaining";
    pub const ROSTER_CACHE: &str = "roster-cache";
    pub const LAST_SAVE: &str = "last-save";
}

/// The durable medium underneath [`KeyValueStore`]. Production uses a
/// file-per-key directory; tests use an in-memory map with a byte quota.
pub trait StorageBackend {
    fn write(&mut self, key: &str, text: &str) -> io::Result<()>;
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
    /// Stored keys with their serialized sizes in bytes.
    fn entries(&self) -> io::Result<Vec<(String, u64)>>;
}

pub struct FsBackend {
    dir: PathBuf,
}

impl FsBackend {
    pub fn new(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FsBackend {
    fn write(&mut self, key: &str, text: &str) -> io::Result<()> {
        fs::write(self.path_for(key), text)
    }

    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn entries(&self) -> io::Result<Vec<(String, u64)>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name();
            let Some(key) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            entries.push((key.to_string(), dir_entry.metadata()?.len()));
        }
        Ok(entries)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreUsage {
    pub total_bytes: u64,
    pub item_count: usize,
    pub last_save: Option<OffsetDateTime>,
}

/// Thin durable key/value persistence with JSON (de)serialization. The only
/// component that touches the backend; a failed write gets one remediation
/// pass (dropping expired roster and stale session data) and one retry.
pub struct KeyValueStore {
    backend: Box<dyn StorageBackend + Send>,
}

impl KeyValueStore {
    pub fn new(backend: Box<dyn StorageBackend + Send>) -> Self {
        Self { backend }
    }

    pub fn open(dir: &Path) -> io::Result<Self> {
        Ok(Self::new(Box::new(FsBackend::new(dir)?)))
    }

    /// Serializes and writes `value`. Reports failure only after the
    /// remediation pass and the retry have both failed.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T, now: OffsetDateTime) -> bool {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not serialize value for key {key}: {e}");
                return false;
            }
        };

        let written = match self.backend.write(key, &text) {
            Ok(()) => true,
            Err(e) => {
                warn!("Write of key {key} failed ({e}), running remediation pass");
                self.remediate(now);
                match self.backend.write(key, &text) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Write of key {key} failed again after remediation: {e}");
                        false
                    }
                }
            }
        };

        if written && key != keys::LAST_SAVE {
            self.note_save(now);
        }
        written
    }

    /// Reads and deserializes the value at `key`. A missing key or corrupt
    /// payload yields `fallback`, never an error.
    pub fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        self.get_opt(key).unwrap_or(fallback)
    }

    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.backend.read(key) {
            Ok(text) => text?,
            Err(e) => {
                warn!("Read of key {key} failed: {e}");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding corrupt value at key {key}: {e}");
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!("Removal of key {key} failed: {e}");
        }
    }

    pub fn usage_info(&self) -> StoreUsage {
        let entries = self.backend.entries().unwrap_or_else(|e| {
            warn!("Could not list store entries: {e}");
            Vec::new()
        });
        StoreUsage {
            total_bytes: entries.iter().map(|(_, size)| size).sum(),
            item_count: entries.len(),
            last_save: self.get_opt(keys::LAST_SAVE),
        }
    }

    pub fn clear_all(&mut self) {
        info!("Clearing all persisted state");
        let entries = self.backend.entries().unwrap_or_default();
        for (key, _) in entries {
            self.remove(&key);
        }
    }

    fn note_save(&mut self, now: OffsetDateTime) {
        let text = match serde_json::to_string(&now) {
            Ok(text) => text,
            Err(_) => return,
        };
        if let Err(e) = self.backend.write(keys::LAST_SAVE, &text) {
            warn!("Could not record save timestamp: {e}");
        }
    }

    /// One-time cleanup before retrying a failed write: expired roster data
    /// and week-old session snapshots are the only values safe to discard.
    fn remediate(&mut self, now: OffsetDateTime) {
        if let Some(cache) = self.get_opt::<RosterCache>(keys::ROSTER_CACHE) {
            if !cache.is_fresh(now) {
                info!("Remediation: discarding expired roster cache");
                self.remove(keys::ROSTER_CACHE);
            }
        }
        if let Some(snapshot) = self.get_opt::<SessionSnapshot>(keys::SESSION) {
            if snapshot.is_stale(now) {
                info!("Remediation: discarding stale session snapshot");
                self.remove(keys::SESSION);
            }
        }
    }
}
