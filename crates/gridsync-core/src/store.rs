// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Session-scoped string storage shared by every grid on a page. Keys must
/// be unique per grid instance.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn clear(&self, key: &str) -> Result<()>;
}

/// In-process store; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One JSON object on disk mapping keys to stored strings. Used where a
/// "session" has to outlive the process, such as the CLI.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read view state file {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).with_context(|| {
            format!(
                "parse view state file {}; delete it to start from defaults",
                self.path.display()
            )
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create view state directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|error| anyhow!("encode view state: {error}"))?;
        fs::write(&self.path, raw)
            .with_context(|| format!("write view state file {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn clear(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonFileStore, KeyValueStore, MemoryStore};
    use anyhow::Result;

    #[test]
    fn memory_store_clones_share_entries() -> Result<()> {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save("orders-filter", "{}")?;
        assert_eq!(other.load("orders-filter")?, Some("{}".to_owned()));

        other.clear("orders-filter")?;
        assert_eq!(store.load("orders-filter")?, None);
        Ok(())
    }

    #[test]
    fn file_store_round_trips_and_clears() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonFileStore::new(temp.path().join("state/view.json"));

        assert_eq!(store.load("orders-column")?, None);
        store.save("orders-column", "[]")?;
        store.save("reports-column", "[1]")?;
        assert_eq!(store.load("orders-column")?, Some("[]".to_owned()));

        store.clear("orders-column")?;
        assert_eq!(store.load("orders-column")?, None);
        assert_eq!(store.load("reports-column")?, Some("[1]".to_owned()));
        Ok(())
    }

    #[test]
    fn file_store_reports_corrupt_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("view.json");
        std::fs::write(&path, "{not json")?;
        let error = JsonFileStore::new(&path)
            .load("orders-filter")
            .expect_err("corrupt file should fail");
        assert!(error.to_string().contains("parse view state file"));
        Ok(())
    }
}
