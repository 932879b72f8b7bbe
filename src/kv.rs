//! Flat JSON-file key/value store (`<data-path>/kv.json`).

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, instrument};

const DB_FILE: &str = "kv.json";

#[derive(Debug)]
pub struct KvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl KvStore {
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub async fn open(data_path: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_path)
            .await
            .with_context(|| format!("failed to create data path {}", data_path.display()))?;
        Ok(Self {
            path: data_path.join(DB_FILE),
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable stores read as empty.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let _guard = self.lock.lock().await;
        match self.read().await {
            Ok(mut db) => db.remove(key),
            Err(err) => {
                error!("read_db error: {err:#}");
                None
            }
        }
    }

    /// Replace the value under `key`.
    ///
    /// # Errors
    /// Returns an error if the existing file cannot be read or the new one
    /// cannot be written.
    #[instrument(skip(self, value))]
    pub async fn put(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut db = self.read().await?;
        db.insert(key.to_string(), value);
        self.write(&db).await
    }

    /// Shallow-merge objects, replace anything else.
    ///
    /// # Errors
    /// Same as [`KvStore::put`].
    #[instrument(skip(self, value))]
    pub async fn merge(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut db = self.read().await?;
        let merged = match (db.remove(key), value) {
            (Some(Value::Object(mut current)), Value::Object(update)) => {
                current.extend(update);
                Value::Object(current)
            }
            (_, value) => value,
        };
        db.insert(key.to_string(), merged);
        self.write(&db).await
    }

    // Missing file is an empty store; unparsable or non-object content is an error.
    async fn read(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        match serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?
        {
            Value::Object(db) => Ok(db),
            _ => bail!("{} is not a JSON object", self.path.display()),
        }
    }

    async fn write(&self, db: &Map<String, Value>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(db).context("failed to serialize kv store")?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KvStore::open(dir.path()).await?;
        assert_eq!(store.get("tenders").await, None);

        store.put("tenders", json!([1, 2, 3])).await?;
        assert_eq!(store.get("tenders").await, Some(json!([1, 2, 3])));
        assert!(!dir.path().join("kv.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn merge_objects_shallowly() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KvStore::open(dir.path()).await?;
        store.put("cfg", json!({"a": 1, "nested": {"x": 1}})).await?;
        store.merge("cfg", json!({"b": 2, "nested": {"y": 2}})).await?;
        assert_eq!(
            store.get("cfg").await,
            Some(json!({"a": 1, "b": 2, "nested": {"y": 2}}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn merge_replaces_non_objects() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KvStore::open(dir.path()).await?;
        store.put("k", json!("text")).await?;
        store.merge("k", json!({"a": 1})).await?;
        assert_eq!(store.get("k").await, Some(json!({"a": 1})));
        store.merge("k", json!(5)).await?;
        assert_eq!(store.get("k").await, Some(json!(5)));
        store.merge("fresh", json!({"a": 1})).await?;
        assert_eq!(store.get("fresh").await, Some(json!({"a": 1})));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_and_refuses_writes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KvStore::open(dir.path()).await?;
        for body in ["{ not json", "[1, 2]"] {
            std::fs::write(store.path(), body)?;
            assert_eq!(store.get("k").await, None);
            assert!(store.put("k", json!(true)).await.is_err());
            assert!(store.merge("k", json!({"a": 1})).await.is_err());
            assert_eq!(std::fs::read_to_string(store.path())?, body);
        }

        std::fs::remove_file(store.path())?;
        store.put("k", json!(true)).await?;
        assert_eq!(store.get("k").await, Some(json!(true)));
        Ok(())
    }

    #[tokio::test]
    async fn writes_pretty_utf8() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KvStore::open(dir.path()).await?;
        store.put("title", json!("مناقصة")).await?;
        let raw = std::fs::read_to_string(store.path())?;
        assert!(raw.contains("مناقصة"));
        assert!(raw.contains('\n'));
        Ok(())
    }
}
