use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// Default returned when a requested entry does not exist.
const EMPTY_OBJECT: &str = "{}";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid data id")]
    InvalidId,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File-backed key/value store for game save data. One JSON file per
/// id under the data directory; a missing entry loads as `{}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && !id.contains("..")
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidId);
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    pub async fn save(&self, id: &str, content: &str) -> Result<(), StoreError> {
        let path = self.entry_path(id)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, content).await?;
        debug!(id, bytes = content.len(), "saved entry");
        Ok(())
    }

    pub async fn load(&self, id: &str) -> Result<String, StoreError> {
        let path = self.entry_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(id, "entry missing, serving empty object");
                Ok(EMPTY_OBJECT.to_string())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileStore::new(dir.path().join("saves"));
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_dir, store) = store();
        store
            .save("settings", "{\"language\":\"en\"}")
            .await
            .expect("save");
        let loaded = store.load("settings").await.expect("load");
        assert_eq!(loaded, "{\"language\":\"en\"}");
    }

    #[tokio::test]
    async fn missing_entry_loads_as_empty_object() {
        let (_dir, store) = store();
        assert_eq!(store.load("absent").await.expect("load"), "{}");
    }

    #[tokio::test]
    async fn save_overwrites_previous_content() {
        let (_dir, store) = store();
        store.save("slot1", "{\"v\":1}").await.expect("save");
        store.save("slot1", "{\"v\":2}").await.expect("save");
        assert_eq!(store.load("slot1").await.expect("load"), "{\"v\":2}");
    }

    #[tokio::test]
    async fn ids_that_escape_the_data_dir_are_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.save("../oops", "{}").await,
            Err(StoreError::InvalidId)
        ));
        assert!(matches!(
            store.load("a/b").await,
            Err(StoreError::InvalidId)
        ));
        assert!(matches!(store.load("").await, Err(StoreError::InvalidId)));
    }
}
