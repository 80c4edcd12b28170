use crate::{
    catalog::{Language, TaskType},
    storage::KeyValueStore,
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VERSIONS_STORAGE_KEY: &str = "logicleap.script_versions";

/// A saved result together with the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptVersion {
    pub id: String,
    pub prompt: String,
    pub task_type: TaskType,
    pub language: Language,
    pub result: String,
    pub saved_at: DateTime<Utc>,
}

/// Saved versions, most recent first. Every change is written through to
/// the backing store.
pub struct VersionStore {
    store: Arc<dyn KeyValueStore>,
    versions: Vec<ScriptVersion>,
    load_error: Option<AppError>,
}

impl VersionStore {
    /// Load the saved versions. Unreadable or corrupt data leaves the
    /// collection empty and is reported through [`Self::load_error`].
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let (versions, load_error) = match load(store.as_ref()) {
            Ok(versions) => (versions, None),
            Err(error) => {
                tracing::warn!(%error, "failed to load script versions");
                (Vec::new(), Some(error))
            }
        };
        Self {
            store,
            versions,
            load_error,
        }
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&AppError> {
        self.load_error.as_ref()
    }

    #[must_use]
    pub fn list(&self) -> &[ScriptVersion] {
        &self.versions
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ScriptVersion> {
        self.versions.iter().find(|version| version.id == id)
    }

    /// Save a new version in front of the others. An empty or whitespace
    /// result is not saved.
    pub fn save(
        &mut self,
        prompt: &str,
        task_type: TaskType,
        language: Language,
        result: &str,
    ) -> AppResult<Option<ScriptVersion>> {
        if result.trim().is_empty() {
            return Ok(None);
        }

        let version = ScriptVersion {
            id: format!("version-{}", uuid::Uuid::new_v4()),
            prompt: prompt.to_string(),
            task_type,
            language,
            result: result.to_string(),
            saved_at: Utc::now(),
        };

        let mut updated = Vec::with_capacity(self.versions.len() + 1);
        updated.push(version.clone());
        updated.extend(self.versions.iter().cloned());
        self.persist(&updated)?;
        self.versions = updated;

        tracing::debug!(id = %version.id, "script version saved");
        Ok(Some(version))
    }

    /// Remove a version. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> AppResult<bool> {
        let updated: Vec<ScriptVersion> = self
            .versions
            .iter()
            .filter(|version| version.id != id)
            .cloned()
            .collect();
        if updated.len() == self.versions.len() {
            return Ok(false);
        }
        self.persist(&updated)?;
        self.versions = updated;
        Ok(true)
    }

    pub fn clear(&mut self) -> AppResult<()> {
        self.store.remove(VERSIONS_STORAGE_KEY)?;
        self.versions.clear();
        Ok(())
    }

    fn persist(&self, versions: &[ScriptVersion]) -> AppResult<()> {
        let json = serde_json::to_string(versions).map_err(std::io::Error::from)?;
        self.store.set(VERSIONS_STORAGE_KEY, &json)
    }
}

fn load(store: &dyn KeyValueStore) -> AppResult<Vec<ScriptVersion>> {
    let Some(json) = store
        .get(VERSIONS_STORAGE_KEY)
        .map_err(|e| AppError::PersistenceLoad(e.to_string()))?
    else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&json).map_err(|e| AppError::PersistenceLoad(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn versions_serialize_camel_case() {
        let version = ScriptVersion {
            id: "version-1".to_string(),
            prompt: "p".to_string(),
            task_type: TaskType::CodeReview,
            language: Language::Bash,
            result: "r".to_string(),
            saved_at: DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&version).unwrap();
        assert_eq!(json["taskType"], "Code Review");
        assert_eq!(json["language"], "Bash (for WSL)");
        assert_eq!(json["savedAt"], "2025-01-02T03:04:05Z");
    }

    #[test]
    fn missing_key_opens_empty() {
        let versions = VersionStore::open(Arc::new(MemoryStore::new()));
        assert!(versions.list().is_empty());
        assert!(versions.load_error().is_none());
    }
}
