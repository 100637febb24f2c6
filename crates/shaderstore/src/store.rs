use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::{generate_id, is_valid_id, validate_code, NewShader, ShaderRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid shader: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("no shader with id '{0}'")]
    NotFound(String),

    #[error("'{0}' is not a shader id (expected 32 lowercase hex characters)")]
    InvalidId(String),

    #[error("failed to decode shader record {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode shader record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Shader records stored as one JSON file per record.
#[derive(Debug, Clone)]
pub struct ShaderStore {
    root: PathBuf,
}

impl ShaderStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened shader store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self, shader: NewShader) -> Result<ShaderRecord, StoreError> {
        let issues = shader.validate();
        if !issues.is_empty() {
            return Err(StoreError::Validation(issues));
        }

        let now = Utc::now();
        let record = ShaderRecord {
            id: generate_id(),
            title: shader.title,
            description: shader.description,
            code: shader.code,
            is_public: shader.is_public,
            created_at: now,
            updated_at: now,
        };
        self.write(&record)?;
        info!(id = %record.id, title = %record.title, "created shader record");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<ShaderRecord, StoreError> {
        let path = self.record_path(id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Decode { path, source })
    }

    /// All readable records, most recently updated first.
    pub fn list(&self) -> Result<Vec<ShaderRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let Some(id) = record_id_from_path(&path) else {
                continue;
            };
            match self.get(id) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    pub fn update_code(&self, id: &str, code: &str) -> Result<ShaderRecord, StoreError> {
        let issues = validate_code(code);
        if !issues.is_empty() {
            return Err(StoreError::Validation(issues));
        }

        let mut record = self.get(id)?;
        record.code = code.to_string();
        record.updated_at = Utc::now();
        self.write(&record)?;
        debug!(id = %record.id, bytes = code.len(), "updated shader code");
        Ok(record)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(id, "deleted shader record");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    fn write(&self, record: &ShaderRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id)?;
        let staging = path.with_extension("json.tmp");
        let encoded = serde_json::to_string_pretty(record)?;
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

fn record_id_from_path(path: &Path) -> Option<&str> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_id(stem).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ShaderStore) {
        let dir = tempdir().unwrap();
        let store = ShaderStore::open(dir.path().join("shaders")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_get_round_trips() {
        let (_dir, store) = store();
        let created = store
            .create(NewShader::new("Plasma", "void main() {}"))
            .unwrap();
        let loaded = store.get(&created.id).unwrap();
        assert_eq!(loaded, created);
        assert!(!loaded.is_public);
        assert!(store.root().join(format!("{}.json", created.id)).exists());
    }

    #[test]
    fn create_rejects_invalid_input_without_writing() {
        let (_dir, store) = store();
        let err = store.create(NewShader::new("", "")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref issues) if issues.len() == 2));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn list_orders_by_most_recent_update() {
        let (_dir, store) = store();
        let first = store.create(NewShader::new("First", "a")).unwrap();
        let second = store.create(NewShader::new("Second", "b")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.update_code(&first.id, "a2").unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn update_keeps_identity_and_bumps_timestamp() {
        let (_dir, store) = store();
        let created = store.create(NewShader::new("Grid", "old")).unwrap();
        let updated = store.update_code(&created.id, "new").unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.get(&created.id).unwrap().code, "new");
    }

    #[test]
    fn update_rejects_empty_code() {
        let (_dir, store) = store();
        let created = store.create(NewShader::new("Grid", "old")).unwrap();
        assert!(matches!(
            store.update_code(&created.id, "   "),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.get(&created.id).unwrap().code, "old");
    }

    #[test]
    fn missing_and_malformed_ids_are_distinguished() {
        let (_dir, store) = store();
        let missing = "0123456789abcdef0123456789abcdef";
        assert!(matches!(store.get(missing), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(missing), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get("../x"), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn delete_removes_record() {
        let (_dir, store) = store();
        let created = store.create(NewShader::new("Gone", "x")).unwrap();
        store.delete(&created.id).unwrap();
        assert!(matches!(store.get(&created.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_skips_foreign_and_corrupt_files() {
        let (_dir, store) = store();
        let kept = store.create(NewShader::new("Kept", "x")).unwrap();
        fs::write(store.root().join("notes.txt"), "hello").unwrap();
        fs::write(
            store.root().join("ffffffffffffffffffffffffffffffff.json"),
            "{not json",
        )
        .unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, kept.id);
    }
}
