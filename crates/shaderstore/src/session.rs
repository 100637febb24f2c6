use preview::{Persist, PersistenceError};
use tracing::info;

use crate::record::{NewShader, ShaderRecord, UNTITLED};
use crate::store::{ShaderStore, StoreError};

/// Saves the document being edited into a [`ShaderStore`].
///
/// The first save of a new document creates a private record titled
/// [`UNTITLED`]; every later save updates that record's code.
#[derive(Debug, Clone)]
pub struct StoreSession {
    store: ShaderStore,
    record_id: Option<String>,
}

impl StoreSession {
    /// Session for a document that has never been saved.
    pub fn new(store: ShaderStore) -> Self {
        Self {
            store,
            record_id: None,
        }
    }

    /// Session editing an existing record; returns the record to seed the editor.
    pub fn open(store: ShaderStore, id: &str) -> Result<(Self, ShaderRecord), StoreError> {
        let record = store.get(id)?;
        let session = Self {
            store,
            record_id: Some(record.id.clone()),
        };
        Ok((session, record))
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn save(&mut self, code: &str) -> Result<ShaderRecord, StoreError> {
        match &self.record_id {
            Some(id) => self.store.update_code(id, code),
            None => {
                let record = self.store.create(NewShader::new(UNTITLED, code))?;
                info!(id = %record.id, "new document saved");
                self.record_id = Some(record.id.clone());
                Ok(record)
            }
        }
    }
}

impl Persist for StoreSession {
    fn persist(&mut self, fragment_text: &str) -> Result<(), PersistenceError> {
        self.save(fragment_text)
            .map(|_| ())
            .map_err(|err| PersistenceError::new(err.to_string()))
    }
}
