//! Persistence contract and an in-memory implementation.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::delta::Delta;
use crate::document::DocumentStatus;
use crate::error::{RepositoryError, TransportError};
use crate::transport::{
    encode_record_content, CreateDocumentRequest, DocumentRecord, UpdateDocumentRequest,
};

/// The document persistence API the editor consumes.
pub trait DocumentRepository {
    fn create(&mut self, request: CreateDocumentRequest) -> Result<DocumentRecord, RepositoryError>;
    fn get(&self, id: Uuid) -> Result<DocumentRecord, RepositoryError>;
    fn update(
        &mut self,
        id: Uuid,
        request: UpdateDocumentRequest,
    ) -> Result<DocumentRecord, RepositoryError>;
    fn delete(&mut self, id: Uuid) -> Result<(), RepositoryError>;
    fn list(&self) -> Result<Vec<DocumentRecord>, RepositoryError>;
}

/// Keeps records in memory, encoding content the same way the API does.
///
/// Versions start at 1 and increase by one per update.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: BTreeMap<Uuid, DocumentRecord>,
    owner_id: Uuid,
    fail_next: Option<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            owner_id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// Make the next mutating call fail with `Unavailable(reason)`.
    pub fn fail_next(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_failure(&mut self) -> Result<(), RepositoryError> {
        match self.fail_next.take() {
            Some(reason) => Err(RepositoryError::Unavailable(reason)),
            None => Ok(()),
        }
    }
}

/// Re-encode outbound JSON content into the record's stored form.
fn store_content(json: &str) -> Result<String, RepositoryError> {
    let value = serde_json::from_str(json).map_err(TransportError::from)?;
    let delta = Delta::from_value(value).map_err(TransportError::from)?;
    Ok(encode_record_content(&delta)?)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl DocumentRepository for MemoryRepository {
    fn create(&mut self, request: CreateDocumentRequest) -> Result<DocumentRecord, RepositoryError> {
        self.check_failure()?;
        let id = Uuid::new_v4();
        let stamp = now();
        let record = DocumentRecord {
            id: id.to_string(),
            title: Some(request.title),
            description: Some(request.description),
            owner_id: Some(self.owner_id.to_string()),
            version: 1,
            is_public: request.is_public,
            status: Some(DocumentStatus::Draft),
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
            content: Some(store_content(&request.content)?),
        };
        log::debug!("created document {id}");
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: Uuid) -> Result<DocumentRecord, RepositoryError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    fn update(
        &mut self,
        id: Uuid,
        request: UpdateDocumentRequest,
    ) -> Result<DocumentRecord, RepositoryError> {
        self.check_failure()?;
        let content = store_content(&request.content)?;
        let record = self
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        if let Some(title) = request.title {
            record.title = Some(title);
        }
        if let Some(description) = request.description {
            record.description = Some(description);
        }
        if let Some(is_public) = request.is_public {
            record.is_public = is_public;
        }
        if let Some(status) = request.status {
            record.status = Some(status);
        }
        record.content = Some(content);
        record.version += 1;
        record.updated_at = Some(now());
        log::debug!("updated document {id} to version {}", record.version);
        Ok(record.clone())
    }

    fn delete(&mut self, id: Uuid) -> Result<(), RepositoryError> {
        self.check_failure()?;
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<DocumentRecord>, RepositoryError> {
        Ok(self.records.values().cloned().collect())
    }
}
