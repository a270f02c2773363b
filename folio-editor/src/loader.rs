//! Reading document content from files.
//!
//! Two shapes are accepted: the export envelope (anything carrying a
//! `fileType` field) and a bare Delta, either `{"ops": [...]}` or a plain
//! op array.

use std::path::Path;

use serde_json::Value;

use folio_core::{Delta, EnvelopeError, FileEnvelope};

use crate::error::SessionError;

/// Content read from a file, plus the envelope's metadata when present.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedContent {
    pub title: Option<String>,
    pub description: String,
    /// Flat content, pages separated by page-break markers.
    pub content: Delta,
}

pub fn parse_content(json: &str) -> Result<LoadedContent, SessionError> {
    let value: Value = serde_json::from_str(json).map_err(EnvelopeError::from)?;
    if value.get("fileType").is_some() {
        let envelope = FileEnvelope::parse(json)?;
        return Ok(LoadedContent {
            title: Some(envelope.title),
            description: envelope.description,
            content: envelope.content,
        });
    }

    let content = Delta::from_value(value).map_err(EnvelopeError::from)?;
    content.validate_document().map_err(EnvelopeError::from)?;
    Ok(LoadedContent {
        title: None,
        description: String::new(),
        content,
    })
}

pub fn read_content(path: &Path) -> Result<LoadedContent, SessionError> {
    let json = std::fs::read_to_string(path)?;
    let loaded = parse_content(&json)?;
    log::debug!("read {} op(s) from {}", loaded.content.ops.len(), path.display());
    Ok(loaded)
}
