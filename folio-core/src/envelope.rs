//! Self-describing import/export file.
//!
//! ```json
//! { "fileType": "folio-document", "formatVersion": "1.0",
//!   "title": "...", "description": "...", "content": { "ops": [...] } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::Delta;
use crate::document::Document;
use crate::error::EnvelopeError;
use crate::serializer;

pub const FILE_TYPE: &str = "folio-document";
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEnvelope {
    pub file_type: String,
    pub format_version: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Flat content, pages separated by page-break markers.
    pub content: Delta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
}

impl FileEnvelope {
    pub fn from_document(document: &Document) -> Self {
        Self {
            file_type: FILE_TYPE.to_string(),
            format_version: FORMAT_VERSION.to_string(),
            title: document.title.clone(),
            description: document.description.clone(),
            content: serializer::serialize(&document.pages),
            exported_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an envelope. Nothing is returned unless every
    /// check passes.
    pub fn parse(json: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(json)?;
        let field = |name: &'static str| value.get(name).filter(|v| !v.is_null());

        let file_type = field("fileType")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingField("fileType"))?;
        if file_type != FILE_TYPE {
            return Err(EnvelopeError::WrongFileType(file_type.to_string()));
        }

        let format_version = field("formatVersion")
            .and_then(Value::as_str)
            .unwrap_or(FORMAT_VERSION);
        if !format_version.starts_with("1.") {
            return Err(EnvelopeError::UnsupportedVersion(format_version.to_string()));
        }

        let title = field("title")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingField("title"))?;
        let description = field("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = field("content").ok_or(EnvelopeError::MissingField("content"))?;
        let content = Delta::from_value(content.clone())?;
        content.validate_document()?;

        Ok(Self {
            file_type: file_type.to_string(),
            format_version: format_version.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            content,
            exported_at: field("exportedAt").and_then(Value::as_str).map(String::from),
        })
    }

    /// Page contents of the envelope.
    pub fn pages(&self) -> Vec<Delta> {
        serializer::split(&self.content)
    }
}
