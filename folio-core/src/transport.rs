//! Persistence API record shapes and the content codec.
//!
//! Read path:  `content` = base64( JSON string ( JSON string? ( {ops} | [op] ) ) )
//! Write path: `content` = JSON string of `{ "ops": [...] }`
//!
//! A record whose content cannot be decoded still loads, with a blank
//! document in its place.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::delta::Delta;
use crate::document::{Document, DocumentStatus, Visibility, UNTITLED};
use crate::error::TransportError;
use crate::serializer;

/// A document as returned by the persistence API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub description: String,
    pub is_public: bool,
    /// JSON text of the flat delta.
    pub content: String,
}

/// Partial update; unset fields are left out of the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    pub content: String,
}

impl CreateDocumentRequest {
    pub fn from_document(document: &Document) -> Result<Self, TransportError> {
        Ok(Self {
            title: document.title.clone(),
            description: document.description.clone(),
            is_public: document.visibility == Visibility::Public,
            content: encode_content(&serializer::serialize(&document.pages))?,
        })
    }
}

impl UpdateDocumentRequest {
    /// Full update of title, description, visibility, status and content.
    pub fn from_document(document: &Document) -> Result<Self, TransportError> {
        Ok(Self {
            title: Some(document.title.clone()),
            description: Some(document.description.clone()),
            is_public: Some(document.visibility == Visibility::Public),
            status: Some(document.status.clone()),
            content: encode_content(&serializer::serialize(&document.pages))?,
        })
    }

    /// Content-only update.
    pub fn content_only(content: &Delta) -> Result<Self, TransportError> {
        Ok(Self {
            content: encode_content(content)?,
            ..Self::default()
        })
    }
}

/// Outbound encoding: JSON text of `{ "ops": [...] }`.
pub fn encode_content(content: &Delta) -> Result<String, TransportError> {
    Ok(serde_json::to_string(content)?)
}

/// Inbound encoding as the API stores it: base64 of a JSON string literal
/// holding the JSON text.
pub fn encode_record_content(content: &Delta) -> Result<String, TransportError> {
    let inner = encode_content(content)?;
    let outer = serde_json::to_string(&inner)?;
    Ok(BASE64.encode(outer.as_bytes()))
}

/// Strict decode of a record's `content` field.
pub fn try_decode_content(encoded: &str) -> Result<Delta, TransportError> {
    let bytes = BASE64.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    let mut value: Value = serde_json::from_str(&text)?;
    // Content may be wrapped in one or more JSON string layers.
    while let Some(inner) = value.as_str() {
        value = serde_json::from_str(inner)?;
    }
    let recognized = value.is_array() || value.get("ops").is_some_and(Value::is_array);
    if !recognized {
        return Err(TransportError::UnrecognizedShape);
    }
    Ok(Delta::from_value(value)?)
}

/// Lenient decode: any failure yields the blank document.
pub fn decode_content(encoded: Option<&str>) -> Delta {
    let Some(encoded) = encoded.filter(|s| !s.trim().is_empty()) else {
        log::warn!("document record has no content; using a blank document");
        return Delta::terminator();
    };
    match try_decode_content(encoded) {
        Ok(delta) => delta,
        Err(e) => {
            log::warn!("failed to decode document content ({e}); using a blank document");
            Delta::terminator()
        }
    }
}

impl DocumentRecord {
    /// Map into the in-memory model. Pages come from splitting the flat
    /// content at page-break markers.
    pub fn into_document(self) -> Result<Document, TransportError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| TransportError::InvalidId(self.id.clone()))?;
        let flat = decode_content(self.content.as_deref());
        let owner_id = self.owner_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());
        if owner_id.is_none() {
            log::warn!("document {id} has no valid owner id");
        }
        Ok(Document {
            id: Some(id),
            title: self.title.unwrap_or_else(|| UNTITLED.to_string()),
            description: self.description.unwrap_or_default(),
            version: self.version,
            owner_id,
            visibility: if self.is_public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            status: self.status.unwrap_or_default(),
            pages: serializer::deserialize(&flat),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
