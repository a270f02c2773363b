//! In-memory document model: an ordered list of pages plus metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delta::Delta;

/// Title given to documents created without one.
pub const UNTITLED: &str = "Untitled document";

/// Stable identity of a page for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub content: Delta,
}

impl Page {
    pub fn new(content: Delta) -> Self {
        Self {
            id: PageId::new(),
            content,
        }
    }

    /// A page holding only the terminator.
    pub fn blank() -> Self {
        Self::new(Delta::terminator())
    }

    pub fn is_blank(&self) -> bool {
        self.content.is_blank()
    }

    /// Plain text with the page's trailing terminator removed.
    pub fn text(&self) -> String {
        let mut text = self.content.text();
        if text.ends_with('\n') {
            text.pop();
        }
        text
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// Lifecycle status. Unknown values from the server are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
    Archived,
    Other(String),
}

impl From<String> for DocumentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "draft" => DocumentStatus::Draft,
            "published" => DocumentStatus::Published,
            "archived" => DocumentStatus::Archived,
            _ => DocumentStatus::Other(value),
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(value: DocumentStatus) -> Self {
        match value {
            DocumentStatus::Draft => "draft".into(),
            DocumentStatus::Published => "published".into(),
            DocumentStatus::Archived => "archived".into(),
            DocumentStatus::Other(s) => s,
        }
    }
}

/// A paginated document.
///
/// `id` is `None` until the document has been persisted once.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub version: u64,
    pub owner_id: Option<Uuid>,
    pub visibility: Visibility,
    pub status: DocumentStatus,
    pub pages: Vec<Page>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Fresh unsaved document with one blank page.
    pub fn new() -> Self {
        Self {
            id: None,
            title: UNTITLED.to_string(),
            description: String::new(),
            version: 1,
            owner_id: None,
            visibility: Visibility::Private,
            status: DocumentStatus::Draft,
            pages: vec![Page::blank()],
            created_at: None,
            updated_at: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages' plain text, concatenated in order. Each page keeps its own
    /// terminator, so page boundaries read as line breaks.
    pub fn plain_text(&self) -> String {
        self.pages.iter().map(|p| p.content.text()).collect()
    }

    /// Non-newline character count across all pages.
    pub fn visible_len(&self) -> usize {
        self.pages.iter().map(|p| p.content.visible_len()).sum()
    }
}
