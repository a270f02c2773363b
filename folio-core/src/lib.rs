//! # folio-core — document model for the folio paginated editor
//!
//! Rich text is stored as a *Delta*: a flat list of insert operations with
//! formatting attributes. A document is an ordered list of pages, each
//! holding its own Delta; the pages are joined into one flat Delta with
//! page-break markers for storage and collaboration.
//!
//! ```text
//! ┌──────────┐  serialize   ┌────────────┐  encode   ┌────────────────┐
//! │ Document │ ───────────► │ flat Delta │ ────────► │ DocumentRecord │
//! │ [Page]   │ ◄─────────── │ + markers  │ ◄──────── │ (base64 JSON)  │
//! └──────────┘    split     └────────────┘  decode   └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`delta`] — Delta ops, compose / slice / lines
//! - [`attributes`] — opaque formatting attribute maps
//! - [`document`] — `Document`, `Page`, status and visibility
//! - [`serializer`] — pages ⇄ flat Delta with page-break markers
//! - [`config`] — `EditorRuntimeConfig` (geometry, timing, whitelists)
//! - [`envelope`] — import/export file format
//! - [`transport`] — persistence API records and content codec
//! - [`repository`] — persistence contract and in-memory store
//! - [`schedule`] — explicit debounce timers
//! - [`autosave`] — dirty tracking and save state machine

pub mod attributes;
pub mod autosave;
pub mod config;
pub mod delta;
pub mod document;
pub mod envelope;
pub mod error;
pub mod repository;
pub mod schedule;
pub mod serializer;
pub mod transport;

pub use attributes::Attributes;
pub use autosave::{AutoSave, SaveState};
pub use config::{EditorRuntimeConfig, HistoryPolicy, PageGeometry, ReflowPolicy, TextMetrics, Timing};
pub use delta::{Delta, Insert, Line, Op, OpKind};
pub use document::{Document, DocumentStatus, Page, PageId, Visibility};
pub use envelope::FileEnvelope;
pub use error::{ConfigError, DeltaError, EnvelopeError, RepositoryError, TransportError};
pub use repository::{DocumentRepository, MemoryRepository};
pub use schedule::{Debouncer, TimerToken};
pub use transport::{CreateDocumentRequest, DocumentRecord, UpdateDocumentRequest};
