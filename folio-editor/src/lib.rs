//! # folio-editor — editing sessions and the `folio` command line
//!
//! ```text
//!  user edits ──► EditorSession ──► PaginationEngine (folio-layout)
//!                  │    │    └────► CollaborationSync (folio-collab)
//!                  │    └─────────► AutoSave ──► DocumentRepository
//!                  └──────────────► FileEnvelope import / export
//! ```

pub mod error;
pub mod loader;
pub mod session;

pub use error::SessionError;
pub use loader::{parse_content, read_content, LoadedContent};
pub use session::{EditorSession, TickReport};
