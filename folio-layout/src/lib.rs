//! # folio-layout — pagination for the folio editor
//!
//! Each page of a document is an independent rich-text buffer behind the
//! [`PageContentStore`] contract. The [`PaginationEngine`] watches the
//! rendered height of every buffer and keeps pages within the target
//! height:
//!
//! ```text
//!  user edit ──► store (user) ──► CheckScheduler ──tick──► overflow-split
//!                                                      └──► reflow-pull
//!  remote op ──► PageIndex::route ──► store (silent) ──┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] — the page buffer contract and line-box geometry
//! - [`measure`] — deterministic in-memory store with fixed-width wrapping
//! - [`engine`] — overflow, reflow and page removal
//! - [`scheduler`] — debounced overflow/reflow checks
//! - [`index`] — flat-offset ⇄ page-offset mapping
//! - [`history`] — per-page undo of user changes

pub mod engine;
pub mod error;
pub mod history;
pub mod index;
pub mod measure;
pub mod scheduler;
pub mod store;

pub use engine::{LayoutReport, OverflowReport, PaginationEngine, ReflowReport};
pub use error::LayoutError;
pub use history::History;
pub use index::{PageIndex, PageSpan};
pub use measure::{MeasuredBuffer, MeasuredFactory};
pub use scheduler::{ChangeSummary, CheckScheduler, DueChecks};
pub use store::{LineBox, PageContentStore, Source, StoreFactory};
