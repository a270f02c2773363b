//! Editor session — owns the full document → layout → sync pipeline.
//!
//! `EditorSession` is the single source of truth for an open document. It
//! holds the document metadata, the pagination engine (which owns the page
//! contents), collaboration bookkeeping, autosave state and the repository
//! the document is persisted through.
//!
//! The host drives it with wall-clock instants: edits and inbound
//! operations are applied immediately, layout checks and saves run when
//! [`EditorSession::tick`] finds them due.

use std::path::Path;
use std::time::Instant;

use uuid::Uuid;

use folio_collab::{CollabMessage, CollaborationSync, InboundOutcome, SyncClient, SyncEvent};
use folio_core::transport::{CreateDocumentRequest, DocumentRecord, UpdateDocumentRequest};
use folio_core::{
    Attributes, AutoSave, Delta, Document, DocumentRepository, EditorRuntimeConfig, FileEnvelope,
    PageId, SaveState, TransportError,
};
use folio_layout::{LayoutReport, MeasuredFactory, PageContentStore, PaginationEngine, Source};

use crate::error::SessionError;

/// What one [`EditorSession::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub layout: LayoutReport,
    /// Server version written by a save that ran in this tick.
    pub saved_version: Option<u64>,
    pub save_failed: bool,
}

pub struct EditorSession<R: DocumentRepository> {
    /// Metadata only; page contents live in the engine.
    meta: Document,
    engine: PaginationEngine<MeasuredFactory>,
    sync: CollaborationSync,
    autosave: AutoSave,
    repository: R,
}

impl<R: DocumentRepository> EditorSession<R> {
    /// A fresh, unsaved document with one blank page.
    pub fn new(config: EditorRuntimeConfig, repository: R) -> Self {
        let autosave = AutoSave::new(config.timing.autosave_delay());
        let mut meta = Document::new();
        meta.pages.clear();
        Self {
            meta,
            engine: PaginationEngine::measured(config),
            sync: CollaborationSync::default(),
            autosave,
            repository,
        }
    }

    /// Open a stored document.
    pub fn open(config: EditorRuntimeConfig, repository: R, id: Uuid) -> Result<Self, SessionError> {
        let record = repository.get(id)?;
        let mut session = Self::new(config, repository);
        session.load_record(record)?;
        Ok(session)
    }

    /// Replace the open document with a repository record. The stored
    /// page split is kept as it is until edits trigger layout checks.
    ///
    /// Content that fails to decode loads as a blank page; only a record
    /// whose id is not a UUID is refused.
    pub fn load_record(&mut self, record: DocumentRecord) -> Result<(), SessionError> {
        let mut document = record.into_document()?;
        let pages = std::mem::take(&mut document.pages);
        self.engine.load_pages(pages);
        self.sync.set_version(document.version);
        self.autosave = AutoSave::new(self.engine.config().timing.autosave_delay());
        log::info!(
            "opened '{}' (version {}, {} page(s))",
            document.title,
            document.version,
            self.engine.page_count()
        );
        self.meta = document;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// Snapshot of the document with the engine's current pages.
    pub fn document(&self) -> Document {
        let mut document = self.meta.clone();
        document.pages = self.engine.pages();
        document
    }

    pub fn id(&self) -> Option<Uuid> {
        self.meta.id
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn set_title(&mut self, title: impl Into<String>, now: Instant) {
        self.meta.title = title.into();
        self.autosave.mark_dirty(now);
    }

    pub fn engine(&self) -> &PaginationEngine<MeasuredFactory> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PaginationEngine<MeasuredFactory> {
        &mut self.engine
    }

    pub fn sync(&self) -> &CollaborationSync {
        &self.sync
    }

    pub fn save_state(&self) -> &SaveState {
        self.autosave.state()
    }

    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// Each page's plain text, pages in order.
    pub fn export_text(&self) -> String {
        self.document().plain_text()
    }

    // ---------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------

    /// The page edits go to: the focused one, else the first.
    pub fn active_page(&self) -> PageId {
        match self.engine.active_page() {
            Some(id) => id,
            None => self.engine.page_ids()[0],
        }
    }

    pub fn insert_text(
        &mut self,
        offset: usize,
        text: &str,
        attributes: &Attributes,
        now: Instant,
    ) -> Result<(), SessionError> {
        if text.is_empty() {
            return Ok(());
        }
        let page = self.active_page();
        // nothing may follow the terminator
        self.check_range(page, offset, offset, 1)?;
        let attributes = self.engine.config().sanitize_attributes(attributes);
        let change = Delta::new().retain(offset).insert_with(text, attributes);
        self.apply_user_change(page, &change, now)
    }

    pub fn delete_text(&mut self, offset: usize, len: usize, now: Instant) -> Result<(), SessionError> {
        if len == 0 {
            return Ok(());
        }
        let page = self.active_page();
        self.check_range(page, offset, offset + len, 1)?;
        let change = Delta::new().retain(offset).delete(len);
        self.apply_user_change(page, &change, now)
    }

    /// Apply formatting to a range. Whitelisted attributes (font size and
    /// family) outside the configured values are dropped first.
    pub fn format_text(
        &mut self,
        offset: usize,
        len: usize,
        attributes: &Attributes,
        now: Instant,
    ) -> Result<(), SessionError> {
        let attributes = self.engine.config().sanitize_attributes(attributes);
        if len == 0 || attributes.is_empty() {
            return Ok(());
        }
        let page = self.active_page();
        self.check_range(page, offset, offset + len, 0)?;
        let change = Delta::new().retain(offset).retain_with(len, attributes);
        self.apply_user_change(page, &change, now)
    }

    /// Apply a user change to one page and pick up what the stores
    /// recorded.
    pub fn apply_user_change(
        &mut self,
        page: PageId,
        change: &Delta,
        now: Instant,
    ) -> Result<(), SessionError> {
        self.engine.edit_page(page, change, Source::User, now)?;
        self.collect_user_changes(now);
        Ok(())
    }

    /// Queue recorded user changes for broadcast and mark the document
    /// dirty. Returns how many changes were picked up.
    pub fn collect_user_changes(&mut self, now: Instant) -> usize {
        let changes = self.engine.take_user_changes();
        if changes.is_empty() {
            return 0;
        }
        let count = changes.len();
        self.sync.record_page_changes(&self.engine, changes);
        self.autosave.mark_dirty(now);
        count
    }

    /// Undo the last step of user edits on the active page. Layout moves
    /// and remote operations are never undone. The revert goes out like
    /// any other edit. Returns false when there was nothing to undo.
    pub fn undo(&mut self, now: Instant) -> Result<bool, SessionError> {
        let page = self.active_page();
        let changed = self.engine.undo_page(page, now)?;
        if changed {
            self.collect_user_changes(now);
        }
        Ok(changed)
    }

    pub fn redo(&mut self, now: Instant) -> Result<bool, SessionError> {
        let page = self.active_page();
        let changed = self.engine.redo_page(page, now)?;
        if changed {
            self.collect_user_changes(now);
        }
        Ok(changed)
    }

    /// `[offset, end)` must lie within the page, leaving `reserved`
    /// trailing positions untouched.
    fn check_range(
        &self,
        page: PageId,
        offset: usize,
        end: usize,
        reserved: usize,
    ) -> Result<(), SessionError> {
        let len = self.engine.store(page).map_or(0, PageContentStore::len);
        if offset > end || end > len.saturating_sub(reserved) {
            return Err(SessionError::OutOfRange { offset, end, len });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Driving
    // ---------------------------------------------------------------

    /// Run due layout checks, then a due save.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport {
            layout: self.engine.tick(now),
            ..TickReport::default()
        };
        if self.autosave.due(now) {
            match self.save(now) {
                Ok(version) => report.saved_version = Some(version),
                Err(_) => report.save_failed = true,
            }
        }
        report
    }

    /// Earliest instant at which [`EditorSession::tick`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.engine.next_deadline(), self.autosave.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Create the document on first save, update it afterwards.
    ///
    /// On failure the pages are left as they are, the save state becomes
    /// `Error` and the document stays dirty so a later save retries.
    pub fn save(&mut self, now: Instant) -> Result<u64, SessionError> {
        let snapshot = self.document();
        self.autosave.begin();
        match self.write(&snapshot) {
            Ok((id, record)) => {
                let version = record.version;
                self.meta.id = Some(id);
                self.meta.version = version;
                self.meta.owner_id = record.owner_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());
                self.meta.created_at = record.created_at;
                self.meta.updated_at = record.updated_at;
                self.autosave.succeed(version);
                log::info!("saved '{}' as version {version}", self.meta.title);
                Ok(version)
            }
            Err(e) => {
                self.autosave.fail(e.to_string(), now);
                Err(e)
            }
        }
    }

    fn write(&mut self, snapshot: &Document) -> Result<(Uuid, DocumentRecord), SessionError> {
        let record = match snapshot.id {
            None => {
                let request = CreateDocumentRequest::from_document(snapshot)?;
                self.repository.create(request)?
            }
            Some(id) => {
                let request = UpdateDocumentRequest::from_document(snapshot)?;
                self.repository.update(id, request)?
            }
        };
        Ok((parse_id(&record.id)?, record))
    }

    // ---------------------------------------------------------------
    // Import / export
    // ---------------------------------------------------------------

    /// Replace title, description and pages with an exported file.
    ///
    /// The file is fully validated first; a rejected file leaves the open
    /// document untouched.
    pub fn import(&mut self, json: &str, now: Instant) -> Result<(), SessionError> {
        let envelope = FileEnvelope::parse(json)?;
        self.meta.title = envelope.title;
        self.meta.description = envelope.description;
        self.engine.load_flat(&envelope.content);
        self.autosave.mark_dirty(now);
        log::info!("imported '{}' ({} page(s))", self.meta.title, self.engine.page_count());
        Ok(())
    }

    pub fn import_file(&mut self, path: &Path, now: Instant) -> Result<(), SessionError> {
        let json = std::fs::read_to_string(path)?;
        self.import(&json, now)
    }

    pub fn export(&self) -> Result<String, SessionError> {
        Ok(FileEnvelope::from_document(&self.document()).to_json_pretty()?)
    }

    pub fn export_file(&self, path: &Path) -> Result<(), SessionError> {
        std::fs::write(path, self.export()?)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Collaboration
    // ---------------------------------------------------------------

    /// Apply a remote operation. Never marks the document dirty and never
    /// queues anything for broadcast.
    pub fn receive(&mut self, msg: &CollabMessage, now: Instant) -> InboundOutcome {
        self.sync.apply_inbound(msg, &mut self.engine, now)
    }

    pub fn handle_event(&mut self, event: SyncEvent, now: Instant) -> Option<InboundOutcome> {
        match event {
            SyncEvent::RemoteOperation(msg) => Some(self.receive(&msg, now)),
            SyncEvent::Connected => {
                log::info!("collaboration connected");
                None
            }
            SyncEvent::Disconnected => {
                log::info!("collaboration disconnected; editing continues locally");
                None
            }
        }
    }

    pub fn drain_outbound(&mut self) -> Vec<CollabMessage> {
        self.sync.drain_outbound()
    }

    pub async fn flush_outbound(&mut self, client: &SyncClient) -> Result<usize, SessionError> {
        Ok(self.sync.flush(client).await?)
    }
}

fn parse_id(id: &str) -> Result<Uuid, TransportError> {
    Uuid::parse_str(id).map_err(|_| TransportError::InvalidId(id.to_string()))
}
