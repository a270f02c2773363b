//! Editor session integration tests.
//!
//! Verifies:
//! - a new document is one page holding only the terminator
//! - typing past the page height settles into two pages on the next tick
//! - a rejected import leaves the open document untouched
//! - remote operations are applied without being sent back out
//! - undo reverts the user's own edits, never layout moves or remote ops
//! - a failed save keeps the edits and retries on a later tick
//! - export files survive a trip through the file system
//! - stored documents open with their pages and version

use std::time::{Duration, Instant};

use folio_collab::{CollabMessage, InboundOutcome};
use folio_core::transport::decode_content;
use folio_core::{
    Attributes, Delta, DocumentRepository, EditorRuntimeConfig, EnvelopeError, MemoryRepository,
    PageGeometry, SaveState,
};
use folio_editor::{EditorSession, SessionError};
use tempfile::tempdir;
use uuid::Uuid;

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// 400×504 content box: 50 characters per line, 21 lines per page.
fn config() -> EditorRuntimeConfig {
    EditorRuntimeConfig {
        page: PageGeometry::content_box(400.0, 504.0),
        ..EditorRuntimeConfig::default()
    }
}

fn session() -> EditorSession<MemoryRepository> {
    EditorSession::new(config(), MemoryRepository::new())
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn type_text(s: &mut EditorSession<MemoryRepository>, offset: usize, text: &str, now: Instant) {
    s.insert_text(offset, text, &Attributes::new(), now).unwrap();
}

fn page_texts(s: &EditorSession<MemoryRepository>) -> Vec<String> {
    s.document().pages.iter().map(|p| p.text()).collect()
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_new_document_is_single_terminator() {
    let s = session();
    let doc = s.document();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(
        serde_json::to_value(&doc.pages[0].content).unwrap(),
        serde_json::json!({ "ops": [{ "insert": "\n" }] })
    );
}

#[test]
fn test_typing_past_page_height_splits_on_tick() {
    let t0 = Instant::now();
    let mut s = session();
    let original = "abcdefghi ".repeat(200);
    type_text(&mut s, 0, &original, t0);

    assert_eq!(s.engine().page_count(), 1);
    assert!(!s.tick(t0 + ms(200)).layout.changed());

    let report = s.tick(t0 + ms(300));
    assert_eq!(report.layout.overflow.pages_created, 1);
    let pages = page_texts(&s);
    assert_eq!(pages.len(), 2);
    assert!(pages[0].ends_with(' '));
    assert_eq!(format!("{}{}", pages[0], pages[1]), original);

    // the split itself is never broadcast
    assert_eq!(s.drain_outbound().len(), 1);
}

#[test]
fn test_import_missing_content_leaves_document_untouched() {
    let t0 = Instant::now();
    let mut s = session();
    s.set_title("Minutes", t0);
    type_text(&mut s, 0, "kept", t0);
    let before = s.document();

    let json = r#"{"fileType":"folio-document","formatVersion":"1.0","title":"Other"}"#;
    let result = s.import(json, t0);

    assert!(matches!(
        result,
        Err(SessionError::Import(EnvelopeError::MissingField("content")))
    ));
    let after = s.document();
    assert_eq!(after.title, "Minutes");
    assert_eq!(after.pages, before.pages);
}

#[test]
fn test_remote_operation_is_not_rebroadcast() {
    let t0 = Instant::now();
    let mut s = session();
    type_text(&mut s, 0, "Hello", t0);
    let local = s.drain_outbound();
    assert_eq!(local.len(), 1);

    // a remote insert lands while the local user is still typing
    let remote = CollabMessage::new(Uuid::new_v4(), 7, &Delta::new().insert(">> "));
    let outcome = s.receive(&remote, t0 + ms(10));
    assert!(matches!(outcome, InboundOutcome::Applied(ref pages) if pages.len() == 1));
    type_text(&mut s, 8, "!", t0 + ms(20));

    s.tick(t0 + ms(1000));
    assert_eq!(s.collect_user_changes(t0 + ms(1000)), 0);

    let out = s.drain_outbound();
    assert_eq!(out.len(), 1, "only the local keystroke goes out");
    assert_eq!(out[0].delta(), Delta::new().retain(8).insert("!"));
    assert_eq!(out[0].version, 7);
    assert_eq!(s.export_text(), ">> Hello!\n");
}

#[test]
fn test_undo_skips_remote_operation() {
    let t0 = Instant::now();
    let mut s = session();
    type_text(&mut s, 0, "Hello", t0);
    s.drain_outbound();

    let remote = CollabMessage::new(Uuid::new_v4(), 3, &Delta::new().insert(">> "));
    s.receive(&remote, t0 + ms(10));
    assert_eq!(s.export_text(), ">> Hello\n");

    assert!(s.undo(t0 + ms(20)).unwrap());
    assert_eq!(s.export_text(), ">> \n");
    assert!(!s.undo(t0 + ms(30)).unwrap());

    let out = s.drain_outbound();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].delta(), Delta::new().retain(3).delete(5));

    assert!(s.redo(t0 + ms(40)).unwrap());
    assert_eq!(s.export_text(), ">> Hello\n");
}

#[test]
fn test_undo_after_split_keeps_pages() {
    let t0 = Instant::now();
    let mut s = session();
    let original = "abcdefghi ".repeat(200);
    type_text(&mut s, 0, &original, t0);
    s.tick(t0 + ms(300));
    assert_eq!(s.engine().page_count(), 2);
    s.drain_outbound();

    // typing pauses past the grouping delay, then one more word
    let first = s.engine().page_ids()[0];
    s.engine_mut().set_active_page(first).unwrap();
    type_text(&mut s, 0, "intro ", t0 + ms(5000));
    assert!(s.undo(t0 + ms(5100)).unwrap());

    let pages = page_texts(&s);
    assert_eq!(pages.len(), 2);
    assert_eq!(format!("{}{}", pages[0], pages[1]), original);
    assert_eq!(s.drain_outbound().len(), 2);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[test]
fn test_autosave_after_debounce() {
    let t0 = Instant::now();
    let mut s = session();
    type_text(&mut s, 0, "draft", t0);
    assert_eq!(s.next_deadline(), Some(t0 + ms(300)));

    assert_eq!(s.tick(t0 + ms(1999)).saved_version, None);
    let report = s.tick(t0 + ms(2000));
    assert_eq!(report.saved_version, Some(1));
    assert_eq!(s.save_state(), &SaveState::Saved { version: 1 });
    assert!(!s.is_dirty());

    let stored = s.repository().get(s.id().unwrap()).unwrap();
    assert_eq!(decode_content(stored.content.as_deref()).text(), "draft\n");
}

#[test]
fn test_failed_save_keeps_edits_and_retries() {
    let t0 = Instant::now();
    let mut s = session();
    type_text(&mut s, 0, "precious", t0);
    s.repository_mut().fail_next("network down");

    let failed = s.tick(t0 + ms(2000));
    assert!(failed.save_failed);
    assert!(matches!(s.save_state(), SaveState::Error { message } if message.contains("network down")));
    assert!(s.is_dirty());
    assert_eq!(page_texts(&s), vec!["precious".to_string()]);
    assert!(s.id().is_none());

    let retried = s.tick(t0 + ms(4000));
    assert_eq!(retried.saved_version, Some(1));
    assert!(!s.is_dirty());
}

#[test]
fn test_open_restores_pages_and_version() {
    let t0 = Instant::now();
    let mut first = session();
    type_text(&mut first, 0, "one", t0);
    first.engine_mut().add_page();
    type_text(&mut first, 0, "two", t0);
    first.save(t0).unwrap();
    type_text(&mut first, 3, "!", t0);
    assert_eq!(first.save(t0).unwrap(), 2);

    let id = first.id().unwrap();
    let repo = std::mem::take(first.repository_mut());
    let reopened = EditorSession::open(config(), repo, id).unwrap();

    assert_eq!(page_texts(&reopened), vec!["one".to_string(), "two!".to_string()]);
    assert_eq!(reopened.document().version, 2);
    assert_eq!(reopened.sync().version(), 2);
    assert_eq!(reopened.save_state(), &SaveState::Idle);
}

#[test]
fn test_open_missing_document() {
    let result = EditorSession::open(config(), MemoryRepository::new(), Uuid::new_v4());
    assert!(matches!(result, Err(SessionError::Repository(_))));
}

// ─── Files ───────────────────────────────────────────────────────────────────

#[test]
fn test_export_import_through_file() {
    let t0 = Instant::now();
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.folio.json");

    let mut source = session();
    source.set_title("Memo", t0);
    type_text(&mut source, 0, "first page", t0);
    source.engine_mut().add_page();
    type_text(&mut source, 0, "second page", t0);
    source.export_file(&path).unwrap();

    let mut target = session();
    target.import_file(&path, t0).unwrap();

    assert_eq!(target.title(), "Memo");
    assert_eq!(page_texts(&target), vec!["first page".to_string(), "second page".to_string()]);
    assert!(target.is_dirty());
    // an import is not a collaborative edit
    assert!(target.drain_outbound().is_empty());
}

#[test]
fn test_plain_text_export_joins_pages() {
    let t0 = Instant::now();
    let mut s = session();
    type_text(&mut s, 0, "alpha", t0);
    s.engine_mut().add_page();
    type_text(&mut s, 0, "beta", t0);
    assert_eq!(s.export_text(), "alpha\nbeta\n");
}
