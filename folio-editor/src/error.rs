use folio_collab::ProtocolError;
use folio_core::{EnvelopeError, RepositoryError, TransportError};
use folio_layout::LayoutError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("import rejected: {0}")]
    Import(#[from] EnvelopeError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("range {offset}..{end} is outside the editable text of the page (length {len})")]
    OutOfRange { offset: usize, end: usize, len: usize },
}
