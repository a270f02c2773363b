use thiserror::Error;

/// Structural problems in a Delta that is supposed to be a document
/// (insert-only) op log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("op {index} is an empty insert")]
    EmptyInsert { index: usize },
    #[error("op {index} is a {kind} op; documents may only contain inserts")]
    NotADocument { index: usize, kind: &'static str },
    #[error("op {index} embeds an empty object")]
    EmptyEmbed { index: usize },
    #[error("op {index} embeds unregistered type '{kind}'")]
    UnregisteredEmbed { index: usize, kind: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid page geometry: content height {0}px is not positive")]
    EmptyPage(f32),
}

/// Rejections raised while importing a document file.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected file type '{0}'")]
    WrongFileType(String),
    #[error("unsupported format version '{0}'")]
    UnsupportedVersion(String),
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("document content is invalid: {0}")]
    InvalidContent(#[from] DeltaError),
}

/// Failures mapping between API records and the in-memory document.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("content JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("content has neither an ops array nor an op list")]
    UnrecognizedShape,
    #[error("record id '{0}' is not a UUID")]
    InvalidId(String),
}

/// Persistence failures. Callers keep local state and retry.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("document {0} not found")]
    NotFound(uuid::Uuid),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
