use folio_core::PageId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),
    #[error("A document must keep at least one page")]
    LastPage,
    #[error("Change touches the page break at flat offset {0}")]
    CrossesPageBreak(usize),
    #[error("Change reaches past the end of the document (offset {offset}, length {len})")]
    OutOfRange { offset: usize, len: usize },
}
