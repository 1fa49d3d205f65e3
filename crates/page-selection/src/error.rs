use pdf_engine::PdfEngineError;

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to load PDF: {0}")]
    Load(#[source] PdfEngineError),
    #[error("no pages selected")]
    EmptySelection,
    #[error("failed to export pages: {0}")]
    Export(#[source] PdfEngineError),
    #[error("failed to save exported PDF: {0}")]
    Save(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("preview scale {scale} is outside (0, {max}]")]
    InvalidScale { scale: f32, max: f32 },
    #[error("failed to render preview: {0}")]
    Preview(#[source] PdfEngineError),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("no document loaded")]
    NoDocument,
}

pub type SelectionResult<T> = Result<T, SelectionError>;
