//! Page selection and export for a single loaded PDF.
//!
//! [`SelectionManager`] tracks which 1-based page numbers are selected and
//! turns the selection into a new document through a [`pdf_engine::PdfEngine`].

pub mod error;
pub mod manager;
pub mod selection;
pub mod source;
pub mod status;

pub use error::{SelectionError, SelectionResult};
pub use manager::{SelectionManager, DOWNLOAD_FILE_NAME, MAX_PREVIEW_SCALE};
pub use selection::Selection;
pub use source::{media_type_for, SourceFile, OCTET_STREAM_MEDIA_TYPE, PDF_MEDIA_TYPE};
pub use status::{StatusKind, StatusMessage};
