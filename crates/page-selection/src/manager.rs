//! Selection and export state for one loaded document.
//!
//! The manager owns the active document handle and the page selection. Every
//! action writes its outcome into the status slot, so a UI layer only has to
//! forward user input and display [`SelectionManager::status`].

use crate::error::{SelectionError, SelectionResult};
use crate::selection::Selection;
use crate::source::SourceFile;
use crate::status::StatusMessage;
use log::{info, warn};
use pdf_engine::{
    default_engine, DocumentHandle, LopdfEngine, OpenSource, PdfEngine, RenderRequest, RgbaImage,
};
use std::convert::Infallible;
use std::error::Error as StdError;

/// File name used when the exported document is handed over for saving.
pub const DOWNLOAD_FILE_NAME: &str = "selected_pages.pdf";

/// Largest scale accepted for page previews.
pub const MAX_PREVIEW_SCALE: f32 = 4.0;

#[derive(Debug, Clone)]
struct ActiveDocument {
    handle: DocumentHandle,
    name: String,
    page_count: u32,
}

pub struct SelectionManager<E: PdfEngine = LopdfEngine> {
    engine: E,
    active: Option<ActiveDocument>,
    selection: Selection,
    status: Option<StatusMessage>,
}

impl Default for SelectionManager<LopdfEngine> {
    fn default() -> Self {
        Self::new(default_engine())
    }
}

impl<E: PdfEngine> SelectionManager<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, active: None, selection: Selection::new(), status: None }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Loads `source` as the active document and returns its page count.
    ///
    /// The previous document and selection are dropped before the new file
    /// is inspected, so a failed load leaves the manager with no document.
    pub fn load_document(&mut self, source: Option<SourceFile>) -> SelectionResult<u32> {
        self.reset();

        let source = match source {
            Some(source) if source.is_pdf() => source,
            Some(source) => {
                self.status = Some(StatusMessage::error("Please select a valid PDF file"));
                return Err(SelectionError::InvalidInput(format!(
                    "{} has media type {}",
                    source.name, source.media_type
                )));
            }
            None => {
                self.status = Some(StatusMessage::error("Please select a valid PDF file"));
                return Err(SelectionError::InvalidInput("no file selected".to_owned()));
            }
        };

        let name = source.name;
        let opened = self.engine.open(OpenSource::Bytes(source.bytes)).and_then(|handle| {
            match self.engine.page_count(handle) {
                Ok(page_count) => Ok((handle, page_count)),
                Err(err) => {
                    let _ = self.engine.close(handle);
                    Err(err)
                }
            }
        });

        let (handle, page_count) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                warn!("failed to load {name}: {err}");
                self.status = Some(StatusMessage::error(format!("Error loading PDF: {err}")));
                return Err(SelectionError::Load(err));
            }
        };

        info!("loaded {name} ({page_count} pages)");
        self.active = Some(ActiveDocument { handle, name, page_count });
        self.status = Some(StatusMessage::success("Click on pages to select them for download"));

        Ok(page_count)
    }

    /// Flips the selection state of page `page` (1-based).
    ///
    /// Returns whether the page is selected afterwards. Pages outside
    /// `1..=page_count` are rejected and the selection is left untouched.
    pub fn toggle_page(&mut self, page: u32) -> SelectionResult<bool> {
        let page_count = self.page_count();
        if !(1..=page_count).contains(&page) {
            self.status = Some(StatusMessage::error(format!(
                "Page {page} is out of range (1-{page_count})"
            )));
            return Err(SelectionError::PageOutOfRange { page, page_count });
        }

        let selected = self.selection.toggle(page);
        self.report_count();

        Ok(selected)
    }

    /// Adds every page in `pages` to the selection and returns how many were
    /// not already selected. Out-of-range numbers are skipped.
    pub fn select_all<I>(&mut self, pages: I) -> usize
    where
        I: IntoIterator<Item = u32>,
    {
        let page_count = self.page_count();
        let mut added = 0;

        for page in pages {
            if !(1..=page_count).contains(&page) {
                warn!("skipping page {page}: outside 1..={page_count}");
                continue;
            }
            if self.selection.insert(page) {
                added += 1;
            }
        }

        self.report_count();
        added
    }

    /// Selects every page of the active document.
    pub fn select_all_pages(&mut self) -> usize {
        self.select_all(1..=self.page_count())
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
        self.report_count();
    }

    /// Builds a PDF holding the selected pages in ascending page order and
    /// returns its bytes.
    pub fn export_selection(&mut self) -> SelectionResult<Vec<u8>> {
        self.export_selection_with(|bytes| Ok::<_, Infallible>(bytes.to_vec()))
    }

    /// Builds the export like [`Self::export_selection`] and hands the bytes
    /// to `save`. The success status is only written once `save` returns
    /// `Ok`; a failed save leaves an error status and the selection intact.
    pub fn export_selection_with<T, F, S>(&mut self, save: F) -> SelectionResult<T>
    where
        F: FnOnce(&[u8]) -> Result<T, S>,
        S: Into<Box<dyn StdError + Send + Sync>>,
    {
        if self.selection.is_empty() {
            self.status = Some(StatusMessage::error("Please select at least one page"));
            return Err(SelectionError::EmptySelection);
        }

        let Some(active) = self.active.as_ref() else {
            self.status = Some(StatusMessage::error("No PDF loaded"));
            return Err(SelectionError::NoDocument);
        };

        let pages = self.selection.sorted();
        let page_indices: Vec<u32> = pages.iter().map(|page| page - 1).collect();

        let bytes = match self.engine.extract_pages(active.handle, &page_indices) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("export from {} failed: {err}", active.name);
                self.status = Some(StatusMessage::error(format!("Error creating PDF: {err}")));
                return Err(SelectionError::Export(err));
            }
        };

        match save(&bytes) {
            Ok(saved) => {
                info!("exported pages {pages:?} from {}", active.name);
                self.status = Some(StatusMessage::success(format!(
                    "Downloaded {} pages successfully",
                    pages.len()
                )));
                Ok(saved)
            }
            Err(err) => {
                let err = err.into();
                warn!("saving export of {} failed: {err}", active.name);
                self.status = Some(StatusMessage::error(format!("Error creating PDF: {err}")));
                Err(SelectionError::Save(err))
            }
        }
    }

    /// Renders page `page` (1-based) for display as a preview.
    ///
    /// `scale` must be finite and within `(0, MAX_PREVIEW_SCALE]`.
    pub fn preview(&self, page: u32, scale: f32) -> SelectionResult<RgbaImage> {
        if !(scale.is_finite() && scale > 0.0 && scale <= MAX_PREVIEW_SCALE) {
            return Err(SelectionError::InvalidScale { scale, max: MAX_PREVIEW_SCALE });
        }

        let Some(active) = self.active.as_ref() else {
            return Err(SelectionError::NoDocument);
        };
        if !(1..=active.page_count).contains(&page) {
            return Err(SelectionError::PageOutOfRange { page, page_count: active.page_count });
        }

        self.engine
            .render_page(active.handle, RenderRequest { page_index: page - 1, scale })
            .map_err(SelectionError::Preview)
    }

    pub fn page_count(&self) -> u32 {
        self.active.as_ref().map_or(0, |active| active.page_count)
    }

    pub fn document_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn has_document(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_selected(&self, page: u32) -> bool {
        self.selection.contains(page)
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    /// Selected pages in ascending order.
    pub fn selected_pages(&self) -> Vec<u32> {
        self.selection.sorted()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    fn reset(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Err(err) = self.engine.close(previous.handle) {
                warn!("failed to close {}: {err}", previous.name);
            }
        }
        self.selection.clear();
    }

    fn report_count(&mut self) {
        self.status =
            Some(StatusMessage::success(format!("{} pages selected", self.selection.len())));
    }
}
