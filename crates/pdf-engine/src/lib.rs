use image::{ImageBuffer, Rgba};
use log::{debug, info};
use lopdf::{Document, Object};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

mod compose;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use compose::OutputDocument;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Size used when a page carries no usable media box (US Letter).
const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Page indices are 0-based throughout this trait.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Builds a new document holding copies of the given pages, in the order
    /// given, and returns its serialized bytes.
    fn extract_pages(
        &self,
        handle: DocumentHandle,
        page_indices: &[u32],
    ) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug)]
struct DocumentRecord {
    document: Document,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(bytes)?;
        let pages = document.get_pages();
        let mut page_sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = document.get_dictionary(object_id)?;
            let media_box = match dict.get(b"MediaBox") {
                Ok(media_box) => Some(media_box.clone()),
                Err(_) => compose::inherited_attributes(&document, dict)
                    .into_iter()
                    .find_map(|(key, value)| (key == b"MediaBox").then_some(value)),
            };

            let size = media_box.as_ref().and_then(page_size_from_box);
            page_sizes.push(size.unwrap_or(DEFAULT_PAGE_SIZE));
        }

        if page_sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(DocumentRecord { document, page_sizes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn page_size_from_box(object: &Object) -> Option<PageSize> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        info!("opened document {} with {} pages", handle.raw(), record.page_sizes.len());
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn extract_pages(
        &self,
        handle: DocumentHandle,
        page_indices: &[u32],
    ) -> Result<Vec<u8>, PdfEngineError> {
        let record = self.record(handle)?;
        let mut output = OutputDocument::new();

        for &page_index in page_indices {
            output.copy_page(&record.document, page_index)?;
        }

        let bytes = output.finish()?;
        debug!(
            "extracted {} pages from document {} ({} bytes)",
            page_indices.len(),
            handle.raw(),
            bytes.len()
        );

        Ok(bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Rasterizes pages with pdfium; everything else goes through lopdf.
    pub struct PdfiumEngine {
        inner: LopdfEngine,
        pdfium: Pdfium,
        sources: HashMap<DocumentHandle, Vec<u8>>,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self {
                inner: LopdfEngine::default(),
                pdfium: Pdfium::new(bindings),
                sources: HashMap::new(),
            })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            let bytes = match source {
                OpenSource::Path(path) => fs::read(path)?,
                OpenSource::Bytes(bytes) => bytes,
            };

            let handle = self.inner.open(OpenSource::Bytes(bytes.clone()))?;
            self.sources.insert(handle, bytes);
            Ok(handle)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let bytes =
                self.sources.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))?;
            let page_size = self.inner.page_size(handle, request.page_index)?;
            let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

            let document = self
                .pdfium
                .load_pdf_from_byte_slice(bytes, None)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?;
            let page = document
                .pages()
                .get(request.page_index as u16)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?;

            let config = PdfRenderConfig::new()
                .set_target_width((page_size.width_pt * scale).round().max(1.0) as i32)
                .set_target_height((page_size.height_pt * scale).round().max(1.0) as i32)
                .render_annotations(true);

            let image = page
                .render_with_config(&config)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?
                .as_image()
                .into_rgba8();

            Ok(image)
        }

        fn extract_pages(
            &self,
            handle: DocumentHandle,
            page_indices: &[u32],
        ) -> Result<Vec<u8>, PdfEngineError> {
            self.inner.extract_pages(handle, page_indices)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.sources.remove(&handle);
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_numbered(engine: &mut LopdfEngine, pages: u32) -> DocumentHandle {
        engine
            .open(OpenSource::Bytes(fixtures::numbered_pdf(pages)))
            .expect("open should succeed")
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 3);

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 3);
    }

    #[test]
    fn page_size_comes_from_media_box() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 2);

        let size = engine.page_size(handle, 1).expect("size should succeed");
        assert_eq!(
            size,
            PageSize { width_pt: fixtures::page_width(2), height_pt: fixtures::PAGE_HEIGHT }
        );

        let err = engine.page_size(handle, 2).expect_err("index 2 is past the end");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 2, page_count: 2 }));
    }

    #[test]
    fn render_page_scales_page_size() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 1);

        let image = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 0.5 })
            .expect("page should render");

        assert_eq!(image.width(), (fixtures::page_width(1) * 0.5).round() as u32);
        assert_eq!(image.height(), (fixtures::PAGE_HEIGHT * 0.5).round() as u32);
    }

    #[test]
    fn extract_pages_keeps_requested_order() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 6);

        let bytes = engine.extract_pages(handle, &[1, 4, 5]).expect("extract should succeed");

        let mut extracted = LopdfEngine::new();
        let output = extracted.open(OpenSource::Bytes(bytes)).expect("output should reopen");
        assert_eq!(extracted.page_count(output).expect("count"), 3);

        let widths: Vec<f32> = (0..3)
            .map(|index| extracted.page_size(output, index).expect("size").width_pt)
            .collect();
        assert_eq!(
            widths,
            vec![fixtures::page_width(2), fixtures::page_width(5), fixtures::page_width(6)]
        );
    }

    #[test]
    fn extract_pages_fails_for_out_of_range_index() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 2);

        let err = engine.extract_pages(handle, &[0, 7]).expect_err("index 7 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 7, page_count: 2 }));
    }

    #[test]
    fn invalid_bytes_fail_to_open() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(fixtures::invalid_pdf()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(fixtures::encrypted_marker_pdf()))
            .expect_err("encrypted documents are unsupported");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn close_releases_handle() {
        let mut engine = LopdfEngine::new();
        let handle = open_numbered(&mut engine, 1);

        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.page_count(handle), Err(PdfEngineError::InvalidHandle(_))));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }
}
