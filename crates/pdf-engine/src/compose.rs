//! Output document builder used for page extraction.
//!
//! Pages are copied one at a time from a source [`lopdf::Document`]. Every
//! object reachable from a copied page is imported under a fresh object id,
//! and objects shared between pages are imported only once.

use crate::PdfEngineError;
use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

pub struct OutputDocument {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    imported: HashMap<ObjectId, ObjectId>,
    pending: Vec<(ObjectId, ObjectId)>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();

        Self {
            document,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Appends a copy of the page at `page_index` (0-based) in `source`.
    ///
    /// Object ids are remembered between calls, so every page copied into one
    /// builder must come from the same source document.
    pub fn copy_page(&mut self, source: &Document, page_index: u32) -> Result<(), PdfEngineError> {
        let pages = source.get_pages();
        let page_count = pages.len() as u32;
        let source_id = pages
            .get(&(page_index + 1))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page: page_index, page_count })?;

        let mut page = source.get_dictionary(source_id)?.clone();
        for (key, value) in inherited_attributes(source, &page) {
            page.set(key, value);
        }
        page.remove(b"Parent");

        let target_id = match self.imported.get(&source_id) {
            Some(id) => *id,
            None => {
                let id = self.document.new_object_id();
                self.imported.insert(source_id, id);
                id
            }
        };

        let mut copied = self.import_dictionary(source, &page);
        copied.set("Parent", Object::Reference(self.pages_id));
        self.document.objects.insert(target_id, Object::Dictionary(copied));
        self.import_pending(source);
        self.kids.push(target_id);

        debug!("copied source page {} as object {:?}", page_index + 1, target_id);

        Ok(())
    }

    /// Writes the page tree and catalog and serializes the document.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfEngineError> {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        self.document.objects.insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.document.add_object(Object::Dictionary(catalog));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        self.document.save_to(&mut bytes)?;

        Ok(bytes)
    }

    fn import(&mut self, source: &Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.import_reference(source, *id),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.import(source, item)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(source, dict)),
            Object::Stream(stream) => {
                let dict = self.import_dictionary(source, &stream.dict);
                let mut copied: Stream = stream.clone();
                copied.dict = dict;
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, source: &Document, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.import(source, value));
        }

        copied
    }

    /// Maps `id` to its id in the output. The object body is copied later by
    /// [`Self::import_pending`], so reference chains never deepen the stack.
    fn import_reference(&mut self, source: &Document, id: ObjectId) -> Object {
        if let Some(target) = self.imported.get(&id) {
            return Object::Reference(*target);
        }

        let Ok(object) = source.get_object(id) else {
            return Object::Null;
        };

        // Page tree nodes and the catalog never travel with a page, and neither
        // do pages that are not copied (link targets and the like).
        if matches!(object.type_name(), Ok("Pages") | Ok("Catalog") | Ok("Page")) {
            return Object::Null;
        }

        let target = self.document.new_object_id();
        self.imported.insert(id, target);
        self.pending.push((id, target));

        Object::Reference(target)
    }

    fn import_pending(&mut self, source: &Document) {
        while let Some((source_id, target_id)) = self.pending.pop() {
            let copied = match source.get_object(source_id) {
                Ok(object) => self.import(source, object),
                Err(_) => Object::Null,
            };
            self.document.objects.insert(target_id, copied);
        }
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Inheritable attributes missing on `page` that one of its ancestors defines.
pub(crate) fn inherited_attributes(source: &Document, page: &Dictionary) -> Vec<(Vec<u8>, Object)> {
    let mut found = Vec::new();

    for key in INHERITABLE_KEYS {
        if page.has(key) {
            continue;
        }

        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                break;
            }

            let Ok(node) = source.get_dictionary(parent_id) else {
                break;
            };

            if let Ok(value) = node.get(key) {
                found.push((key.to_vec(), value.clone()));
                break;
            }

            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    found
}
