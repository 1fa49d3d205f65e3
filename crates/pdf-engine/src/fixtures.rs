//! Generated PDF documents for tests.
//!
//! Enabled for this crate's own tests and, through the `fixtures` feature,
//! for the dev-dependencies of the other workspace crates.

use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

/// Width in points of the media box given to page `page_number` (1-based).
pub fn page_width(page_number: u32) -> f32 {
    500.0 + page_number as f32 * 10.0
}

pub const PAGE_HEIGHT: f32 = 792.0;

/// A document with `page_count` pages whose content streams draw the text
/// `Page <n>`. Resources live on the page tree root and are inherited, and a
/// single font object is shared by every page.
pub fn numbered_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut kids = Vec::new();
    for page_number in 1..=page_count {
        let content = format!("BT /F1 24 Tf 72 720 Td (Page {page_number}) Tj ET");
        let content_id =
            doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_width(page_number)),
                Object::Real(PAGE_HEIGHT),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        page.set(
            "Annots",
            Object::Array(vec![Object::Dictionary(note_annotation(page_number))]),
        );

        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(page_count as i64));
    pages.set("Kids", Object::Array(kids));
    pages.set("Resources", Object::Dictionary(resources));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document should serialize");
    bytes
}

/// A well-formed document whose bytes carry an `/Encrypt` marker.
pub fn encrypted_marker_pdf() -> Vec<u8> {
    let mut bytes = numbered_pdf(1);
    bytes.extend_from_slice(b"% /Encrypt\n");
    bytes
}

/// Bytes that are not a PDF at all.
pub fn invalid_pdf() -> Vec<u8> {
    b"this is not a pdf document\n".to_vec()
}

fn note_annotation(page_number: u32) -> Dictionary {
    let mut note = Dictionary::new();
    note.set("Type", Object::Name(b"Annot".to_vec()));
    note.set("Subtype", Object::Name(b"Text".to_vec()));
    note.set(
        "Contents",
        Object::String(format!("note on page {page_number}").into_bytes(), StringFormat::Literal),
    );
    note.set(
        "Rect",
        Object::Array(vec![
            Object::Integer(20),
            Object::Integer(20),
            Object::Integer(40),
            Object::Integer(40),
        ]),
    );
    note
}
