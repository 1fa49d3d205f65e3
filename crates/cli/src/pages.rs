use anyhow::{bail, Context, Result};

/// Parses a page list such as `5,2,8` or `1-3,7` into 1-based page numbers.
///
/// Ranges are inclusive and every page must be at most `page_count`. Order
/// and duplicates are kept as written; the selection deduplicates and export
/// sorts.
pub fn parse_page_list(spec: &str, page_count: u32) -> Result<Vec<u32>> {
    let mut pages = Vec::new();

    for part in spec.split(',').map(str::trim) {
        if part.is_empty() {
            bail!("empty entry in page list {spec:?}");
        }

        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_page(start.trim())?;
                let end = parse_page(end.trim())?;
                if start > end {
                    bail!("page range {part} runs backwards");
                }
                ensure_in_document(end, page_count)?;
                pages.extend(start..=end);
            }
            None => {
                let page = parse_page(part)?;
                ensure_in_document(page, page_count)?;
                pages.push(page);
            }
        }
    }

    Ok(pages)
}

fn parse_page(text: &str) -> Result<u32> {
    let page: u32 = text.parse().with_context(|| format!("not a page number: {text:?}"))?;
    if page == 0 {
        bail!("page numbers are 1-based and must be >= 1");
    }
    Ok(page)
}

fn ensure_in_document(page: u32, page_count: u32) -> Result<()> {
    if page > page_count {
        bail!("page {page} out of range (document has {page_count} pages)");
    }
    Ok(())
}
