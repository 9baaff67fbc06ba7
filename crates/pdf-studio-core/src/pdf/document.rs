use std::path::Path;

use mupdf::Document as MuDocument;
use serde::{Deserialize, Serialize};

use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// Page dimensions in PDF points (1/72 inch), rounded to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// A source PDF loaded into memory for geometry queries and rendering
pub struct PdfDocument {
    /// The raw PDF bytes
    bytes: Vec<u8>,
    /// Number of pages
    page_count: usize,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        Ok(Self {
            bytes,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }

    /// Unscaled size of every page, in page order
    pub fn page_sizes(&self) -> Result<Vec<PageSize>> {
        let doc = self.open_document()?;
        (0..self.page_count)
            .map(|page| {
                let page = u32::try_from(page).map_err(|_| Error::PdfInvalidPage {
                    page,
                    total: self.page_count,
                })?;
                page_size_of(&doc, PageIndex::checked(page, self.page_count)?)
            })
            .collect()
    }
}

pub(crate) fn page_size_of(doc: &MuDocument, index: PageIndex) -> Result<PageSize> {
    let page = doc.load_page(index.as_i32()).map_err(|e| Error::PdfRender {
        page: index.as_usize(),
        reason: format!("Failed to load page: {e}"),
    })?;

    let bounds = page.bounds().map_err(|e| Error::PdfRender {
        page: index.as_usize(),
        reason: format!("Failed to get bounds: {e}"),
    })?;

    Ok(PageSize {
        width: super::render::f32_to_u32((bounds.x1 - bounds.x0).round()),
        height: super::render::f32_to_u32((bounds.y1 - bounds.y0).round()),
    })
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object};

    fn pdf_bytes(sizes: &[(i64, i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = sizes
            .iter()
            .map(|&(w, h)| {
                Object::Reference(doc.add_object(Dictionary::from_iter([
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                    (
                        "MediaBox",
                        Object::Array(vec![0.into(), 0.into(), w.into(), h.into()]),
                    ),
                ])))
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(i64::try_from(kids.len()).unwrap())),
                ("Kids", Object::Array(kids)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_page_sizes_in_page_order() {
        let doc = PdfDocument::from_bytes(pdf_bytes(&[(612, 792), (842, 595)])).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(
            doc.page_sizes().unwrap(),
            vec![
                PageSize { width: 612, height: 792 },
                PageSize { width: 842, height: 595 },
            ]
        );
    }

    #[test]
    fn test_garbage_is_open_error() {
        let err = PdfDocument::from_bytes(b"not a pdf".to_vec()).unwrap_err();
        assert!(matches!(err, Error::PdfOpen(_)));
    }
}
