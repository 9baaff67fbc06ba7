//! Page-level PDF assembly with lopdf.
//!
//! Builds one document out of individual pages picked from any number of
//! source files, in the order given. The same page may appear more than once.
//!
//! Each selected page is taken from a fresh copy of its source whose objects
//! are renumbered past everything already collected, so repeated pages never
//! share object ids. Page attributes that PDF allows a page to inherit from
//! its ancestors (`MediaBox`, `CropBox`, `Resources`, `Rotate`) are copied onto
//! the page first, because the source page tree is not carried over.
//! Objects only reachable from pages that were not selected are pruned at the
//! end.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::page_index::PageIndex;
use crate::error::{Error, Result};

const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// Assemble `(file, zero-based page index)` selections into a new document
/// and save it to `output`. Returns the number of pages written.
pub fn assemble_pages(selections: &[(&Path, u32)], output: &Path) -> Result<usize> {
    if selections.is_empty() {
        return Err(Error::MergeFailed("No page sources provided".to_string()));
    }

    let mut sources: HashMap<PathBuf, Document> = HashMap::new();
    let mut max_id: u32 = 1;
    let mut page_objects: Vec<(ObjectId, Dictionary)> = Vec::with_capacity(selections.len());
    let mut document = Document::with_version("1.5");

    for (position, &(path, page)) in selections.iter().enumerate() {
        if !sources.contains_key(path) {
            let loaded = Document::load(path).map_err(|e| {
                Error::Lopdf(format!("Failed to load {}: {}", path.display(), e))
            })?;
            sources.insert(path.to_path_buf(), loaded);
        }
        let Some(source) = sources.get(path) else {
            continue;
        };

        let index = PageIndex::checked(page, source.get_pages().len()).map_err(|_| {
            Error::MergeFailed(format!(
                "item {position}: page {page} out of range for {}",
                path.display()
            ))
        })?;

        let mut doc = source.clone();
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_id = *doc
            .get_pages()
            .get(&index.as_lopdf_page_number())
            .ok_or_else(|| Error::Lopdf(format!("page {page} missing from page tree")))?;

        let mut page_dict = doc
            .get_dictionary(page_id)
            .map_err(|e| Error::Lopdf(format!("Failed to read page {page}: {e}")))?
            .clone();
        inherit_attributes(&doc, page_id, &mut page_dict);
        page_objects.push((page_id, page_dict));

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    document.objects.insert(object_id, object);
                }
            }
        }
    }

    document.max_id = max_id;
    let pages_id = document.new_object_id();

    let kids: Vec<Object> = page_objects
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let page_count = kids.len();

    for (page_id, mut dict) in page_objects {
        dict.set("Parent", Object::Reference(pages_id));
        dict.remove(b"StructParents");
        document.objects.insert(page_id, Object::Dictionary(dict));
    }

    let pages_dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(i64::try_from(page_count).unwrap_or(i64::MAX))),
    ]);
    document.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = document.new_object_id();
    let catalog = Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    document.objects.insert(catalog_id, Object::Dictionary(catalog));
    document.trailer.set("Root", Object::Reference(catalog_id));

    let pruned = document.prune_objects();
    document.renumber_objects();
    document.compress();

    document
        .save(output)
        .map_err(|e| Error::Lopdf(format!("Failed to save {}: {}", output.display(), e)))?;

    debug!(
        "Assembled {} pages from {} files into {} ({} unused objects pruned)",
        page_count,
        sources.len(),
        output.display(),
        pruned.len()
    );

    Ok(page_count)
}

/// Copy inheritable attributes the page lacks from its nearest ancestor.
fn inherit_attributes(doc: &Document, page_id: ObjectId, page: &mut Dictionary) {
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH || node_id == page_id {
            break;
        }
        depth += 1;

        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                page.set(key.to_vec(), value.clone());
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// One-page-per-width document; widths live on the page tree when `inherited`.
    fn write_pdf(path: &Path, widths: &[i64], inherited: bool) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = widths
            .iter()
            .map(|&w| {
                let mut page = Dictionary::from_iter([
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                ]);
                if !inherited {
                    page.set(
                        "MediaBox",
                        Object::Array(vec![0.into(), 0.into(), w.into(), 792.into()]),
                    );
                }
                Object::Reference(doc.add_object(page))
            })
            .collect();

        let mut tree = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(i64::try_from(kids.len()).unwrap())),
            ("Kids", Object::Array(kids)),
        ]);
        if inherited {
            tree.set(
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), widths[0].into(), 792.into()]),
            );
        }
        doc.objects.insert(pages_id, Object::Dictionary(tree));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).unwrap();
    }

    fn widths(path: &Path) -> Vec<i64> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let media_box = doc.get_dictionary(id).unwrap().get(b"MediaBox").unwrap();
                media_box.as_array().unwrap()[2].as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_assemble_follows_selection_order() {
        let dir = tempfile::tempdir().unwrap();
        let x = dir.path().join("x.pdf");
        let y = dir.path().join("y.pdf");
        write_pdf(&x, &[100, 110], false);
        write_pdf(&y, &[200, 210, 220], false);

        let out = dir.path().join("out.pdf");
        let count = assemble_pages(&[(&x, 0), (&y, 2), (&x, 1)], &out).unwrap();

        assert_eq!(count, 3);
        assert_eq!(widths(&out), vec![100, 220, 110]);
    }

    #[test]
    fn test_assemble_allows_repeated_pages() {
        let dir = tempfile::tempdir().unwrap();
        let x = dir.path().join("x.pdf");
        write_pdf(&x, &[100, 110], false);

        let out = dir.path().join("out.pdf");
        assemble_pages(&[(&x, 1), (&x, 1), (&x, 0)], &out).unwrap();
        assert_eq!(widths(&out), vec![110, 110, 100]);
    }

    #[test]
    fn test_assemble_flattens_inherited_media_box() {
        let dir = tempfile::tempdir().unwrap();
        let x = dir.path().join("x.pdf");
        write_pdf(&x, &[300, 300], true);

        let out = dir.path().join("out.pdf");
        assemble_pages(&[(&x, 1)], &out).unwrap();
        assert_eq!(widths(&out), vec![300]);
    }

    #[test]
    fn test_assemble_rejects_out_of_range_page() {
        let dir = tempfile::tempdir().unwrap();
        let x = dir.path().join("x.pdf");
        write_pdf(&x, &[100], false);

        let err = assemble_pages(&[(&x, 3)], &dir.path().join("out.pdf")).unwrap_err();
        assert!(matches!(err, Error::MergeFailed(_)));
    }

    #[test]
    fn test_assemble_rejects_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(assemble_pages(&[], &dir.path().join("out.pdf")).is_err());
    }
}
