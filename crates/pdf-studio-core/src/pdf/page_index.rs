//! Page index newtype shared by the mupdf and lopdf code paths.
//!
//! Page references store a zero-based `u32`. mupdf addresses pages with a
//! zero-based `i32`, lopdf with a one-based `u32` page number. `PageIndex`
//! is only constructed after a bounds check against the document, so every
//! conversion out of it is lossless.

use crate::error::Error;

/// A zero-based page index validated against a document's page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Validate `page` against `total_pages`.
    ///
    /// Fails if the page is past the end or does not fit mupdf's `i32`.
    pub fn checked(page: u32, total_pages: usize) -> Result<Self, Error> {
        let out_of_range = || Error::PdfInvalidPage {
            page: page as usize,
            total: total_pages,
        };

        if page as usize >= total_pages {
            return Err(out_of_range());
        }

        i32::try_from(page).map(Self).map_err(|_| out_of_range())
    }

    /// Index for mupdf's `load_page`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Index for Rust collections and error messages.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // never negative, see `checked`
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// One-based page number used as the key of lopdf's `get_pages()`.
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        self.0.unsigned_abs() + 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_within_bounds() {
        let idx = PageIndex::checked(4, 5).unwrap();
        assert_eq!(idx.as_i32(), 4);
        assert_eq!(idx.as_usize(), 4);
    }

    #[test]
    fn test_checked_past_end() {
        let err = PageIndex::checked(5, 5).unwrap_err();
        assert!(matches!(err, Error::PdfInvalidPage { page: 5, total: 5 }));
    }

    #[test]
    fn test_checked_rejects_huge_index() {
        assert!(PageIndex::checked(u32::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_lopdf_page_number_is_one_based() {
        assert_eq!(PageIndex::checked(0, 1).unwrap().as_lopdf_page_number(), 1);
        assert_eq!(PageIndex::checked(6, 7).unwrap().as_lopdf_page_number(), 7);
    }
}
