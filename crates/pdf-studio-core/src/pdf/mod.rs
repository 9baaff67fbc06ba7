mod assemble;
mod document;
mod page_index;
mod render;

pub use assemble::assemble_pages;
pub use document::{PageSize, PdfDocument};
pub use page_index::PageIndex;
pub use render::{PageRenderer, render_page_from_file};
