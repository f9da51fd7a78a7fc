//! Context retrieval: find document sentences that ground a caption.
//!
//! - **keywords**: Entities and subjects extracted from an image title
//! - **document**: DOCX to plain text
//! - **select**: Threshold and relaxation policy over similarities
//! - **clean**: Normalization of the joined context
//! - **builder**: The end-to-end lookup

pub mod builder;
pub mod clean;
pub mod document;
pub mod keywords;
pub mod select;

pub use builder::{ContextBuilder, ContextResult};
pub use clean::ContextCleaner;
pub use document::{convert_docx_to_txt, DocxReader};
pub use keywords::{build_keywords, extract_entities, extract_subjects, KeywordRules};
pub use select::{select_paragraphs, RelaxPolicy};
