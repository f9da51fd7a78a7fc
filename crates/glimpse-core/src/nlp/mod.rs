//! Lightweight text analysis used by context retrieval.
//!
//! - **segment**: Rule-based sentence segmentation
//! - **pos**: Part-of-speech tagging behind the `PosTagger` trait

pub mod pos;
pub mod segment;

pub use pos::{LexiconTagger, PosTag, PosTagger, TaggedToken};
pub use segment::SentenceSegmenter;
