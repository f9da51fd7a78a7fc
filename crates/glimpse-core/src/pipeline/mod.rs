//! Image input stages.
//!
//! - **discovery**: Find images in the input directory
//! - **source**: Classify paths and URLs, read or fetch bytes
//! - **decode**: Detect format, decode to RGB, enforce limits

pub mod decode;
pub mod discovery;
pub mod source;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredImage, ImageDiscovery, SUPPORTED_EXTENSIONS};
pub use source::{parse_image_list, ImageLoader, ImageSource, LoadedImage};
