//! Turning fetched or read bytes into RGB pixels.
//!
//! The format is sniffed from the content, so a PNG saved as `.jpg` or a URL
//! without an extension still decodes. Decoding runs on the blocking pool
//! under `limits.decode_timeout_ms`, and images wider or taller than
//! `limits.max_image_dimension` are refused after the header is read.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Decodes image bytes for the feature encoder and vision captioners.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Pixels plus what the format sniffing found. Pixels are always RGB8.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode shared bytes. `label` names the image in errors: a path for
    /// local files, the URL for remote ones.
    pub async fn decode(
        &self,
        bytes: Arc<[u8]>,
        label: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let owned_label = label.to_path_buf();
        let budget = Duration::from_millis(self.limits.decode_timeout_ms);

        let task = tokio::task::spawn_blocking(move || decode_rgb(&bytes, &owned_label));
        let decoded = match tokio::time::timeout(budget, task).await {
            Err(_) => {
                return Err(PipelineError::Timeout {
                    path: label.to_path_buf(),
                    stage: "decode".to_string(),
                    timeout_ms: self.limits.decode_timeout_ms,
                })
            }
            Ok(Err(join)) => {
                return Err(PipelineError::Decode {
                    path: label.to_path_buf(),
                    message: format!("Decode task failed: {join}"),
                })
            }
            Ok(Ok(result)) => result?,
        };

        let max_dim = self.limits.max_image_dimension;
        if decoded.width > max_dim || decoded.height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: label.to_path_buf(),
                width: decoded.width,
                height: decoded.height,
                max_dim,
            });
        }
        Ok(decoded)
    }
}

/// Sniff, decode, and flatten to RGB8.
///
/// When sniffing fails the label's extension is the last resort, which
/// matters for a few TIFF and BMP variants.
fn decode_rgb(bytes: &[u8], label: &Path) -> Result<DecodedImage, PipelineError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            path: label.to_path_buf(),
            message: format!("Cannot sniff image format: {e}"),
        })?;

    let format = match reader.format() {
        Some(format) => format,
        None => ImageFormat::from_path(label).map_err(|_| PipelineError::UnsupportedFormat {
            path: label.to_path_buf(),
            format: label
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })?,
    };

    let image = reader.decode().map_err(|e| PipelineError::Decode {
        path: label.to_path_buf(),
        message: e.to_string(),
    })?;
    let (width, height) = image.dimensions();

    Ok(DecodedImage {
        image: DynamicImage::ImageRgb8(image.to_rgb8()),
        format,
        width,
        height,
    })
}

/// Lowercase format name as recorded in logs and sent to caption backends.
pub fn format_to_string(format: ImageFormat) -> String {
    let name = match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::WebP => "webp",
        _ => "unknown",
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::png_bytes;
    use image::RgbaImage;

    #[test]
    fn test_caption_backend_format_names() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::Tiff), "tiff");
        assert_eq!(format_to_string(ImageFormat::Avif), "unknown");
    }

    #[test]
    fn test_misnamed_photo_is_sniffed() {
        let decoded = decode_rgb(&png_bytes(4, 3), Path::new("puerto.jpg")).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (4, 3));
    }

    #[test]
    fn test_alpha_channel_is_flattened() {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 128]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let decoded = decode_rgb(buf.get_ref(), Path::new("logo.png")).unwrap();
        assert!(matches!(decoded.image, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_truncated_png_is_a_decode_error() {
        let truncated = [0x89, 0x50, 0x4E, 0x47, 0, 0];
        assert!(decode_rgb(&truncated, Path::new("cut.png")).is_err());
    }

    #[tokio::test]
    async fn test_panorama_over_dimension_limit() {
        let decoder = ImageDecoder::new(LimitsConfig {
            max_image_dimension: 8,
            ..LimitsConfig::default()
        });
        let err = decoder
            .decode(png_bytes(16, 4).into(), Path::new("panorama.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 16, .. }));
    }

    #[tokio::test]
    async fn test_remote_label_reported_on_failure() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let label = Path::new("https://example.org/broken.png");
        let err = decoder
            .decode(b"not an image".to_vec().into(), label)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("example.org/broken.png"));
    }
}
