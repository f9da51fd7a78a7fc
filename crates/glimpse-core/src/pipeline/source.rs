//! Image sources: local paths and remote URLs.
//!
//! Remote images are fetched with a plain GET. A non-2xx response, a network
//! error, or undecodable bytes fail the load; there is no retry here.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

use super::decode::{format_to_string, DecodedImage, ImageDecoder};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Local(PathBuf),
    Remote(String),
}

impl ImageSource {
    /// Classify a path-or-URL string.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Remote(trimmed.to_string())
        } else {
            ImageSource::Local(PathBuf::from(trimmed))
        }
    }

    /// Label used in logs, errors, and output records.
    pub fn label(&self) -> String {
        match self {
            ImageSource::Local(path) => path.display().to_string(),
            ImageSource::Remote(url) => url.clone(),
        }
    }

    /// Final path or URL segment.
    pub fn name(&self) -> String {
        match self {
            ImageSource::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ImageSource::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(without_query)
                    .to_string()
            }
        }
    }
}

/// Split a separator-joined list of image paths or URLs.
pub fn parse_image_list(value: &str, separator: &str) -> Vec<ImageSource> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ImageSource::parse)
        .collect()
}

/// A loaded image with its original bytes (needed by vision-language backends).
pub struct LoadedImage {
    pub source: ImageSource,
    pub bytes: Arc<[u8]>,
    pub decoded: DecodedImage,
}

impl LoadedImage {
    /// Lowercase format name ("jpeg", "png", ...).
    pub fn format_name(&self) -> String {
        format_to_string(self.decoded.format)
    }
}

/// Reads or fetches images and decodes them to RGB.
pub struct ImageLoader {
    decoder: ImageDecoder,
    client: reqwest::Client,
    fetch_timeout: Duration,
    max_file_size_mb: u64,
}

impl ImageLoader {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits.clone()),
            client: reqwest::Client::new(),
            fetch_timeout: Duration::from_millis(limits.fetch_timeout_ms),
            max_file_size_mb: limits.max_file_size_mb,
        }
    }

    /// Load one image.
    pub async fn load(&self, source: &ImageSource) -> Result<LoadedImage, PipelineError> {
        let bytes: Arc<[u8]> = match source {
            ImageSource::Local(path) => self.read_local(path).await?,
            ImageSource::Remote(url) => self.fetch(url).await?,
        }
        .into();
        let label = PathBuf::from(source.label());
        let decoded = self.decoder.decode(Arc::clone(&bytes), &label).await?;
        tracing::debug!(
            "Loaded {} ({}x{}, {})",
            source.label(),
            decoded.width,
            decoded.height,
            format_to_string(decoded.format)
        );
        Ok(LoadedImage {
            source: source.clone(),
            bytes,
            decoded,
        })
    }

    fn max_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    fn too_large(&self, label: &str, size: u64) -> PipelineError {
        PipelineError::FileTooLarge {
            path: PathBuf::from(label),
            size_mb: size / (1024 * 1024),
            max_mb: self.max_file_size_mb,
        }
    }

    async fn read_local(&self, path: &Path) -> Result<Vec<u8>, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read metadata: {e}"),
            })?;
        if metadata.len() > self.max_bytes() {
            return Err(self.too_large(&path.display().to_string(), metadata.len()));
        }
        tokio::fs::read(path).await.map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {e}"),
        })
    }

    /// GET a remote image. The declared length is checked up front and the
    /// body is read chunk by chunk, so an oversized or lying server is cut
    /// off at the limit.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let mut resp = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        let max_bytes = self.max_bytes();
        if let Some(declared) = resp.content_length() {
            if declared > max_bytes {
                return Err(self.too_large(url, declared));
            }
        }

        let mut body = Vec::with_capacity(resp.content_length().unwrap_or(0) as usize);
        while let Some(chunk) = resp.chunk().await.map_err(|e| PipelineError::Fetch {
            url: url.to_string(),
            message: format!("Failed to read body: {e}"),
            status_code: None,
        })? {
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(self.too_large(url, (body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, serve_http};

    #[test]
    fn test_parse_distinguishes_urls() {
        assert_eq!(
            ImageSource::parse("https://example.org/a.jpg"),
            ImageSource::Remote("https://example.org/a.jpg".to_string())
        );
        assert_eq!(
            ImageSource::parse("http://example.org/a.jpg"),
            ImageSource::Remote("http://example.org/a.jpg".to_string())
        );
        assert_eq!(
            ImageSource::parse("images/httpd.png"),
            ImageSource::Local(PathBuf::from("images/httpd.png"))
        );
    }

    #[test]
    fn test_name_strips_query() {
        let source = ImageSource::parse("https://example.org/img/cat.png?size=large");
        assert_eq!(source.name(), "cat.png");
        let local = ImageSource::parse("/data/images/dog.jpg");
        assert_eq!(local.name(), "dog.jpg");
    }

    #[test]
    fn test_parse_image_list() {
        let list = parse_image_list("a.jpg, https://x.org/b.png,, c.gif", ",");
        assert_eq!(list.len(), 3);
        assert!(matches!(list[1], ImageSource::Remote(_)));
    }

    #[tokio::test]
    async fn test_load_local_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, png_bytes(5, 7)).unwrap();

        let loader = ImageLoader::new(&LimitsConfig::default());
        let loaded = loader.load(&ImageSource::Local(path)).await.unwrap();
        assert_eq!(loaded.decoded.width, 5);
        assert_eq!(loaded.decoded.height, 7);
        assert_eq!(loaded.format_name(), "png");
        assert!(!loaded.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = ImageLoader::new(&LimitsConfig::default());
        let err = loader
            .load(&ImageSource::Local(PathBuf::from("/nonexistent/x.png")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_load_remote_image() {
        let base = serve_http(vec![(200, png_bytes(3, 3))]).await;
        let loader = ImageLoader::new(&LimitsConfig::default());
        let source = ImageSource::parse(&format!("{base}/img/red.png"));
        let loaded = loader.load(&source).await.unwrap();
        assert_eq!(loaded.decoded.width, 3);
        assert_eq!(loaded.source.name(), "red.png");
    }

    #[tokio::test]
    async fn test_remote_error_status_is_fetch_error() {
        let base = serve_http(vec![(404, b"{}".to_vec())]).await;
        let loader = ImageLoader::new(&LimitsConfig::default());
        let err = loader
            .load(&ImageSource::parse(&format!("{base}/missing.jpg")))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::Fetch {
                status_code: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_local_file_over_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::write(&path, vec![0u8; 1024 * 1024 + 1]).unwrap();

        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let err = ImageLoader::new(&limits)
            .load(&ImageSource::Local(path))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::FileTooLarge { max_mb: 1, .. }));
    }

    #[tokio::test]
    async fn test_remote_body_over_size_limit() {
        let base = serve_http(vec![(200, vec![0u8; 2 * 1024 * 1024])]).await;
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let err = ImageLoader::new(&limits)
            .load(&ImageSource::parse(&format!("{base}/big.jpg")))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::FileTooLarge {
                size_mb: 2,
                max_mb: 1,
                ..
            }
        ));
    }
}
