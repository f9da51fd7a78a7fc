//! Image discovery in a flat input directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted as images (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff"];

/// Discovers image files directly inside a directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDiscovery;

/// An image found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredImage {
    /// Full path to the file
    pub image_path: PathBuf,
    /// File name, used as the image label
    pub name: String,
}

impl ImageDiscovery {
    /// Discover supported images at a path.
    ///
    /// A file path yields itself when supported. A directory is listed without
    /// descending into subdirectories.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredImage> {
        if path.is_file() {
            return Self::to_discovered(path).into_iter().collect();
        }

        let mut images: Vec<DiscoveredImage> = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| Self::to_discovered(e.path()))
            .collect();

        // Sort by path for deterministic ordering
        images.sort_by(|a, b| a.image_path.cmp(&b.image_path));
        images
    }

    fn to_discovered(path: &Path) -> Option<DiscoveredImage> {
        if !is_supported(path) {
            return None;
        }
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(DiscoveredImage {
            image_path: path.to_path_buf(),
            name,
        })
    }
}

/// Check if a file has a supported image extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("test.jpg")));
        assert!(is_supported(Path::new("test.JPG")));
        assert!(is_supported(Path::new("test.jpeg")));
        assert!(is_supported(Path::new("test.png")));
        assert!(is_supported(Path::new("scan.TIFF")));
        assert!(is_supported(Path::new("icon.bmp")));
        assert!(is_supported(Path::new("anim.gif")));
        assert!(!is_supported(Path::new("test.webp")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("noext")));
    }

    #[test]
    fn test_discover_lists_directory_without_recursing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.png"), b"x").unwrap();

        let images = ImageDiscovery.discover(dir.path());
        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
        assert_eq!(images[1].image_path, dir.path().join("b.png"));
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpeg");
        std::fs::write(&path, b"x").unwrap();

        let images = ImageDiscovery.discover(&path);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "photo.jpeg");

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"x").unwrap();
        assert!(ImageDiscovery.discover(&txt).is_empty());
    }
}
