use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::color_utils::symbols;

/// How strictly input sources are validated.
///
/// Strict mode fails on unsupported or missing inputs; permissive mode warns
/// and keeps going with whatever it can find.
#[derive(Debug, Clone, Copy)]
pub struct ImageInputConfig {
    pub strict_mode: bool,
}

impl ImageInputConfig {
    pub fn from_strict_flag(strict: bool) -> Self {
        Self { strict_mode: strict }
    }
}

/// Check if a file has a supported image extension
/// (jpg, jpeg, png, webp, bmp, tiff, tif).
pub fn is_supported_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            matches!(
                ext.to_string_lossy().to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" | "tif"
            )
        })
        .unwrap_or(false)
}

/// Find all image files directly inside a directory (non-recursive), sorted.
pub fn find_images_in_directory(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();

    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image_file(&path) {
            image_files.push(path);
        }
    }

    image_files.sort();
    Ok(image_files)
}

fn looks_like_glob(source: &str) -> bool {
    source.contains('*') || source.contains('?') || source.contains('[')
}

/// Resolve input sources (files, directories, or glob patterns) into a
/// sorted, deduplicated list of image paths.
pub fn collect_images_from_sources(
    sources: &[String],
    config: &ImageInputConfig,
) -> Result<Vec<PathBuf>> {
    let mut all_image_files = Vec::new();

    for source in sources {
        let source_path = Path::new(source);

        if source_path.is_file() {
            if is_supported_image_file(source_path) {
                all_image_files.push(source_path.to_path_buf());
            } else if config.strict_mode {
                anyhow::bail!(
                    "File is not a supported image format: {}",
                    source_path.display()
                );
            }
        } else if source_path.is_dir() {
            all_image_files.extend(find_images_in_directory(source_path)?);
        } else if looks_like_glob(source) {
            let mut found_any = false;
            for path in glob::glob(source)?.flatten() {
                if path.is_file() && is_supported_image_file(&path) {
                    all_image_files.push(path);
                    found_any = true;
                }
            }
            if !found_any && config.strict_mode {
                anyhow::bail!("No image files found matching pattern: {source}");
            }
        } else if config.strict_mode {
            anyhow::bail!("File does not exist: {source}");
        } else {
            log::warn!("{} File does not exist: {source}", symbols::warning());
        }
    }

    all_image_files.sort();
    all_image_files.dedup();

    if all_image_files.is_empty() && config.strict_mode {
        anyhow::bail!("No image files found in the specified sources");
    }

    Ok(all_image_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_is_supported_image_file() {
        assert!(is_supported_image_file(Path::new("test.jpg")));
        assert!(is_supported_image_file(Path::new("test.PNG")));
        assert!(is_supported_image_file(Path::new("test.webp")));

        assert!(!is_supported_image_file(Path::new("test.txt")));
        assert!(!is_supported_image_file(Path::new("test.gif")));
        assert!(!is_supported_image_file(Path::new("test")));
    }

    #[test]
    fn test_find_images_in_directory() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        fs::write(dir_path.join("image1.jpg"), b"fake image").unwrap();
        fs::write(dir_path.join("image2.png"), b"fake image").unwrap();
        fs::write(dir_path.join("not_image.txt"), b"text file").unwrap();

        let images = find_images_in_directory(dir_path).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.iter().any(|p| p.file_name().unwrap() == "image1.jpg"));
        assert!(images.iter().any(|p| p.file_name().unwrap() == "image2.png"));
    }

    #[test]
    fn test_strict_mode_rejects_unsupported_file() {
        let temp_dir = tempdir().unwrap();
        let text_path = temp_dir.path().join("test.txt");
        fs::write(&text_path, b"text file").unwrap();

        let config = ImageInputConfig::from_strict_flag(true);
        let sources = vec![text_path.to_string_lossy().to_string()];
        assert!(collect_images_from_sources(&sources, &config).is_err());
    }

    #[test]
    fn test_permissive_mode_skips_unsupported_file() {
        let temp_dir = tempdir().unwrap();
        let image_path = temp_dir.path().join("test.jpg");
        let text_path = temp_dir.path().join("test.txt");
        fs::write(&image_path, b"fake image").unwrap();
        fs::write(&text_path, b"text file").unwrap();

        let config = ImageInputConfig::from_strict_flag(false);
        let sources = vec![
            image_path.to_string_lossy().to_string(),
            text_path.to_string_lossy().to_string(),
        ];
        let result = collect_images_from_sources(&sources, &config).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_directory_source() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        fs::write(dir_path.join("image1.jpg"), b"fake image").unwrap();
        fs::write(dir_path.join("image2.png"), b"fake image").unwrap();

        let config = ImageInputConfig::from_strict_flag(true);
        let sources = vec![dir_path.to_string_lossy().to_string()];
        let result = collect_images_from_sources(&sources, &config).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_duplicate_sources_deduplicated() {
        let temp_dir = tempdir().unwrap();
        let image_path = temp_dir.path().join("test.jpg");
        fs::write(&image_path, b"fake image").unwrap();

        let config = ImageInputConfig::from_strict_flag(true);
        let source = image_path.to_string_lossy().to_string();
        let result = collect_images_from_sources(&[source.clone(), source], &config).unwrap();
        assert_eq!(result.len(), 1);
    }
}
