//! File helpers for prompts, reference images, generated images and metadata.

use crate::{
    config::defaults,
    error::{DndigError, Result},
    models::SessionMetadata,
};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub fn read_text_file(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            log::debug!("Read {} bytes from {}", content.len(), path.display());
            Ok(content)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::error!("File not found: {}", path.display());
            Err(DndigError::missing_file("File", path))
        }
        Err(e) => {
            log::error!("Error reading file {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

pub fn read_binary_file(path: &Path) -> Result<Vec<u8>> {
    let path = sanitize_path(path, None)?;
    log::debug!("Reading binary file: {}", path.display());
    std::fs::read(&path).map_err(|e| {
        log::error!("Error reading file {}: {}", path.display(), e);
        if e.kind() == ErrorKind::NotFound {
            DndigError::missing_file("File", &path)
        } else {
            e.into()
        }
    })
}

pub async fn save_binary_file(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data).await.map_err(|e| {
        log::error!("Error writing file {}: {}", path.display(), e);
        DndigError::from(e)
    })?;
    log::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

pub fn ensure_directory_exists(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        log::error!("Error creating directory {}: {}", dir.display(), e);
        DndigError::from(e)
    })?;
    log::debug!("Ensured directory exists: {}", dir.display());
    Ok(())
}

pub fn validate_file_exists(path: &Path, what: &'static str) -> Result<()> {
    if !path.exists() {
        return Err(DndigError::missing_file(what, path));
    }
    log::debug!("Validated file exists: {}", path.display());
    Ok(())
}

/// Makes `path` absolute and lexically normalised, rejecting it when it
/// falls outside `base_dir`.
pub fn sanitize_path(path: &Path, base_dir: Option<&Path>) -> Result<PathBuf> {
    let absolute = absolutize(path)?;

    if let Some(base_dir) = base_dir {
        let base = absolutize(base_dir)?;
        if !absolute.starts_with(&base) {
            return Err(DndigError::Internal(format!(
                "Path '{}' is outside allowed directory '{}'",
                path.display(),
                base_dir.display()
            )));
        }
    }

    log::debug!("Sanitized path: {} -> {}", path.display(), absolute.display());
    Ok(absolute)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute paths pass through; relative ones are joined onto `base_dir`.
pub fn resolve_reference_path(reference: &str, base_dir: &Path) -> PathBuf {
    let reference_path = Path::new(reference);
    if reference_path.is_absolute() {
        return reference_path.to_path_buf();
    }

    let resolved = normalize(&base_dir.join(reference_path));
    log::debug!("Resolved reference path: {} -> {}", reference, resolved.display());
    resolved
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Checks existence first, then that the extension is a supported image format.
pub fn validate_image_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DndigError::missing_reference(path));
    }

    let extension = lowercase_extension(path);
    if !defaults::SUPPORTED_IMAGE_FORMATS.contains(&extension.as_str()) {
        return Err(DndigError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
            supported: defaults::SUPPORTED_IMAGE_FORMATS.join(", "),
        });
    }

    log::debug!("Validated image file: {}", path.display());
    Ok(())
}

pub fn mime_type_for_path(path: &Path) -> &'static str {
    match lowercase_extension(path).as_str() {
        ".png" => "image/png",
        ".webp" => "image/webp",
        ".gif" => "image/gif",
        _ => "image/jpeg",
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        _ => ".bin",
    }
}

/// Turns a title into something safe to use as a file name prefix.
pub fn file_stem_for_title(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match stem.trim_matches('.') {
        "" => defaults::DEFAULT_TITLE.to_string(),
        _ => stem,
    }
}

/// `{title}_{timestamp}_{index}{ext}`
pub fn image_file_name(title: &str, timestamp: &str, index: u32, mime_type: &str) -> String {
    format!(
        "{}_{}_{}{}",
        file_stem_for_title(title),
        timestamp,
        index,
        extension_for_mime(mime_type)
    )
}

pub fn metadata_path(output_dir: &Path, title: &str, timestamp: &str) -> PathBuf {
    output_dir.join(format!(
        "{}_{}_metadata.json",
        file_stem_for_title(title),
        timestamp
    ))
}

/// Writes the session record. Failures are logged and swallowed.
pub fn save_generation_metadata(output_dir: &Path, metadata: &SessionMetadata) -> Option<PathBuf> {
    let path = metadata_path(output_dir, &metadata.title, &metadata.timestamp);

    let written = serde_json::to_string_pretty(metadata)
        .map_err(DndigError::from)
        .and_then(|json| std::fs::write(&path, json).map_err(DndigError::from));

    match written {
        Ok(()) => {
            log::info!("Metadata saved to: {}", path.display());
            Some(path)
        }
        Err(e) => {
            log::warn!("Failed to save metadata: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationConfig;
    use tempfile::TempDir;

    #[test]
    fn relative_references_join_base_dir() {
        assert_eq!(
            resolve_reference_path("assets/img.jpg", Path::new("/p")),
            PathBuf::from("/p/assets/img.jpg")
        );
        assert_eq!(
            resolve_reference_path("../shared/img.jpg", Path::new("/p/prompts")),
            PathBuf::from("/p/shared/img.jpg")
        );
    }

    #[test]
    fn absolute_references_pass_through() {
        assert_eq!(
            resolve_reference_path("/abs/img.png", Path::new("/p")),
            PathBuf::from("/abs/img.png")
        );
    }

    #[test]
    fn sanitize_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        let inside = dir.path().join("a/../b.png");
        assert_eq!(
            sanitize_path(&inside, Some(dir.path())).unwrap(),
            dir.path().join("b.png")
        );

        let outside = dir.path().join("../elsewhere.png");
        assert!(sanitize_path(&outside, Some(dir.path())).is_err());
    }

    #[test]
    fn validate_image_file_checks_existence_then_format() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(matches!(
            validate_image_file(&missing),
            Err(DndigError::MissingFile { .. })
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();
        let err = validate_image_file(&text).unwrap_err();
        assert!(matches!(err, DndigError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains(".webp"));

        let upper = dir.path().join("PHOTO.JPEG");
        std::fs::write(&upper, "x").unwrap();
        assert!(validate_image_file(&upper).is_ok());
    }

    #[test]
    fn mime_types_and_extensions() {
        assert_eq!(mime_type_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type_for_path(Path::new("a.gif")), "image/gif");
        assert_eq!(mime_type_for_path(Path::new("a")), "image/jpeg");

        assert_eq!(extension_for_mime("image/png"), ".png");
        assert_eq!(extension_for_mime("image/jpeg"), ".jpg");
        assert_eq!(extension_for_mime("IMAGE/WEBP; q=1"), ".webp");
        assert_eq!(extension_for_mime("application/octet-stream"), ".bin");
    }

    #[test]
    fn image_file_names_follow_session_pattern() {
        assert_eq!(
            image_file_name("castle", "20240101_120000", 3, "image/png"),
            "castle_20240101_120000_3.png"
        );
    }

    #[test]
    fn titles_cannot_escape_output_dir() {
        assert_eq!(file_stem_for_title("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(file_stem_for_title("a:b"), "a_b");
        assert_eq!(file_stem_for_title("  .. "), "generated_image");
        assert_eq!(file_stem_for_title("fantasy scene"), "fantasy scene");
    }

    #[test]
    fn read_text_file_reports_missing() {
        let dir = TempDir::new().unwrap();
        let err = read_text_file(&dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, DndigError::MissingFile { .. }));
    }

    #[test]
    fn metadata_is_written_as_json() {
        let dir = TempDir::new().unwrap();
        let metadata = SessionMetadata {
            title: "castle".into(),
            timestamp: "20240101_120000".into(),
            prompt_file: "prompt.md".into(),
            config: GenerationConfig::default(),
            images: vec!["artwork/castle_20240101_120000_1.png".into()],
            generated_at: "2024-01-01T12:00:00".into(),
        };

        let path = save_generation_metadata(dir.path(), &metadata).unwrap();
        assert_eq!(path, dir.path().join("castle_20240101_120000_metadata.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["title"], "castle");
        assert_eq!(json["config"]["batch"], 1);
        assert_eq!(json["images"][0], "artwork/castle_20240101_120000_1.png");
        for key in ["timestamp", "prompt_file", "generated_at"] {
            assert!(json.get(key).is_some(), "{}", key);
        }
    }

    #[test]
    fn metadata_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let metadata = SessionMetadata {
            title: "t".into(),
            timestamp: "ts".into(),
            prompt_file: "p.md".into(),
            config: GenerationConfig::default(),
            images: Vec::new(),
            generated_at: "now".into(),
        };
        assert!(save_generation_metadata(&dir.path().join("absent"), &metadata).is_none());
    }
}
