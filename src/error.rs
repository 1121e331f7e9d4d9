use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised while validating frontmatter values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid aspect ratio '{value}'. Must be one of: {allowed}")]
    InvalidAspectRatio { value: String, allowed: String },

    #[error("Invalid resolution '{value}'. Must be one of: {allowed}")]
    InvalidResolution { value: String, allowed: String },

    #[error("Invalid temperature {value}. Must be between {min} and {max}")]
    InvalidTemperature { value: String, min: f64, max: f64 },

    #[error("Invalid batch size {value}. Must be between {min} and {max}")]
    InvalidBatchSize { value: String, min: u32, max: u32 },

    #[error("Too many reference images ({count}). Maximum is {max}")]
    TooManyReferences { count: usize, max: usize },
}

impl ConfigError {
    /// Name of the frontmatter field the error is about.
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::InvalidAspectRatio { .. } => "aspect_ratio",
            ConfigError::InvalidResolution { .. } => "resolution",
            ConfigError::InvalidTemperature { .. } => "temperature",
            ConfigError::InvalidBatchSize { .. } => "batch",
            ConfigError::TooManyReferences { .. } => "references",
        }
    }
}

#[derive(Debug, Error)]
pub enum DndigError {
    #[error("Invalid frontmatter configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{what} not found: {}{hint}", path.display())]
    MissingFile {
        what: &'static str,
        path: PathBuf,
        hint: String,
    },

    #[error("Unsupported image format '{extension}' for {}. Supported formats: {supported}", path.display())]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    #[error("{0}")]
    RemoteApi(String),

    #[error("{0}")]
    GenerationExhausted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DndigError {
    pub fn missing_file(what: &'static str, path: impl Into<PathBuf>) -> Self {
        DndigError::MissingFile {
            what,
            path: path.into(),
            hint: String::new(),
        }
    }

    pub fn missing_reference(path: impl Into<PathBuf>) -> Self {
        DndigError::MissingFile {
            what: "Reference image",
            path: path.into(),
            hint: " (reference paths are resolved relative to the prompt file directory)"
                .to_string(),
        }
    }
}

impl From<serde_json::Error> for DndigError {
    fn from(e: serde_json::Error) -> Self {
        DndigError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for DndigError {
    fn from(e: reqwest::Error) -> Self {
        DndigError::RemoteApi(format!("Failed to generate image: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DndigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_their_field() {
        let err = ConfigError::InvalidBatchSize {
            value: "9".into(),
            min: 1,
            max: 4,
        };
        assert_eq!(err.field(), "batch");
        assert!(err.to_string().contains("batch size"));

        let err = ConfigError::TooManyReferences { count: 15, max: 14 };
        assert_eq!(err.field(), "references");
        assert!(err.to_string().contains("reference images"));
    }

    #[test]
    fn missing_reference_mentions_prompt_directory() {
        let err = DndigError::missing_reference("/p/assets/castle.jpg");
        let msg = err.to_string();
        assert!(msg.contains("/p/assets/castle.jpg"));
        assert!(msg.contains("relative to the prompt file directory"));
    }

    #[test]
    fn config_error_converts_into_crate_error() {
        let err: DndigError = ConfigError::InvalidResolution {
            value: "8K".into(),
            allowed: "1K, 2K, 4K".into(),
        }
        .into();
        assert!(matches!(err, DndigError::Config(_)));
        assert!(err.to_string().starts_with("Invalid frontmatter configuration"));
    }
}
