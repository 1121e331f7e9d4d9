use std::env;
use std::path::PathBuf;

pub mod defaults {
    pub const GEMINI_MODEL: &str = "gemini-3-pro-image-preview";
    pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
    pub const MODEL_ENV_VAR: &str = "GEMINI_MODEL";

    pub const DEFAULT_TITLE: &str = "generated_image";
    pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
    pub const DEFAULT_RESOLUTION: &str = "1K";
    pub const DEFAULT_TEMPERATURE: f64 = 1.0;
    pub const DEFAULT_BATCH_SIZE: u32 = 1;
    pub const DEFAULT_OUTPUT_DIR: &str = "artwork";

    pub const DEFAULT_MAX_WORKERS: usize = 4;
    /// Calls allowed per requested image before a batch gives up.
    pub const ATTEMPTS_PER_IMAGE: usize = 3;

    pub const VALID_ASPECT_RATIOS: [&str; 5] = ["16:9", "9:16", "1:1", "4:3", "3:4"];
    pub const VALID_RESOLUTIONS: [&str; 3] = ["1K", "2K", "4K"];

    pub const MIN_TEMPERATURE: f64 = 0.0;
    pub const MAX_TEMPERATURE: f64 = 1.0;

    pub const MIN_BATCH_SIZE: u32 = 1;
    pub const MAX_BATCH_SIZE: u32 = 4;

    pub const RESPONSE_MODALITIES: [&str; 2] = ["IMAGE", "TEXT"];

    pub const MAX_REFERENCE_IMAGES: usize = 14;
    pub const SUPPORTED_IMAGE_FORMATS: [&str; 5] = [".gif", ".jpeg", ".jpg", ".png", ".webp"];
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: defaults::GEMINI_MODEL.to_string(),
            base_url: defaults::GEMINI_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = env::var(defaults::API_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty());
        let model = env::var(defaults::MODEL_ENV_VAR)
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| defaults::GEMINI_MODEL.to_string());

        GeminiConfig {
            api_key,
            model,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub show_progress: bool,
    /// Upper bound on streaming calls per batch; `None` derives it from the batch size.
    pub max_attempts: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            output_dir: PathBuf::from(defaults::DEFAULT_OUTPUT_DIR),
            max_workers: defaults::DEFAULT_MAX_WORKERS,
            show_progress: false,
            max_attempts: None,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Workers launched up front for a batch of `batch_size`.
    pub fn effective_workers(&self, batch_size: u32) -> usize {
        self.max_workers.min(batch_size as usize).max(1)
    }

    /// Streaming calls a batch of `batch_size` may spend, never fewer than
    /// [`GeneratorConfig::effective_workers`].
    pub fn attempt_budget(&self, batch_size: u32) -> usize {
        self.max_attempts
            .unwrap_or(batch_size as usize * defaults::ATTEMPTS_PER_IMAGE)
            .max(self.effective_workers(batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_config_builder() {
        let config = GeminiConfig::new()
            .with_api_key("key")
            .with_model("gemini-test")
            .with_base_url("http://localhost:9000");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.base_url, "http://localhost:9000");
    }

    #[test]
    fn generator_config_clamps_workers() {
        let config = GeneratorConfig::new().with_max_workers(0);
        assert_eq!(config.max_workers, 1);
    }

    #[test]
    fn attempt_budget_defaults_to_multiple_of_batch() {
        let config = GeneratorConfig::new();
        assert_eq!(config.attempt_budget(4), 12);
        assert_eq!(config.attempt_budget(1), 3);
    }

    #[test]
    fn attempt_budget_never_below_worker_count() {
        let config = GeneratorConfig::new().with_max_workers(4).with_max_attempts(1);
        assert_eq!(config.attempt_budget(4), 4);
        assert_eq!(config.attempt_budget(2), 2);
    }

    #[test]
    fn effective_workers_follow_batch_and_limit() {
        let config = GeneratorConfig::new().with_max_workers(2);
        assert_eq!(config.effective_workers(4), 2);
        assert_eq!(config.effective_workers(1), 1);

        let unclamped = GeneratorConfig {
            max_workers: 0,
            ..GeneratorConfig::new()
        };
        assert_eq!(unclamped.effective_workers(3), 1);
        assert_eq!(unclamped.attempt_budget(3), 9);
    }
}
