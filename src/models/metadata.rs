use crate::models::GenerationConfig;
use serde::{Deserialize, Serialize};

/// Record written next to the images of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub title: String,
    pub timestamp: String,
    pub prompt_file: String,
    pub config: GenerationConfig,
    pub images: Vec<String>,
    pub generated_at: String,
}
