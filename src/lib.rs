//! Batch image generation from markdown prompt files.
//!
//! A prompt file carries a small frontmatter header (title, aspect ratio,
//! resolution, temperature, batch size, optional instructions and reference
//! images) followed by the prompt text. [`ImageGenerator`] validates it,
//! runs a bounded pool of streaming Gemini calls until the batch is filled,
//! and writes the images plus a JSON metadata record to the output directory.

pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod frontmatter;
pub mod gemini;
pub mod generator;
pub mod logger;
pub mod models;

pub use config::{GeminiConfig, GeneratorConfig};
pub use error::{ConfigError, DndigError, Result};
pub use frontmatter::{parse_frontmatter, Frontmatter, FrontmatterValue};
pub use gemini::{ChunkStream, GeminiClient, ImageClient, ImageStreamer};
pub use generator::{
    BatchOrchestrator, BatchOutcome, DiskStore, GenerationReport, GenerationSession,
    ImageGenerator, ImageStore,
};
pub use models::{
    AspectRatio, ChunkEvent, GenerationConfig, GenerationRequest, ReferenceImage, Resolution,
    SessionMetadata,
};
