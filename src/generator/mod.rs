pub mod batch;
pub mod session;
pub mod store;

use crate::{
    config::GeneratorConfig,
    error::{DndigError, Result},
    files,
    frontmatter::parse_frontmatter,
    gemini::ImageStreamer,
    logger,
    models::{GenerationConfig, GenerationRequest, ReferenceImage, SessionMetadata},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use batch::{BatchOrchestrator, BatchOutcome};
pub use session::{GenerationSession, SlotReservation};
pub use store::{DiskStore, ImageStore};

/// Files a prompt may point at besides itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliaryFile {
    Instructions,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFilePolicy {
    WarnAndContinue,
    Fail,
}

/// What happens when an auxiliary file named in the frontmatter is absent.
pub const MISSING_FILE_POLICY: [(AuxiliaryFile, MissingFilePolicy); 2] = [
    (AuxiliaryFile::Instructions, MissingFilePolicy::WarnAndContinue),
    (AuxiliaryFile::Reference, MissingFilePolicy::Fail),
];

impl AuxiliaryFile {
    pub fn missing_policy(self) -> MissingFilePolicy {
        MISSING_FILE_POLICY
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, policy)| *policy)
            .unwrap_or(MissingFilePolicy::Fail)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub title: String,
    pub timestamp: String,
    pub images: Vec<PathBuf>,
    pub metadata_file: Option<PathBuf>,
    pub attempts: usize,
}

/// Turns prompt files into saved images.
pub struct ImageGenerator {
    config: GeneratorConfig,
    client: Arc<dyn ImageStreamer>,
    store: Arc<dyn ImageStore>,
}

impl ImageGenerator {
    pub fn new(config: GeneratorConfig, client: Arc<dyn ImageStreamer>) -> Result<Self> {
        let store = Arc::new(DiskStore::new(&config.output_dir));
        Self::with_store(config, client, store)
    }

    pub fn with_store(
        config: GeneratorConfig,
        client: Arc<dyn ImageStreamer>,
        store: Arc<dyn ImageStore>,
    ) -> Result<Self> {
        files::ensure_directory_exists(&config.output_dir)?;

        log::info!(
            "ImageGenerator initialized: output_dir={}, max_workers={}",
            config.output_dir.display(),
            config.max_workers
        );

        Ok(Self {
            config,
            client,
            store,
        })
    }

    pub async fn generate_from_file(&self, prompt_file: &Path) -> Result<GenerationReport> {
        files::validate_file_exists(prompt_file, "Prompt file")?;

        let content = files::read_text_file(prompt_file)?;
        let (frontmatter, prompt_text) = parse_frontmatter(&content);
        let config = GenerationConfig::from_frontmatter(&frontmatter)?;
        logger::log_generation_config(&config);

        let base_dir = files::sanitize_path(&prompt_base_dir(prompt_file), None)?;
        let working_dir = std::env::current_dir()?;
        let system_instructions = load_instructions(&config, &base_dir, &working_dir)?;
        let reference_images = load_reference_images(&config, &base_dir)?;

        let request = GenerationRequest::new(
            &config,
            prompt_text,
            system_instructions,
            reference_images,
        )?;

        log::info!(
            "Starting generation: title={}, batch={}",
            request.title(),
            request.batch_size()
        );

        let session = Arc::new(GenerationSession::with_progress(
            GenerationSession::timestamp_now(),
            self.progress_bar(request.batch_size()),
        ));
        let progress = session.progress();
        let attachment = (!progress.is_hidden()).then(|| logger::attach_progress(progress));
        let outcome = self.generate(Arc::new(request), Arc::clone(&session)).await;
        session.progress().finish_and_clear();
        drop(attachment);
        let outcome = outcome?;

        let images: Vec<String> = outcome
            .saved_files
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        let metadata = SessionMetadata {
            title: config.title.clone(),
            timestamp: session.timestamp().to_string(),
            prompt_file: prompt_file.display().to_string(),
            config,
            images,
            generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        };
        let metadata_file = files::save_generation_metadata(&self.config.output_dir, &metadata);

        log::info!(
            "Generation complete: {} image(s) created",
            outcome.saved_files.len()
        );

        Ok(GenerationReport {
            title: metadata.title,
            timestamp: metadata.timestamp,
            images: outcome.saved_files,
            metadata_file,
            attempts: outcome.attempts,
        })
    }

    /// Runs one batch for an already validated request.
    pub async fn generate(
        &self,
        request: Arc<GenerationRequest>,
        session: Arc<GenerationSession>,
    ) -> Result<BatchOutcome> {
        let _timer = logger::timer("image batch");
        BatchOrchestrator::new(
            Arc::clone(&self.client),
            Arc::clone(&self.store),
            self.config.clone(),
        )
        .run(request, session)
        .await
    }

    fn progress_bar(&self, batch_size: u32) -> ProgressBar {
        if !self.config.show_progress || batch_size <= 1 {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(batch_size as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:30.green/dim}] {pos}/{len} img")
        {
            bar.set_style(style.progress_chars("█▓▒░ "));
        }
        bar.set_message("Generating images");
        bar
    }
}

fn prompt_base_dir(prompt_file: &Path) -> PathBuf {
    match prompt_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Looks for the instructions file next to the prompt first, then in the
/// working directory.
fn load_instructions(
    config: &GenerationConfig,
    base_dir: &Path,
    working_dir: &Path,
) -> Result<Option<String>> {
    let Some(instructions) = config.instructions.as_deref() else {
        return Ok(None);
    };

    let mut candidates = vec![files::resolve_reference_path(instructions, base_dir)];
    let from_working_dir = files::resolve_reference_path(instructions, working_dir);
    if !candidates.contains(&from_working_dir) {
        candidates.push(from_working_dir);
    }

    for path in &candidates {
        match files::read_text_file(path) {
            Ok(text) => {
                log::info!("Loaded system instructions from {}", path.display());
                return Ok(Some(text));
            }
            Err(DndigError::MissingFile { .. }) => {
                log::debug!("No instructions at {}", path.display());
            }
            Err(e) => return Err(e),
        }
    }

    match AuxiliaryFile::Instructions.missing_policy() {
        MissingFilePolicy::WarnAndContinue => {
            log::warn!(
                "Instructions file not found: {}. Continuing without system instructions.",
                instructions
            );
            Ok(None)
        }
        MissingFilePolicy::Fail => Err(DndigError::missing_file(
            "Instructions file",
            &candidates[0],
        )),
    }
}

fn load_reference_images(
    config: &GenerationConfig,
    base_dir: &Path,
) -> Result<Vec<ReferenceImage>> {
    let mut images = Vec::with_capacity(config.references.len());

    for reference in &config.references {
        let path = files::resolve_reference_path(reference, base_dir);

        if !path.exists() {
            match AuxiliaryFile::Reference.missing_policy() {
                MissingFilePolicy::Fail => return Err(DndigError::missing_reference(path)),
                MissingFilePolicy::WarnAndContinue => {
                    log::warn!("Reference image not found, skipping: {}", path.display());
                    continue;
                }
            }
        }

        files::validate_image_file(&path)?;
        let data = files::read_binary_file(&path)?;
        let mime_type = files::mime_type_for_path(&path).to_string();
        log::info!(
            "Loaded reference image {} ({}, {} bytes)",
            path.display(),
            mime_type,
            data.len()
        );
        images.push(ReferenceImage {
            path,
            data,
            mime_type,
        });
    }

    Ok(images)
}
