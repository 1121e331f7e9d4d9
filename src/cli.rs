//! Command line surface: argument parsing, run loop and exit code mapping.

use crate::{
    config::{defaults, GeminiConfig, GeneratorConfig},
    error::{DndigError, Result},
    gemini::{GeminiClient, ImageStreamer},
    generator::{GenerationReport, ImageGenerator},
    logger::LoggerConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Any handled error.
    pub const FAILURE: i32 = 1;
    /// Conventional SIGINT code.
    pub const INTERRUPTED: i32 = 130;
}

/// Generate AI images using the Google Gemini API.
#[derive(Parser, Debug, Clone)]
#[command(name = "dndig")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  dndig prompt.md
  dndig prompt.md --verbose
  dndig prompt.md --output-dir custom_art --workers 2
  dndig prompt.md --debug

Environment Variables:
  GEMINI_API_KEY    Google Gemini API key (required)
  GEMINI_MODEL      Model override")]
pub struct Cli {
    /// Path to markdown file with frontmatter and prompt
    pub prompt_file: PathBuf,

    /// Output directory for generated images
    #[arg(short, long, default_value = defaults::DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum concurrent API workers
    #[arg(short, long, default_value_t = defaults::DEFAULT_MAX_WORKERS as u32,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: u32,

    /// Enable verbose output with progress bar
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging (most verbose)
    #[arg(long)]
    pub debug: bool,

    /// Google Gemini API key (overrides GEMINI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Gemini model to call
    #[arg(long)]
    pub model: Option<String>,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_file: Option<String>,

    /// Write log file entries as JSON lines
    #[arg(long, requires = "log_file")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MissingFile,
    Api,
    Generation,
    Config,
    Unexpected,
}

impl ErrorCategory {
    pub fn of(error: &DndigError) -> Self {
        match error {
            DndigError::MissingFile { .. } => ErrorCategory::MissingFile,
            DndigError::RemoteApi(_) => ErrorCategory::Api,
            DndigError::GenerationExhausted(_) => ErrorCategory::Generation,
            DndigError::Config(_) | DndigError::UnsupportedFormat { .. } => ErrorCategory::Config,
            DndigError::Io(_) | DndigError::Serialization(_) | DndigError::Internal(_) => {
                ErrorCategory::Unexpected
            }
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorCategory::MissingFile | ErrorCategory::Generation => "Error",
            ErrorCategory::Api => "API Error",
            ErrorCategory::Config => "Configuration Error",
            ErrorCategory::Unexpected => "Unexpected error",
        }
    }
}

impl Cli {
    pub fn gemini_config(&self) -> GeminiConfig {
        let mut config = GeminiConfig::from_env();
        if let Some(api_key) = &self.api_key {
            config = config.with_api_key(api_key.clone());
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        config
    }

    pub fn logger_config(&self) -> LoggerConfig {
        let config = LoggerConfig::cli(self.verbose, self.debug);
        match &self.log_file {
            Some(path) => config.with_file_output(path).with_json_output(self.log_json),
            None => config,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .with_output_dir(&self.output_dir)
            .with_max_workers(self.workers as usize)
            .with_progress(self.verbose)
    }
}

/// Runs the command to completion or until Ctrl-C, returning the exit code.
pub async fn run(cli: Cli) -> i32 {
    tokio::select! {
        code = execute(&cli) => code,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted by user");
            eprintln!("\nInterrupted by user");
            exit_codes::INTERRUPTED
        }
    }
}

async fn execute(cli: &Cli) -> i32 {
    log::debug!("Arguments: {:?}", RedactedCli(cli));

    let outcome = match GeminiClient::new(cli.gemini_config()) {
        Ok(client) => run_with_client(cli, Arc::new(client)).await,
        Err(e) => Err(e),
    };
    finish(cli, outcome)
}

/// Same as [`run`] minus signal handling, with the remote client supplied.
pub async fn run_with_client(
    cli: &Cli,
    client: Arc<dyn ImageStreamer>,
) -> Result<GenerationReport> {
    let generator = ImageGenerator::new(cli.generator_config(), client)?;
    generator.generate_from_file(&cli.prompt_file).await
}

/// Prints the summary or the error and maps the outcome to an exit code.
pub fn finish(cli: &Cli, outcome: Result<GenerationReport>) -> i32 {
    match outcome {
        Ok(report) => {
            if !cli.debug {
                print!("{}", format_summary(&report));
            }
            exit_codes::SUCCESS
        }
        Err(e) => report_error(&e, cli.debug),
    }
}

pub fn format_summary(report: &GenerationReport) -> String {
    let mut summary = format!(
        "\nSuccess! Generated {} image(s):\n",
        report.images.len()
    );
    for path in &report.images {
        summary.push_str(&format!("  - {}\n", path.display()));
    }
    summary
}

pub fn report_error(error: &DndigError, debug: bool) -> i32 {
    let category = ErrorCategory::of(error);
    log::error!("{}: {}", category.prefix(), error);
    eprintln!("{}: {}", category.prefix(), error);

    match category {
        ErrorCategory::Api => {
            eprintln!(
                "\nPlease check your {} environment variable.",
                defaults::API_KEY_ENV_VAR
            );
        }
        ErrorCategory::Unexpected if debug => eprintln!("{:#?}", error),
        _ => {}
    }

    exit_codes::FAILURE
}

struct RedactedCli<'a>(&'a Cli);

impl std::fmt::Debug for RedactedCli<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("prompt_file", &self.0.prompt_file)
            .field("output_dir", &self.0.output_dir)
            .field("workers", &self.0.workers)
            .field("verbose", &self.0.verbose)
            .field("debug", &self.0.debug)
            .field("api_key", &self.0.api_key.as_ref().map(|_| "***"))
            .field("model", &self.0.model)
            .field("log_file", &self.0.log_file)
            .field("log_json", &self.0.log_json)
            .finish()
    }
}
