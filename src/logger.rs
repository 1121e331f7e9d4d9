use crate::models::GenerationConfig;
use chrono::{DateTime, Local};
use colored::*;
use indicatif::ProgressBar;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

static DNDIG_LOGGER: Lazy<CliLogger> = Lazy::new(CliLogger::new);

/// Routes console output around `bar` until the returned guard drops.
pub fn attach_progress(bar: &ProgressBar) -> ProgressAttachment {
    DNDIG_LOGGER.attach_progress(bar.clone());
    ProgressAttachment { _private: () }
}

#[must_use]
pub struct ProgressAttachment {
    _private: (),
}

impl Drop for ProgressAttachment {
    fn drop(&mut self) {
        DNDIG_LOGGER.detach_progress();
    }
}

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    DNDIG_LOGGER.update_config(config)?;

    if let Err(e) = log::set_logger(&*DNDIG_LOGGER) {
        return Err(format!("Failed to set logger: {:?}", e));
    }

    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }

    /// `--debug` wins over `--verbose`; neither leaves warnings and errors.
    pub fn for_cli(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    pub thread_id: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Local::now(),
            level,
            message,
            module,
            file,
            line,
            thread_id: format!("{:?}", std::thread::current().id()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_thread_id: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    /// Applies to the log file; the console always gets formatted lines.
    pub output_json: bool,
    pub log_file_path: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Warn,
            show_colors: true,
            show_emojis: true,
            show_thread_id: false,
            show_file_location: false,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            output_json: false,
            log_file_path: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_file_path = Some(path.to_string());
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    /// Console settings for the command line front end.
    pub fn cli(verbose: bool, debug: bool) -> Self {
        Self {
            min_level: LogLevel::for_cli(verbose, debug),
            show_file_location: debug,
            show_thread_id: debug,
            ..Default::default()
        }
    }
}

/// `log::Log` implementation writing colored lines to stderr and,
/// optionally, formatted or JSON lines to a file.
pub struct CliLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
    progress: Mutex<Option<ProgressBar>>,
}

impl CliLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
            progress: Mutex::new(None),
        }
    }

    /// While a bar is attached, console lines are printed with the bar
    /// suspended so they do not tear through it.
    pub fn attach_progress(&self, bar: ProgressBar) {
        *self
            .progress
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(bar);
    }

    pub fn detach_progress(&self) {
        self.progress
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
    }

    fn write_console(&self, line: &str) {
        let bar = self
            .progress
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone();
        match bar {
            Some(bar) => bar.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) -> Result<(), String> {
        let file = match &new_config.log_file_path {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open log file {}: {}", path, e))?,
            ),
            None => None,
        };

        *self
            .log_file
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = file;
        *self
            .config
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = new_config;
        Ok(())
    }

    fn format_line(&self, entry: &LogEntry, config: &LoggerConfig, colors: bool) -> String {
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if colors {
            output.push_str(&format!("[{}] ", level_str.color(entry.level.color()).bold()));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if config.show_module && !entry.module.is_empty() {
            if colors {
                output.push_str(&format!("{}: ", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.module));
            }
        }

        output.push_str(&entry.message);

        if config.show_thread_id {
            output.push_str(&format!(" [thread:{}]", entry.thread_id));
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn write_to_file(&self, entry: &LogEntry, config: &LoggerConfig) {
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(file) = guard.as_mut() {
                let line = if config.output_json {
                    serde_json::to_string(entry).unwrap_or_default()
                } else {
                    self.format_line(entry, config, false)
                };
                let _ = writeln!(file, "{}", line);
            }
        }
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        )
    }
}

impl Default for CliLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.min_level.to_level_filter(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);

        if let Ok(config) = self.config.lock() {
            self.write_console(&self.format_line(&entry, &config, config.show_colors));
            if config.log_file_path.is_some() {
                self.write_to_file(&entry, &config);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Logs how long the wrapped operation took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!(
            "⏱️  {} completed in {:.2}s",
            self.name,
            self.elapsed().as_secs_f64()
        );
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str) {
    log::info!("🚀 Starting {} v{}", app_name, version);
}

pub fn log_generation_config(config: &GenerationConfig) {
    log::info!("⚙️  Generation settings:");
    log::info!("   Title: {}", config.title);
    log::info!("   Aspect ratio: {}", config.aspect_ratio);
    log::info!("   Resolution: {}", config.resolution);
    log::info!("   Temperature: {}", config.temperature);
    log::info!("   Batch: {}", config.batch);
    log::info!(
        "   Instructions: {}",
        config.instructions.as_deref().unwrap_or("none")
    );
    log::info!("   References: {}", config.references.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
    }

    #[test]
    fn cli_flags_pick_level() {
        assert_eq!(LogLevel::for_cli(false, false), LogLevel::Warn);
        assert_eq!(LogLevel::for_cli(true, false), LogLevel::Info);
        assert_eq!(LogLevel::for_cli(true, true), LogLevel::Debug);
        assert_eq!(LogLevel::for_cli(false, true), LogLevel::Debug);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::cli(false, true);
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_file_location);

        let config = LoggerConfig::new().with_json_output(true).with_colors(false);
        assert!(config.output_json);
        assert!(!config.show_colors);
    }

    #[test]
    fn plain_lines_carry_level_and_message() {
        let logger = CliLogger::new();
        let config = LoggerConfig {
            include_timestamp: false,
            show_emojis: false,
            ..LoggerConfig::default()
        };
        let entry = LogEntry::new(
            LogLevel::Warn,
            "disk almost full".into(),
            "dndig::files".into(),
            "src/files.rs".into(),
            10,
        );
        assert_eq!(
            logger.format_line(&entry, &config, false),
            "[WARN] dndig::files: disk almost full"
        );
    }

    #[test]
    fn json_entries_go_to_the_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dndig.log");
        let logger = CliLogger::new();
        logger
            .update_config(
                LoggerConfig::new()
                    .with_file_output(path.to_str().unwrap())
                    .with_json_output(true),
            )
            .unwrap();

        let config = logger.config.lock().unwrap().clone();
        let entry = LogEntry::new(
            LogLevel::Info,
            "saved".into(),
            "dndig".into(),
            "src/lib.rs".into(),
            1,
        );
        logger.write_to_file(&entry, &config);

        let written = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(json["message"], "saved");
        assert_eq!(json["level"], "Info");
    }

    #[test]
    fn attached_bar_is_released() {
        let logger = CliLogger::new();
        logger.attach_progress(ProgressBar::hidden());
        assert!(logger.progress.lock().unwrap().is_some());

        log::Log::log(
            &logger,
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("saved while the bar is shown"))
                .build(),
        );

        logger.detach_progress();
        assert!(logger.progress.lock().unwrap().is_none());
    }

    #[test]
    fn test_logger_initialization() {
        assert!(init_with_config(LoggerConfig::cli(false, false)).is_ok());
    }
}
