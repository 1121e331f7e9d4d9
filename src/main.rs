use clap::Parser;
use dndig::cli::{self, Cli};
use dndig::logger;

#[tokio::main]
async fn main() {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_config(cli.logger_config()) {
        eprintln!("Warning: {}", e);
    }

    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    } else {
        log::debug!("No .env file found, using system environment variables");
    }

    std::process::exit(cli::run(cli).await);
}
