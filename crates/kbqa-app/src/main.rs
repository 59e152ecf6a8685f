mod cli;
mod commands;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use kbqa_config::KbqaConfig;

fn init_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse()
                    .unwrap_or_else(|_| "kbqa=info".parse().unwrap()),
            ),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Config load errors are reported once the subscriber is installed.
    let loaded = kbqa_config::load_config(args.config.as_deref());
    let directive = match (&args.log_level, &loaded) {
        (Some(level), _) => cli::log_directive(level),
        (None, Ok(config)) => config.logging.level.directive().to_string(),
        (None, Err(_)) => "kbqa=info".to_string(),
    };
    init_logging(&directive);

    tracing::debug!("kbqa v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        KbqaConfig::default()
    });

    match commands::run(args.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("kbqa: {e}");
            ExitCode::FAILURE
        }
    }
}
