//! newsletter-research - CLI and HTTP server entry point.

use clap::Parser;
use newsletter_research::{
    api,
    cli::{self, Cli, Command},
    config::Config,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter so RUST_LOG can live there too.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsletter_research=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Could not load .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run(Default::default())) {
        Command::CheckEnv => {
            if !cli::check_env() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Run(args) => {
            let config = Config::from_env()?;
            info!("Loaded configuration: model={}", config.default_model);
            cli::run(config, args).await
        }
        Command::Serve(args) => {
            let mut config = Config::from_env()?;
            args.apply(&mut config);
            info!(
                "Loaded configuration: model={}, searches={}",
                config.default_model, config.how_many_searches
            );
            api::serve(config).await
        }
    }
}
