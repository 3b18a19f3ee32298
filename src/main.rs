mod cli;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // REALTY_DATABASE and RUST_LOG may come from .env
    let _ = dotenvy::dotenv();

    let level = if cli::is_verbose() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("realty_scout={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    cli::run().await
}
