use std::sync::Arc;

use fleet_settle::{bootstrap, config::Config, server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,fleet_settle=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting fleet settlement service");

    dotenv::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    let state = bootstrap::initialize_app_state(config.clone()).await?;
    let app = server::create_app(state);
    server::run_server(app, &config.bind_address).await?;

    Ok(())
}
