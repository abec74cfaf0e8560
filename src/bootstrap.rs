use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::api::handler::AppState;
use crate::config::Config;
use crate::error::AppResult;
use crate::fleet::{FleetApi, FleetClient};
use crate::ledger::LedgerRepository;
use crate::notify::{Notifier, NullNotifier, TelegramNotifier};
use crate::settlement::SettlementOrchestrator;

pub async fn initialize_app_state(config: Arc<Config>) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(&config.database_url).await?;
    let ledger = Arc::new(LedgerRepository::new(pool));
    info!("✅ Ledger repository initialized");

    let fleet: Arc<dyn FleetApi> = Arc::new(FleetClient::new(config.fleet_api_base.clone()));
    info!("✅ Fleet client initialized for {}", config.fleet_api_base);

    let notifier: Arc<dyn Notifier> = if config.telegram.is_configured() {
        info!("✅ Telegram notifier enabled");
        Arc::new(TelegramNotifier::new(config.telegram.clone()))
    } else {
        info!("⚠️  Telegram notifier not configured - notifications disabled");
        Arc::new(NullNotifier)
    };

    let orchestrator = Arc::new(SettlementOrchestrator::new(
        ledger,
        fleet,
        notifier.clone(),
        config.categories.clone(),
    ));
    info!(
        "✅ Settlement orchestrator initialized for {} park(s)",
        config.parks.len()
    );

    Ok(AppState {
        config,
        orchestrator,
        notifier,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<SqlitePool> {
    info!("📊 Connecting to database...");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
