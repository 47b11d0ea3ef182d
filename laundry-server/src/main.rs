use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

use laundry_server::config::{Config, StoreBackend};
use laundry_server::store::{FirestoreStore, InMemoryStore, MachineStore, SqliteStore};
use laundry_server::{http, AppState};

fn open_store(config: &Config) -> Result<Arc<dyn MachineStore>> {
    let store: Arc<dyn MachineStore> = match &config.backend {
        StoreBackend::Sqlite => {
            let db_path = config.sqlite_path();
            info!("Using machine database: {}", db_path.display());
            Arc::new(SqliteStore::new(&db_path).context("Failed to initialize SQLite database")?)
        }
        StoreBackend::Firestore(firestore) => {
            info!("Using Firestore project: {}", firestore.project_id);
            Arc::new(
                FirestoreStore::new(firestore.clone())
                    .context("Failed to initialize Firestore client")?,
            )
        }
        StoreBackend::Memory => {
            info!("Using in-memory machine store; data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!(
        "Starting laundry server (version {})",
        laundry_server::get_service_version()
    );

    let config = Config::from_env().context("Failed to load configuration from environment variables")?;
    let store = open_store(&config)?;

    let app_state = Arc::new(AppState::new(store));
    let app = http::router(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
