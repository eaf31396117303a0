use nd_core::config::{DatabaseConfig, StorageKind};
use nd_core::{ArticleStore, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub mod backends;

pub use backends::*;

/// Builds the configured backend and probes it once.
///
/// An unreachable database is only logged; requests open their own
/// connections and fail individually until it comes back.
pub async fn create_storage(config: &DatabaseConfig) -> Result<Arc<dyn ArticleStore>> {
    let storage: Arc<dyn ArticleStore> = match config.backend {
        #[cfg(feature = "postgres")]
        StorageKind::Postgres => {
            let storage = PostgresStorage::new(config);
            probe(storage.check_connection().await, config);
            Arc::new(storage)
        }
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            let storage = SqliteStorage::new_with_path(&config.name);
            probe(storage.check_connection().await, config);
            Arc::new(storage)
        }
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        #[allow(unreachable_patterns)]
        other => {
            return Err(nd_core::Error::Config(format!(
                "storage backend '{}' is not compiled in",
                other
            )))
        }
    };
    info!("💾 Using {} storage at {}", storage.name(), config.target());
    Ok(storage)
}

#[allow(dead_code)]
fn probe(result: Result<()>, config: &DatabaseConfig) {
    if let Err(e) = result {
        warn!("Database {} is not reachable yet: {}", config.target(), e);
    }
}
