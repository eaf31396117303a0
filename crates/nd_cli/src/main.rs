use anyhow::Context;
use clap::Parser;
use nd_core::config::{
    Config, DatabaseConfig, ServerConfig, StorageKind, DEFAULT_DB_HOST, DEFAULT_DB_NAME,
    DEFAULT_DB_PASSWORD, DEFAULT_DB_USER, DEFAULT_LISTEN_HOST,
};
use nd_web::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Read-only web dashboard over a table of crawled news articles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend: postgres, sqlite or memory
    #[arg(long, env = "DATABASE_BACKEND", default_value = "postgres")]
    storage: StorageKind,
    #[arg(long, env = "DATABASE_HOST", default_value = DEFAULT_DB_HOST)]
    db_host: String,
    /// Database name, or the database file path for sqlite
    #[arg(long, env = "DATABASE_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,
    #[arg(long, env = "DATABASE_USER", default_value = DEFAULT_DB_USER)]
    db_user: String,
    #[arg(long, env = "DATABASE_PASSWORD", default_value = DEFAULT_DB_PASSWORD, hide_env_values = true)]
    db_password: String,
    #[arg(long, env = "DATABASE_PORT", default_value_t = nd_core::config::DEFAULT_DB_PORT)]
    db_port: u16,
    /// Address the HTTP server binds to
    #[arg(long, env = "DASHBOARD_HOST", default_value = DEFAULT_LISTEN_HOST)]
    host: String,
    #[arg(long, env = "PORT", default_value_t = nd_core::config::DEFAULT_LISTEN_PORT)]
    port: u16,
    /// Verbose logging
    #[arg(long, env = "DASHBOARD_DEBUG")]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            database: DatabaseConfig {
                backend: self.storage,
                host: self.db_host,
                name: self.db_name,
                user: self.db_user,
                password: self.db_password,
                port: self.db_port,
            },
            server: ServerConfig {
                host: self.host,
                port: self.port,
                debug: self.debug,
            },
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is the normal case in deployments.
    let _ = dotenvy::dotenv();

    let config = Cli::parse().into_config();
    init_logging(config.server.debug);

    if config.database.uses_default_credentials() {
        warn!("⚠️ Using default database credentials; set DATABASE_HOST and DATABASE_PASSWORD");
    }

    let store = nd_storage::create_storage(&config.database).await?;
    let app = nd_web::create_app(AppState::new(store));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("📰 Dashboard listening on http://{}", address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dashboard shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_build_config() {
        let cli = Cli::try_parse_from([
            "nd",
            "--storage", "sqlite",
            "--db-host", "db.internal",
            "--db-name", "/var/lib/crawler/articles.db",
            "--db-user", "reader",
            "--db-password", "s3cret",
            "--db-port", "6543",
            "--host", "127.0.0.1",
            "--port", "8080",
            "--debug",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.database.backend, StorageKind::Sqlite);
        assert_eq!(config.database.name, "/var/lib/crawler/articles.db");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert!(config.server.debug);
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        assert!(Cli::try_parse_from(["nd", "--db-port", "fivefourthreetwo"]).is_err());
        assert!(Cli::try_parse_from(["nd", "--storage", "mysql"]).is_err());
    }
}
