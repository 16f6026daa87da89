use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fstore_server::{init_tracing, ConfigSource, Overrides, ServerConfig, StoreServer};
use fstore_store::FileStore;

#[derive(Parser, Debug)]
#[command(name = "fstore-server", about = "Content-addressed file store server", version)]
struct Args {
    /// Configuration file (TOML). Defaults to the first store.toml on the search path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Log filter (trace, debug, info, warn, error).
    #[arg(long)]
    log: Option<String>,

    /// Force debug logging.
    #[arg(long)]
    debug: bool,

    /// Serve HTTPS with the configured certificate and private key.
    #[arg(long)]
    tls: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            log: self.log.clone(),
            debug: self.debug,
            tls: self.tls,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, source) = ServerConfig::load(args.config.as_deref())?;
    config.apply_env()?;
    config.apply_overrides(&args.overrides());

    init_tracing(&config.server);
    match &source {
        ConfigSource::File(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        ConfigSource::Defaults { looked_for } => tracing::warn!(
            candidates = looked_for.len(),
            "config file not found, using defaults"
        ),
    }

    let store = FileStore::open(&config.database)
        .with_context(|| format!("opening store at {}", config.database.path.display()))?;
    StoreServer::new(config, Arc::new(store)).serve().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let args = Args::try_parse_from(["fstore-server"]).unwrap();
        assert!(args.config.is_none());
        assert!(!args.debug);
        assert!(!args.tls);
        let overrides = args.overrides();
        assert!(overrides.port.is_none());
    }

    #[test]
    fn parse_flags() {
        let args = Args::try_parse_from([
            "fstore-server",
            "--config",
            "conf/store.toml",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--log",
            "warn",
            "--debug",
            "--tls",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("conf/store.toml")));
        let overrides = args.overrides();
        assert_eq!(overrides.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(overrides.port, Some(9000));
        assert_eq!(overrides.log.as_deref(), Some("warn"));
        assert!(overrides.debug);
        assert!(overrides.tls);
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Args::try_parse_from(["fstore-server", "--port", "http"]).is_err());
    }
}
