use std::future::Future;
use std::io;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use fstore_store::{FileStore, MaintenanceLoop};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::{HttpConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// File store HTTP server.
pub struct StoreServer {
    config: ServerConfig,
    store: Arc<FileStore>,
}

impl StoreServer {
    pub fn new(config: ServerConfig, store: Arc<FileStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(Arc::clone(&self.store)), &self.config)
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    ///
    /// Serves HTTPS when `server.tls` is set.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.config.server.bind_addr();
        if self.config.server.tls {
            let tls = load_tls(&self.config.server).await?;
            let listener = std::net::TcpListener::bind(&addr)?;
            return self.serve_tls_on(listener, tls, shutdown_signal()).await;
        }
        let listener = TcpListener::bind(&addr).await?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve plain HTTP on `listener` until `shutdown` resolves.
    ///
    /// In-flight requests drain first, then the maintenance loop stops and
    /// the store is flushed.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        let app = self.router();
        self.run(async move {
            tracing::info!(addr = %local, "file store listening");
            axum::serve(listener, app).with_graceful_shutdown(shutdown).await
        })
        .await
    }

    /// Serve HTTPS on `listener` until `shutdown` resolves.
    pub async fn serve_tls_on<F>(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        shutdown: F,
    ) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        let app = self.router();

        let handle = Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            stopper.graceful_shutdown(None);
        });

        self.run(async move {
            tracing::info!(addr = %local, tls = true, "file store listening");
            axum_server::from_tcp_rustls(listener, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        })
        .await
    }

    /// Run the maintenance loop alongside `serving`, then flush the store.
    async fn run<S>(self, serving: S) -> ServerResult<()>
    where
        S: Future<Output = io::Result<()>>,
    {
        let maintenance = MaintenanceLoop::spawn(
            self.store.reclaimers(),
            self.config.database.maintenance_interval(),
        );
        let served = serving.await;

        tracing::info!("shutting down");
        maintenance.shutdown().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.close()).await??;
        served?;
        Ok(())
    }
}

/// Read the configured PEM certificate chain and private key.
pub async fn load_tls(http: &HttpConfig) -> ServerResult<RustlsConfig> {
    // Already installed when a second server starts in the same process.
    let _ = rustls::crypto::ring::default_provider().install_default();
    RustlsConfig::from_pem_file(&http.certificate, &http.private_key)
        .await
        .map_err(|e| {
            ServerError::Config(format!(
                "TLS certificate {} / key {}: {e}",
                http.certificate.display(),
                http.private_key.display()
            ))
        })
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Log filter for the server: `RUST_LOG` when set, else `debug` when
/// forced, else the configured directive.
pub fn env_filter(http: &HttpConfig) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    let directive = if http.debug { "debug" } else { http.log.as_str() };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global `fmt` subscriber.
pub fn init_tracing(http: &HttpConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(http))
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn server_construction() {
        let server = StoreServer::new(ServerConfig::default(), Arc::new(FileStore::in_memory()));
        assert_eq!(server.config().server.port, 8080);
        let _router = server.router();
    }

    #[test]
    fn debug_forces_debug_level() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let http = HttpConfig {
            debug: true,
            ..HttpConfig::default()
        };
        assert_eq!(env_filter(&http).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn bad_directive_falls_back_to_info() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let http = HttpConfig {
            log: "fstore=loud".into(),
            ..HttpConfig::default()
        };
        assert_eq!(env_filter(&http).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[tokio::test]
    async fn serves_until_shutdown_then_closes() {
        let store = Arc::new(FileStore::in_memory());
        let server = StoreServer::new(ServerConfig::default(), Arc::clone(&store));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(server.serve_on(listener, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.to_ascii_lowercase().contains("store: 703273357638792f"));

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
        assert!(store.list(false).unwrap().is_empty());
    }

    fn write_self_signed(dir: &std::path::Path) -> HttpConfig {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let certificate = dir.join("certificate.crt");
        let private_key = dir.join("private.key");
        std::fs::write(&certificate, cert.cert.pem()).unwrap();
        std::fs::write(&private_key, cert.key_pair.serialize_pem()).unwrap();
        HttpConfig {
            tls: true,
            certificate,
            private_key,
            ..HttpConfig::default()
        }
    }

    #[tokio::test]
    async fn tls_loads_pem_files() {
        let dir = tempfile::tempdir().unwrap();
        let http = write_self_signed(dir.path());
        assert!(load_tls(&http).await.is_ok());
    }

    #[tokio::test]
    async fn tls_missing_files_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let http = HttpConfig {
            tls: true,
            certificate: dir.path().join("absent.crt"),
            private_key: dir.path().join("absent.key"),
            ..HttpConfig::default()
        };
        let err = load_tls(&http).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
        assert!(err.to_string().contains("absent.crt"));
    }

    #[tokio::test]
    async fn tls_serves_until_shutdown_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let http = write_self_signed(dir.path());
        let tls = load_tls(&http).await.unwrap();

        let store = Arc::new(FileStore::in_memory());
        store.add("kept.txt", None, b"still here").unwrap();
        let server = StoreServer::new(ServerConfig::default(), Arc::clone(&store));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(server.serve_tls_on(listener, tls, async move {
            let _ = stop_rx.await;
        }));

        // The port accepts connections while serving.
        TcpStream::connect(addr).await.unwrap();

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
        assert_eq!(store.get("kept.txt").unwrap(), b"still here");
    }
}
