//! Server configuration.
//!
//! Values resolve in order: built-in defaults, then a TOML file, then
//! `STORE_*` environment variables, then command-line overrides.

use std::path::{Path, PathBuf};

use fstore_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// File name looked up in each search directory.
pub const CONFIG_FILE_NAME: &str = "store.toml";

/// Directories searched for [`CONFIG_FILE_NAME`], in order. `$HOME/store` is
/// appended at runtime.
pub const SEARCH_DIRS: &[&str] = &[".", "./config", "./configs", "/etc/store"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpConfig,
    pub cors: CorsConfig,
    pub database: StoreConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Interface to bind; empty means all interfaces.
    pub host: String,
    pub port: u16,
    /// Log filter directive, e.g. `info` or `fstore_store=debug,info`.
    pub log: String,
    /// Force debug-level logging.
    pub debug: bool,
    /// Largest accepted request body, in MiB.
    pub max_upload_mb: u64,
    /// Serve HTTPS using `certificate` and `private_key`.
    pub tls: bool,
    /// PEM certificate chain.
    pub certificate: PathBuf,
    /// PEM private key.
    pub private_key: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
            log: "info".into(),
            debug: false,
            max_upload_mb: 64,
            tls: false,
            certificate: PathBuf::from("certificate.crt"),
            private_key: PathBuf::from("private.key"),
        }
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
        format!("{host}:{}", self.port)
    }

    pub fn body_limit_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

/// Cross-origin settings. `*` in any list means "any".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime, in seconds.
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let any = vec!["*".to_string()];
        Self {
            allow_origins: any.clone(),
            allow_methods: any.clone(),
            allow_headers: any.clone(),
            expose_headers: any,
            allow_credentials: true,
            max_age: 86_400,
        }
    }
}

/// Where the loaded configuration came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file was found; `looked_for` lists what was tried.
    Defaults { looked_for: Vec<PathBuf> },
}

/// Command-line values that take precedence over file and environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log: Option<String>,
    pub debug: bool,
    pub tls: bool,
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text).map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `explicit` if given, else the first file on the search path.
    ///
    /// A missing file yields defaults; a file that exists but cannot be read
    /// or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> ServerResult<(Self, ConfigSource)> {
        let candidates = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => search_paths(),
        };
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Ok((Self::from_file(path)?, ConfigSource::File(path.clone()))),
            None => Ok((Self::default(), ConfigSource::Defaults { looked_for: candidates })),
        }
    }

    /// Apply `STORE_*` environment variables.
    pub fn apply_env(&mut self) -> ServerResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("STORE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("STORE_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ServerError::Config(format!("STORE_SERVER_PORT={port}: {e}")))?;
        }
        if let Some(log) = get("STORE_SERVER_LOG") {
            self.server.log = log;
        }
        if let Some(tls) = get("STORE_SERVER_TLS") {
            self.server.tls = parse_flag(&tls)
                .ok_or_else(|| ServerError::Config(format!("STORE_SERVER_TLS={tls}: not a boolean")))?;
        }
        if let Some(path) = get("STORE_SERVER_CERTIFICATE") {
            self.server.certificate = PathBuf::from(path);
        }
        if let Some(path) = get("STORE_SERVER_PRIVATE_KEY") {
            self.server.private_key = PathBuf::from(path);
        }
        if let Some(path) = get("STORE_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(diskless) = get("STORE_DATABASE_DISKLESS") {
            self.database.diskless = parse_flag(&diskless)
                .ok_or_else(|| ServerError::Config(format!("STORE_DATABASE_DISKLESS={diskless}: not a boolean")))?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log) = &overrides.log {
            self.server.log = log.clone();
        }
        if overrides.debug {
            self.server.debug = true;
        }
        if overrides.tls {
            self.server.tls = true;
        }
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = SEARCH_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join("store"));
    }
    dirs.into_iter().map(|d| d.join(CONFIG_FILE_NAME)).collect()
}

/// Lenient boolean: `1/t/true/yes/on` and `0/f/false/no/off`, any case.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
