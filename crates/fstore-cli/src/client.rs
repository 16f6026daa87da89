//! HTTP client for a file store server, plus the saved client configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use fstore_types::{Digest, FileRecord, Order, WordFrequency};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Client configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = ".StoreConfig";

/// Value of the `Store` header every file store server sends from `/`.
pub const FINGERPRINT: &str = "703273357638792F";

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub url: String,
}

impl ClientConfig {
    /// Read the config file. `Ok(None)` if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }
}

/// How an upload identifies its content.
#[derive(Debug)]
pub enum Content {
    /// Content the server already has; only the digest is sent.
    Known(Digest),
    /// Full payload.
    Payload(Vec<u8>),
}

/// Whether an upload must create a new name or may replace one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    Add,
    Update,
}

impl UploadMode {
    fn method(self) -> Method {
        match self {
            Self::Add => Method::POST,
            Self::Update => Method::PUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreClient {
    base: String,
    http: Client,
}

impl StoreClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base = base_url.trim().trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!("store URL must start with http:// or https://: {base_url}");
        }
        let http = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Confirm the URL points at a file store.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let response = self.http.get(self.url("/")).send().await?;
        if response.status() != StatusCode::OK {
            bail!("{} answered {}", self.base, response.status());
        }
        let fingerprint = response.headers().get("Store").and_then(|v| v.to_str().ok());
        if fingerprint != Some(FINGERPRINT) {
            bail!("{} is not a file store", self.base);
        }
        Ok(())
    }

    pub async fn file_exists(&self, name: &str) -> anyhow::Result<bool> {
        let response = self
            .http
            .get(self.url("store/check/file"))
            .query(&[("file", name)])
            .send()
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    pub async fn content_exists(&self, digest: &Digest) -> anyhow::Result<bool> {
        let response = self
            .http
            .get(self.url("store/check/sha"))
            .query(&[("sha", digest.to_hex())])
            .send()
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Send a file. Returns the server's status; the caller interprets it.
    pub async fn upload(&self, mode: UploadMode, name: &str, content: Content) -> anyhow::Result<StatusCode> {
        let (sha, payload) = match content {
            Content::Known(digest) => (digest.to_hex(), Vec::new()),
            Content::Payload(payload) => (String::new(), payload),
        };
        let part = Part::bytes(payload)
            .file_name(name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().text("SHA", sha).part("file", part);

        let response = self
            .http
            .request(mode.method(), self.url("store"))
            .multipart(form)
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.http.get(self.url("store")).query(&[("file", name)]).send().await?;
        let response = expect_ok(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn remove(&self, name: &str) -> anyhow::Result<StatusCode> {
        let response = self
            .http
            .delete(self.url("store"))
            .query(&[("file", name)])
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn list_names(&self) -> anyhow::Result<Vec<String>> {
        let response = self
            .http
            .get(self.url("store/list"))
            .query(&[("details", "false")])
            .send()
            .await?;
        Ok(expect_ok(response).await?.json().await?)
    }

    pub async fn list_details(&self) -> anyhow::Result<Vec<FileRecord>> {
        let response = self
            .http
            .get(self.url("store/list"))
            .query(&[("details", "true")])
            .send()
            .await?;
        Ok(expect_ok(response).await?.json().await?)
    }

    pub async fn word_count(&self) -> anyhow::Result<u64> {
        let response = self.http.get(self.url("store/count")).send().await?;
        let text = expect_ok(response).await?.text().await?;
        text.trim()
            .parse()
            .with_context(|| format!("unexpected word count: {text:?}"))
    }

    pub async fn word_frequency(&self, order: Order, limit: usize) -> anyhow::Result<Vec<WordFrequency>> {
        let response = self
            .http
            .get(self.url("store/frequency"))
            .query(&[("order", order.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        Ok(expect_ok(response).await?.json().await?)
    }
}

async fn expect_ok(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        bail!("server answered {status}");
    }
    bail!("server answered {status}: {body}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(ClientConfig::load(&path).unwrap(), None);

        let config = ClientConfig {
            url: "http://localhost:8080".into(),
        };
        config.save(&path).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), Some(config));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(ClientConfig::load(&path).is_err());
    }

    #[test]
    fn urls_join_cleanly() {
        let client = StoreClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("store/list"), "http://localhost:8080/store/list");
        assert_eq!(client.url("/"), "http://localhost:8080/");
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(StoreClient::new("localhost:8080").is_err());
    }

    #[test]
    fn upload_modes_map_to_methods() {
        assert_eq!(UploadMode::Add.method(), Method::POST);
        assert_eq!(UploadMode::Update.method(), Method::PUT);
    }
}
