//! Request handlers for the `/store` API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use fstore_store::{FileStore, StoreResult, UpdateOutcome};
use fstore_types::{Digest, Listing, Order, WordFrequency};
use serde::Deserialize;

use crate::config::parse_flag;
use crate::error::{ServerError, ServerResult};

/// Header a client checks to confirm it is talking to a file store.
pub const STORE_HEADER: &str = "Store";
pub const FINGERPRINT: &str = "703273357638792F";

const STORE_INFO: &str = include_str!("../assets/store.info");

/// Multipart field carrying the payload; its filename is the stored name.
pub const FILE_FIELD: &str = "file";
/// Optional multipart field carrying the hex digest of the payload.
pub const SHA_FIELD: &str = "SHA";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
}

impl AppState {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// Run a store call on the blocking pool.
    async fn blocking<T, F>(&self, call: F) -> ServerResult<T>
    where
        F: FnOnce(&FileStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || call(&store)).await??)
    }
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct ShaQuery {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    pub order: Option<String>,
    pub limit: Option<String>,
}

/// A decoded upload form.
#[derive(Debug)]
struct Upload {
    name: String,
    digest: Option<Digest>,
    payload: Bytes,
}

impl Upload {
    async fn read(mut form: Multipart) -> ServerResult<Self> {
        let mut digest = None;
        let mut file = None;
        while let Some(field) = form.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                SHA_FIELD => {
                    let text = field.text().await?;
                    if !text.trim().is_empty() {
                        digest = Some(Digest::from_hex(&text)?);
                    }
                }
                FILE_FIELD => {
                    let name = field
                        .file_name()
                        .map(str::to_string)
                        .ok_or_else(|| ServerError::BadRequest("file field has no filename".into()))?;
                    file = Some((name, field.bytes().await?));
                }
                _ => {}
            }
        }
        let (name, payload) = file.ok_or_else(|| ServerError::BadRequest("missing file field".into()))?;
        Ok(Self { name, digest, payload })
    }
}

pub async fn root() -> impl IntoResponse {
    ([(STORE_HEADER, FINGERPRINT)], STORE_INFO)
}

pub async fn get_file(State(state): State<AppState>, Query(query): Query<FileQuery>) -> ServerResult<impl IntoResponse> {
    let name = query.file;
    let lookup = name.clone();
    let payload = state.blocking(move |store| store.get(&lookup)).await?;
    let disposition = format!("attachment; filename={name}");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload,
    ))
}

pub async fn add_file(State(state): State<AppState>, form: Multipart) -> ServerResult<StatusCode> {
    let upload = Upload::read(form).await?;
    let name = upload.name.clone();
    let digest = state
        .blocking(move |store| store.add(&upload.name, upload.digest.as_ref(), &upload.payload))
        .await?;
    tracing::info!(file = %name, digest = %digest.short_hex(), "file added");
    Ok(StatusCode::CREATED)
}

pub async fn update_file(State(state): State<AppState>, form: Multipart) -> ServerResult<StatusCode> {
    let upload = Upload::read(form).await?;
    let name = upload.name.clone();
    let outcome = state
        .blocking(move |store| store.update(&upload.name, upload.digest.as_ref(), &upload.payload))
        .await?;
    tracing::info!(file = %name, ?outcome, "file updated");
    Ok(match outcome {
        UpdateOutcome::Created => StatusCode::CREATED,
        UpdateOutcome::Updated => StatusCode::OK,
    })
}

pub async fn remove_file(State(state): State<AppState>, Query(query): Query<FileQuery>) -> ServerResult<StatusCode> {
    let name = query.file;
    let target = name.clone();
    state.blocking(move |store| store.remove(&target)).await?;
    tracing::info!(file = %name, "file removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_file(State(state): State<AppState>, Query(query): Query<FileQuery>) -> ServerResult<StatusCode> {
    let exists = state.blocking(move |store| Ok(store.file_exists(&query.file))).await?;
    Ok(found_or_404(exists))
}

pub async fn check_sha(State(state): State<AppState>, Query(query): Query<ShaQuery>) -> ServerResult<StatusCode> {
    let digest = Digest::from_hex(&query.sha)?;
    let exists = state.blocking(move |store| Ok(store.content_exists(&digest))).await?;
    Ok(found_or_404(exists))
}

pub async fn list_files(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ServerResult<Json<Listing>> {
    let details = query.details.as_deref().and_then(parse_flag).unwrap_or(false);
    let listing = state.blocking(move |store| store.list(details)).await?;
    Ok(Json(listing))
}

pub async fn word_count(State(state): State<AppState>) -> ServerResult<String> {
    Ok(state.store.word_count().await?.to_string())
}

pub async fn word_frequency(
    State(state): State<AppState>,
    Query(query): Query<FrequencyQuery>,
) -> ServerResult<Json<Vec<WordFrequency>>> {
    let order = query.order.as_deref().map(Order::parse_lenient).unwrap_or_default();
    // An unparseable limit means no limit.
    let limit = query.limit.as_deref().and_then(|l| l.trim().parse::<usize>().ok());
    Ok(Json(state.store.word_frequency(order, limit).await?))
}

fn found_or_404(found: bool) -> StatusCode {
    if found {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
