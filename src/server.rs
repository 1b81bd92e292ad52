// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API
//!
//! Handlers are thin adapters: they parse the request, hand the SQLite and
//! embedding work to `web::block`, and serialise the result. Database files
//! are opened per request; the embedding model is loaded once and shared
//! behind a mutex.

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, ResponseError};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::analytics;
use crate::catalog::{Catalog, NewRecord, SearchField};
use crate::config::Config;
use crate::embedding::{Collection, EmbeddingProvider};
use crate::errors::ArchiveError;
use crate::ingest::{self, IngestSummary, SyncOptions};
use crate::search::{self, PreparedQuery, SearchRequest};

/// Shared application state
pub struct AppState {
    pub config: Config,
    provider: Arc<Mutex<Box<dyn EmbeddingProvider>>>,
}

impl AppState {
    pub fn new(config: Config, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            provider: Arc::new(Mutex::new(provider)),
        }
    }

    fn catalog(&self) -> Result<Catalog> {
        Catalog::open(self.config.catalog.path())
    }

    fn collection(&self) -> Result<Collection> {
        Collection::open(self.config.collection.path(), self.config.collection.name())
    }

    fn with_provider<R>(
        &self,
        f: impl FnOnce(&mut dyn EmbeddingProvider) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self
            .provider
            .lock()
            .map_err(|_| anyhow!("embedding provider lock poisoned"))?;
        f(&mut **guard)
    }

    /// Sync the collection with the catalogue.
    pub fn sync(&self, force: bool) -> Result<IngestSummary> {
        let catalog = self.catalog()?;
        let mut collection = self.collection()?;
        self.with_provider(|provider| {
            ingest::sync(
                &catalog,
                &mut collection,
                provider,
                SyncOptions {
                    force,
                    progress: false,
                },
            )
        })
    }
}

/// Error wrapper that turns domain errors into JSON responses
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        Self(err.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.downcast_ref::<ArchiveError>() {
            Some(ArchiveError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {:#}", self.0);
        }
        HttpResponse::build(status).json(json!({ "error": self.0.to_string() }))
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run `f` on the blocking thread pool.
async fn blocking<F, R>(f: F) -> ApiResult<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| ApiError(anyhow!("blocking task failed: {}", e)))?
        .map_err(ApiError)
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("archive-search API is running")
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

async fn list_metadata(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let records = blocking(move || state.catalog()?.list_all()).await?;
    Ok(HttpResponse::Ok().json(records))
}

async fn get_metadata(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    let record = blocking(move || {
        state
            .catalog()?
            .get(id)?
            .ok_or_else(|| ArchiveError::NotFound(id).into())
    })
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Debug, Deserialize)]
struct FieldSearchParams {
    field: Option<String>,
    q: Option<String>,
}

async fn field_search(
    state: web::Data<AppState>,
    params: web::Query<FieldSearchParams>,
) -> ApiResult<HttpResponse> {
    let params = params.into_inner();
    let field = params
        .field
        .filter(|f| !f.trim().is_empty())
        .ok_or(ArchiveError::MissingParameter("field"))?;
    let needle = params.q.ok_or(ArchiveError::MissingParameter("q"))?;
    let field: SearchField = field.parse()?;

    let records = blocking(move || state.catalog()?.search_field(field, &needle)).await?;
    Ok(HttpResponse::Ok().json(records))
}

async fn semantic_search(
    state: web::Data<AppState>,
    body: web::Json<SearchRequest>,
) -> ApiResult<HttpResponse> {
    let prepared = PreparedQuery::prepare(&body, &state.config.search)?;
    let result = blocking(move || {
        // Only the embedding step needs the shared model.
        let embedding = state.with_provider(|provider| search::embed_query(provider, &prepared))?;
        search::query_embedding(&state.collection()?, &prepared, embedding)
    })
    .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn difficulty_distribution(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let counts =
        blocking(move || analytics::difficulty_distribution(&state.collection()?)).await?;
    Ok(HttpResponse::Ok().json(counts))
}

async fn genre_distribution(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let counts = blocking(move || analytics::genre_distribution(&state.collection()?)).await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[derive(Debug, Deserialize)]
struct ClusterParams {
    n: Option<usize>,
}

async fn clusters(
    state: web::Data<AppState>,
    params: web::Query<ClusterParams>,
) -> ApiResult<HttpResponse> {
    let n = params
        .n
        .unwrap_or_else(|| state.config.analytics.default_clusters());
    let clusters = blocking(move || {
        analytics::cluster_records(&state.collection()?, n, &state.config.analytics)
    })
    .await?;
    Ok(HttpResponse::Ok().json(clusters))
}

async fn add_record(
    state: web::Data<AppState>,
    body: web::Json<NewRecord>,
) -> ApiResult<HttpResponse> {
    let new_record = body.into_inner();
    let record = blocking(move || {
        let catalog = state.catalog()?;
        let mut collection = state.collection()?;
        state.with_provider(|provider| {
            ingest::add_record(&catalog, &mut collection, provider, new_record)
        })
    })
    .await?;
    Ok(HttpResponse::Created().json(record))
}

#[derive(Debug, Deserialize)]
struct IngestParams {
    #[serde(default)]
    force: bool,
}

async fn reingest(
    state: web::Data<AppState>,
    params: web::Query<IngestParams>,
) -> ApiResult<HttpResponse> {
    let force = params.force;
    let summary = blocking(move || state.sync(force)).await?;
    Ok(HttpResponse::Ok().json(summary))
}

fn bad_request(message: String) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(json!({ "error": &message }));
    InternalError::from_response(message, response).into()
}

/// Extractor configs so malformed paths, query strings and bodies get JSON errors too.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|err, _req: &HttpRequest| bad_request(err.to_string())),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req: &HttpRequest| bad_request(err.to_string())),
    )
    .app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req: &HttpRequest| bad_request(err.to_string())),
    );
}

/// Register every route. The caller provides `web::Data<AppState>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/metadata", web::get().to(list_metadata))
        .route("/metadata/{id}", web::get().to(get_metadata))
        .service(
            web::resource("/search")
                .route(web::get().to(field_search))
                .route(web::post().to(semantic_search)),
        )
        .route("/ai-search", web::post().to(semantic_search))
        .service(
            web::scope("/analytics")
                .route("/difficulty", web::get().to(difficulty_distribution))
                .route("/genre", web::get().to(genre_distribution))
                .route("/clusters", web::get().to(clusters)),
        )
        .route("/records", web::post().to(add_record))
        .route("/ingest", web::post().to(reingest));
}

/// Start the HTTP server and block until it shuts down.
pub fn serve(state: AppState) -> Result<()> {
    if state.config.server.ingest_on_start() {
        let summary = state.sync(false).context("Initial ingest failed")?;
        tracing::info!(
            total = summary.total,
            embedded = summary.embedded,
            "collection ready"
        );
    }

    actix_web::rt::System::new().block_on(run(state))
}

async fn run(state: AppState) -> Result<()> {
    let host = state.config.server.host().to_string();
    let port = state.config.server.port();
    let workers = state.config.server.workers;
    let data = web::Data::new(state);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(configure)
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    tracing::info!("listening on http://{}:{}", host, port);
    server
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind {}:{}", host, port))?
        .run()
        .await
        .context("HTTP server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |err: ArchiveError| ApiError::from(err).status_code();
        assert_eq!(status(ArchiveError::NotFound(9)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ArchiveError::UnsearchableField("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ArchiveError::MissingParameter("q")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ArchiveError::embedding("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
