//! Catalog HTTP server.
//!
//! Serves the HTML catalog pages over a shared [`Catalog`]. Parameters are
//! taken from the query string on `GET` and from the urlencoded body on
//! `POST`; both methods are accepted on the form routes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Landing page (`name` or `username`) |
//! | `GET` | `/items/` | Item page by `id` |
//! | `GET`/`POST` | `/create/` | Create an item from `name`, `description` |
//! | `GET`/`POST` | `/edit/` | Rename item `id` to `name` |
//! | `GET`/`POST` | `/stock/` | Add `by` (default 1) to the stock of item `id` |
//! | `GET` | `/search/` | Exact name search (`name`, `from`, `size`) |
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET` | `/static/*` | Files from `[server].static_dir` |
//!
//! # Error Contract
//!
//! An unknown item renders its page with status `404`. Validation failures
//! are `400`. Any index failure is a `500` with the error chain as a
//! plain-text body; the failure is scoped to the request.

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::catalog::{Catalog, Page, MAX_STOCK_INCREMENT};
use crate::config::Config;
use crate::models::{ItemRecord, Welcome};
use crate::pages;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(catalog: Catalog, config: Config) -> Self {
        Self {
            catalog,
            config: Arc::new(config),
        }
    }
}

/// Build the router with all catalog routes, static files, and request tracing.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/", get(handle_landing))
        .route("/items/", get(handle_item))
        .route("/create/", get(handle_create).post(handle_create))
        .route("/edit/", get(handle_edit).post(handle_edit))
        .route("/stock/", get(handle_stock).post(handle_stock))
        .route("/search/", get(handle_search))
        .route("/health", get(handle_health))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `[server].bind` and serve until Ctrl-C.
pub async fn run_server(config: &Config, catalog: Catalog) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(catalog, config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "catalog server listening");
    println!("Catalog server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("catalog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============ Error response ============

/// Request-scoped failure rendered as a plain-text response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        tracing::error!(error = %message, "request failed");
        internal(message)
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

fn html(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}

fn item_or_not_found(id: &str, record: Option<ItemRecord>) -> Response {
    match record {
        Some(record) => html(StatusCode::OK, pages::item(&record)),
        None => html(StatusCode::NOT_FOUND, pages::item_not_found(id)),
    }
}

// ============ GET / ============

#[derive(Debug, Default, Deserialize)]
struct LandingParams {
    name: Option<String>,
    username: Option<String>,
}

async fn handle_landing(
    State(state): State<AppState>,
    Form(params): Form<LandingParams>,
) -> Html<String> {
    let given = |field: Option<String>| {
        field
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    };
    let name = given(params.name)
        .or_else(|| given(params.username))
        .unwrap_or_else(|| state.config.server.welcome_name.clone());
    Html(pages::landing(&Welcome::now(name)))
}

// ============ GET /items/ ============

#[derive(Debug, Default, Deserialize)]
struct ItemParams {
    #[serde(default)]
    id: String,
}

async fn handle_item(
    State(state): State<AppState>,
    Form(params): Form<ItemParams>,
) -> Result<Response, AppError> {
    let id = params.id.trim();
    let record = state.catalog.get_item(id).await?;
    Ok(item_or_not_found(id, record))
}

// ============ /create/ ============

#[derive(Debug, Default, Deserialize)]
struct CreateParams {
    name: Option<String>,
    #[serde(default)]
    description: String,
}

/// A `GET` without a `name` shows the empty form; anything else creates.
async fn handle_create(
    State(state): State<AppState>,
    Form(params): Form<CreateParams>,
) -> Result<Response, AppError> {
    let Some(name) = params.name else {
        return Ok(html(
            StatusCode::OK,
            pages::create_form(None, "", &params.description),
        ));
    };
    if name.trim().is_empty() {
        return Ok(html(
            StatusCode::BAD_REQUEST,
            pages::create_form(Some("Item name must not be empty."), &name, &params.description),
        ));
    }

    let record = state
        .catalog
        .create_item(&name, params.description.trim())
        .await?;
    Ok(html(StatusCode::OK, pages::created(&record)))
}

// ============ /edit/ ============

#[derive(Debug, Default, Deserialize)]
struct EditParams {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

async fn handle_edit(
    State(state): State<AppState>,
    Form(params): Form<EditParams>,
) -> Result<Response, AppError> {
    let id = params.id.trim();
    if params.name.trim().is_empty() {
        return Err(bad_request("item name must not be empty"));
    }
    let record = state.catalog.rename_item(id, &params.name).await?;
    Ok(item_or_not_found(id, record))
}

// ============ /stock/ ============

#[derive(Debug, Default, Deserialize)]
struct StockParams {
    #[serde(default)]
    id: String,
    by: Option<u64>,
}

async fn handle_stock(
    State(state): State<AppState>,
    Form(params): Form<StockParams>,
) -> Result<Response, AppError> {
    let id = params.id.trim();
    let by = params.by.unwrap_or(1);
    if !(1..=MAX_STOCK_INCREMENT).contains(&by) {
        return Err(bad_request(format!(
            "by must be between 1 and {}",
            MAX_STOCK_INCREMENT
        )));
    }
    let record = state.catalog.increment_stock(id, by).await?;
    Ok(item_or_not_found(id, record))
}

// ============ GET /search/ ============

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    from: u32,
    size: Option<u32>,
}

async fn handle_search(
    State(state): State<AppState>,
    Form(params): Form<SearchParams>,
) -> Result<Html<String>, AppError> {
    let page = Page {
        from: params.from,
        size: params.size,
    };
    let results = state.catalog.search_by_name(&params.name, page).await?;
    Ok(Html(pages::list(params.name.trim(), &results)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_error_becomes_500_with_chain() {
        let err = anyhow::anyhow!("connection refused").context("Failed to get item 1");
        let app_err = AppError::from(err);
        assert_eq!(app_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app_err.message, "Failed to get item 1: connection refused");
    }

    #[test]
    fn test_bad_request_status() {
        let resp = bad_request("nope").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
