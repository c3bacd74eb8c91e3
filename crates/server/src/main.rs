use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bucket_sort::BucketSorter;
use serde::Deserialize;
use server_api::{
    arrays_route, create_array, delete_array, list_arrays, parse_json_body,
    partial_update_array, retrieve_array, sort_array, sort_route, update_array, ApiContext,
};
use shared::{
    domain::ArrayId,
    error::{ApiError, ErrorCode},
    protocol::{
        ArrayPayload, CreateArrayRequest, Page, PatchArrayRequest, SortRequest, SortResponse,
        UpdateArrayRequest,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct ListArraysQuery {
    page: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        sorter: BucketSorter::new(settings.bucket_count)?,
        page_size: settings.page_size,
    };

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(
        %addr,
        %database_url,
        buckets = settings.bucket_count,
        page_size = settings.page_size,
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(arrays_route(), get(http_list_arrays).post(http_create_array))
        .route(
            "/api/arrays/:array_id/",
            get(http_retrieve_array)
                .put(http_update_array)
                .patch(http_partial_update_array)
                .delete(http_delete_array),
        )
        .route(sort_route(), post(http_sort_array))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn reject(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err.message, "request failed");
    }
    (status, Json(err))
}

fn read_body<T: serde::de::DeserializeOwned>(
    body: Result<Bytes, BytesRejection>,
) -> Result<T, HttpError> {
    let body = body.map_err(|rejection| {
        let code = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorCode::PayloadTooLarge
        } else {
            ErrorCode::Validation
        };
        reject(ApiError::new(code, rejection.body_text()))
    })?;
    parse_json_body(&body).map_err(reject)
}

/// Unparseable ids cannot name a stored array, so they are reported as missing.
fn parse_array_id(raw: &str) -> Result<ArrayId, HttpError> {
    raw.trim()
        .parse::<i64>()
        .map(ArrayId)
        .map_err(|_| reject(ApiError::new(ErrorCode::NotFound, "array not found")))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

async fn http_list_arrays(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListArraysQuery>,
) -> Result<Json<Page<ArrayPayload>>, HttpError> {
    let page = list_arrays(&state.api, q.page.as_deref())
        .await
        .map_err(reject)?;
    Ok(Json(page))
}

async fn http_create_array(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<ArrayPayload>), HttpError> {
    let request: CreateArrayRequest = read_body(body)?;
    let created = create_array(&state.api, request).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_retrieve_array(
    State(state): State<Arc<AppState>>,
    Path(array_id): Path<String>,
) -> Result<Json<ArrayPayload>, HttpError> {
    let array_id = parse_array_id(&array_id)?;
    let array = retrieve_array(&state.api, array_id)
        .await
        .map_err(reject)?;
    Ok(Json(array))
}

async fn http_update_array(
    State(state): State<Arc<AppState>>,
    Path(array_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ArrayPayload>, HttpError> {
    let array_id = parse_array_id(&array_id)?;
    let request: UpdateArrayRequest = read_body(body)?;
    let array = update_array(&state.api, array_id, request)
        .await
        .map_err(reject)?;
    Ok(Json(array))
}

async fn http_partial_update_array(
    State(state): State<Arc<AppState>>,
    Path(array_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ArrayPayload>, HttpError> {
    let array_id = parse_array_id(&array_id)?;
    let request: PatchArrayRequest = read_body(body)?;
    let array = partial_update_array(&state.api, array_id, request)
        .await
        .map_err(reject)?;
    Ok(Json(array))
}

async fn http_delete_array(
    State(state): State<Arc<AppState>>,
    Path(array_id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let array_id = parse_array_id(&array_id)?;
    delete_array(&state.api, array_id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_sort_array(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SortResponse>, HttpError> {
    let request: SortRequest = read_body(body)?;
    let response = sort_array(&state.api, request).await.map_err(reject)?;
    Ok(Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
