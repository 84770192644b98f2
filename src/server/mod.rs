//! HTTP server distributing model artifacts with byte-range support.

pub mod api;
pub mod artifact;
pub mod range;

use std::io::SeekFrom;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::Stream;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::error::ArtifactError;
use crate::models::ServerConfig;
use crate::services::Searcher;

pub use artifact::{ArtifactDescriptor, ArtifactStore, OpenArtifact};
pub use range::ByteRange;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ArtifactStore>,
    pub chunk_size: usize,
}

impl AppState {
    pub fn new(store: ArtifactStore, chunk_size: usize) -> Self {
        Self {
            store: Arc::new(store),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(ArtifactStore::from_config(config), config.chunk_size)
    }
}

/// Artifact routes, plus the search API when a `searcher` is given.
pub fn router(state: AppState, searcher: Option<Arc<Searcher>>) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/models/{name}", get(get_model))
        .with_state(state);
    if let Some(searcher) = searcher {
        app = app.merge(api::router(searcher));
    }
    app.layer(TraceLayer::new_for_http())
}

/// Bind `config.bind` and serve until SIGINT or SIGTERM.
pub async fn run_server(
    config: &ServerConfig,
    searcher: Option<Arc<Searcher>>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        models_dir = %config.models_dir.display(),
        search_api = searcher.is_some(),
        "serving model artifacts"
    );

    axum::serve(listener, router(AppState::from_config(config), searcher))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the simplisearch model server" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ArtifactError> {
    let range = headers.get(header::RANGE).map(|value| value.to_str().unwrap_or_default());
    serve_artifact(&state.store, &name, range, state.chunk_size).await
}

/// Resolve `name` and stream it, whole or the span selected by `range`.
pub async fn serve_artifact(
    store: &ArtifactStore,
    name: &str,
    range: Option<&str>,
    chunk_size: usize,
) -> Result<Response, ArtifactError> {
    let OpenArtifact { mut file, descriptor } = store.open(name).await?;
    let size = descriptor.size;

    let Some(range) = range else {
        tracing::debug!(artifact = %descriptor.name, size, "full download");
        let body = Body::from_stream(chunked(file, chunk_size));
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_LENGTH, size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
            ],
            body,
        )
            .into_response());
    };

    let span = ByteRange::parse(range, size)?;
    tracing::debug!(
        artifact = %descriptor.name,
        start = span.start,
        end = span.end,
        size,
        "range download"
    );

    file.seek(SeekFrom::Start(span.start)).await?;
    let reader = file.take(span.content_length());
    let body = Body::from_stream(chunked(reader, chunk_size));

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_RANGE, span.content_range(size)),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_LENGTH, span.content_length().to_string()),
            (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Yields `reader` in chunks of at most `chunk_size` bytes until EOF.
fn chunked<R>(reader: R, chunk_size: usize) -> impl Stream<Item = std::io::Result<Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::try_unfold(reader, move |mut reader| async move {
        let mut buf = vec![0u8; chunk_size];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), reader)))
    })
}

impl IntoResponse for ArtifactError {
    fn into_response(self) -> Response {
        match self {
            ArtifactError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Model not found" })),
            )
                .into_response(),
            ArtifactError::RangeNotSatisfiable { size } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                Json(json!({ "detail": "Requested range not satisfiable" })),
            )
                .into_response(),
            ArtifactError::Io(e) => {
                tracing::error!(error = %e, "artifact read failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
