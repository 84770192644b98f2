//! JSON search API mounted next to the artifact routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::error::SearchError;
use crate::models::{AddRequest, SearchHit, SearchRequest};
use crate::services::Searcher;

pub fn router(searcher: Arc<Searcher>) -> Router {
    Router::new()
        .route("/api/search", post(search))
        .route("/api/add", post(add))
        .with_state(searcher)
}

async fn search(
    State(searcher): State<Arc<Searcher>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, SearchError> {
    let results = searcher
        .search(&request.query, request.top_k, request.threshold)
        .await?;
    Ok(Json(results.hits))
}

async fn add(
    State(searcher): State<Arc<Searcher>>,
    Json(request): Json<AddRequest>,
) -> Result<Json<serde_json::Value>, SearchError> {
    searcher
        .add(&request.key, &request.text, request.metadata)
        .await?;
    Ok(Json(json!({
        "message": "Vector added successfully",
        "key": request.key.trim(),
    })))
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response();
        }

        tracing::error!(error = %self, "search request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Internal server error" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::search::tests::{CosineStore, searcher};
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    fn app() -> Router {
        router(Arc::new(searcher(Arc::new(CosineStore::default()))))
    }

    #[tokio::test]
    async fn test_add_then_search() {
        let app = app();
        let (status, body) = post_json(
            app.clone(),
            "/api/add",
            json!({ "key": "doc_0", "text": "rust traits", "metadata": { "lang": "en" } }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Vector added successfully");
        assert_eq!(body["key"], "doc_0");

        post_json(app.clone(), "/api/add", json!({ "key": "doc_1", "text": "pasta" })).await;

        let (status, body) = post_json(app, "/api/search", json!({ "query": "rust macros" })).await;
        assert_eq!(status, StatusCode::OK);
        let hits = body.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["key"], "doc_0");
        assert_eq!(hits[0]["metadata"]["lang"], "en");
        assert_eq!(hits[0]["metadata"]["text_content"], "rust traits");
    }

    #[tokio::test]
    async fn test_search_with_no_matches_is_empty_array() {
        let (status, body) = post_json(app(), "/api/search", json!({ "query": "rust" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_bad_request() {
        let (status, body) =
            post_json(app(), "/api/search", json!({ "query": "rust", "threshold": 2.0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("threshold"));

        let (status, _) = post_json(app(), "/api/search", json!({ "query": "", "top_k": 3 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(app(), "/api/add", json!({ "key": "", "text": "rust" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_internal_error() {
        let (status, body) = post_json(app(), "/api/search", json!({ "query": "offline" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected() {
        let (status, _) = post_json(app(), "/api/add", json!({ "key": "doc_0" })).await;
        assert!(status.is_client_error());
    }
}
