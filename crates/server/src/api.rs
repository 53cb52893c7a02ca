//! `POST /v1/match`, the HTTP face of `AgentRuntime::handle`, and
//! `POST /v1/inventory/reload`, which swaps in a fresh inventory snapshot.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use propmatch_agent::AgentRuntime;
use propmatch_core::domain::filter::FilterInput;
use propmatch_core::errors::InterfaceError;
use propmatch_core::inventory::InventoryCache;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub inventory: Arc<InventoryCache>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<FilterInput>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub version: u64,
    pub projects: usize,
    pub loaded_at: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/match", post(match_request))
        .route("/v1/inventory/reload", post(reload_inventory))
        .with_state(state)
}

pub async fn match_request(
    State(state): State<ApiState>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = InterfaceError::BadRequest {
                message: rejection.body_text(),
                correlation_id: Uuid::new_v4().to_string(),
            };
            return error_response("match.request.rejected", StatusCode::BAD_REQUEST, error);
        }
    };

    match state.runtime.handle(&request.conversation_id, &request.query, request.filters.as_ref()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            let error = error.into_interface(Uuid::new_v4().to_string());
            error_response("match.request.rejected", StatusCode::BAD_REQUEST, error)
        }
    }
}

/// The previous snapshot keeps serving when the reload fails.
pub async fn reload_inventory(State(state): State<ApiState>) -> Response {
    match state.inventory.reload().await {
        Ok(snapshot) => {
            info!(
                event_name = "inventory.reload.completed",
                version = snapshot.version(),
                projects = snapshot.projects().len(),
                "inventory reloaded on request"
            );
            let body = ReloadResponse {
                version: snapshot.version(),
                projects: snapshot.projects().len(),
                loaded_at: snapshot.loaded_at().to_rfc3339(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(error) => {
            let error = InterfaceError::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: Uuid::new_v4().to_string(),
            };
            error_response("inventory.reload.failed", StatusCode::SERVICE_UNAVAILABLE, error)
        }
    }
}

fn error_response(event_name: &'static str, status: StatusCode, error: InterfaceError) -> Response {
    warn!(
        event_name,
        correlation_id = error.correlation_id(),
        error = %error,
        "request rejected"
    );
    let body = ErrorBody {
        error: error.user_message().to_string(),
        detail: error.to_string(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use propmatch_agent::llm::GuardedLlm;
    use propmatch_agent::AgentRuntime;
    use propmatch_core::domain::response::MatchResponse;
    use propmatch_core::inventory::source::StaticInventorySource;
    use propmatch_core::inventory::InventoryCache;
    use propmatch_db::{DemoInventory, InMemoryContextStore};
    use tower::ServiceExt;

    use super::{router, ApiState, ErrorBody, ReloadResponse};

    fn app_with(source: Arc<StaticInventorySource>) -> axum::Router {
        let inventory = Arc::new(InventoryCache::new(source, Duration::from_secs(1)));
        let contexts = Arc::new(InMemoryContextStore::new(chrono::Duration::minutes(30)));
        let runtime =
            AgentRuntime::new(inventory.clone(), contexts, GuardedLlm::disabled()).expect("runtime");
        router(ApiState { runtime: Arc::new(runtime), inventory })
    }

    fn app() -> axum::Router {
        let projects = DemoInventory::projects().expect("demo inventory");
        app_with(Arc::new(StaticInventorySource::new(projects)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/match")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    fn post_reload() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/inventory/reload")
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn match_returns_ranked_projects() {
        let response = app()
            .oneshot(post_json(
                r#"{"conversation_id": "http-1", "query": "homes in Yelahanka", "filters": {"bedrooms": 2, "max_price": "1.5 crore"}}"#,
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: MatchResponse = serde_json::from_slice(&bytes).expect("match response json");
        assert_eq!(payload.projects[0].name, "Aster Greens");
        assert!((3..=5).contains(&payload.answer_bullets.len()));
    }

    #[tokio::test]
    async fn missing_conversation_id_is_a_bad_request() {
        let response =
            app().oneshot(post_json(r#"{"query": "2BHK in Hebbal"}"#)).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: ErrorBody = serde_json::from_slice(&bytes).expect("error body json");
        assert_eq!(payload.detail, "bad request: conversation_id is required");
        assert!(!payload.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let response = app().oneshot(post_json("{not json")).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: ErrorBody = serde_json::from_slice(&bytes).expect("error body json");
        assert_eq!(payload.error, "The request could not be processed. Check inputs and try again.");
    }

    #[tokio::test]
    async fn reload_swaps_in_the_latest_inventory() {
        let projects = DemoInventory::projects().expect("demo inventory");
        let source = Arc::new(StaticInventorySource::new(projects[..2].to_vec()));
        let app = app_with(source.clone());

        let first = app.clone().oneshot(post_reload()).await.expect("router responds");
        assert_eq!(first.status(), StatusCode::OK);
        let bytes = to_bytes(first.into_body(), usize::MAX).await.expect("body");
        let first: ReloadResponse = serde_json::from_slice(&bytes).expect("reload json");
        assert_eq!(first.projects, 2);

        source.replace(projects).await;
        let second = app.oneshot(post_reload()).await.expect("router responds");
        let bytes = to_bytes(second.into_body(), usize::MAX).await.expect("body");
        let second: ReloadResponse = serde_json::from_slice(&bytes).expect("reload json");
        assert_eq!(second.projects, 8);
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn failed_reload_is_service_unavailable() {
        let app = app_with(Arc::new(StaticInventorySource::new(Vec::new())));

        let response = app.oneshot(post_reload()).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: ErrorBody = serde_json::from_slice(&bytes).expect("error body json");
        assert_eq!(payload.error, "The service is temporarily unavailable. Please retry shortly.");
    }
}
