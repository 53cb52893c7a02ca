use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use propmatch_core::inventory::InventoryCache;
use propmatch_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub inventory: Arc<InventoryCache>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub inventory: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let inventory = inventory_check(&state.inventory);
    let ready = database.status == "ready" && inventory.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "propmatch-server runtime initialized".to_string(),
        },
        database,
        inventory,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn inventory_check(inventory: &InventoryCache) -> HealthCheck {
    let snapshot = inventory.current();
    if snapshot.is_loaded() {
        HealthCheck {
            status: "ready",
            detail: format!(
                "snapshot v{} with {} projects loaded at {}",
                snapshot.version(),
                snapshot.projects().len(),
                snapshot.loaded_at().to_rfc3339()
            ),
        }
    } else {
        HealthCheck { status: "degraded", detail: "no inventory snapshot loaded yet".to_string() }
    }
}
