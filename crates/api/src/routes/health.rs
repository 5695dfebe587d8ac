//! # 服务描述与健康检查 (无需鉴权)

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use tradepub_core::common::time::TimeProvider;

use crate::types::{ApiResponse, HealthResponse, ServiceDescriptor};
use crate::server::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 服务描述，列出可用接口
#[utoipa::path(
    get,
    path = "/",
    tag = "运维 (Ops)",
    responses(
        (status = 200, description = "服务描述", body = ApiResponse<ServiceDescriptor>)
    )
)]
pub async fn root() -> Json<ApiResponse<ServiceDescriptor>> {
    let endpoints: BTreeMap<String, String> = [
        ("health", "/api/health (GET)"),
        ("publish_trades", "/api/trades (POST)"),
        ("get_trades", "/api/trades/{account_number} (GET)"),
        ("close_trade", "/api/trades/{account_number}/close/{ticket} (POST)"),
        ("get_accounts", "/api/accounts (GET)"),
        ("delete_account", "/api/accounts/{account_number} (DELETE)"),
        ("get_signals", "/api/signals/{account_number} (GET)"),
        ("enqueue_signal", "/api/signals (POST)"),
        ("purge_signals", "/api/signals?processed_before={unix} (DELETE)"),
        ("ack_signal", "/api/signals/{signal_id}/processed (POST)"),
        ("docs", "/swagger-ui"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(ApiResponse::ok(ServiceDescriptor {
        service: "Trade Publisher API".to_string(),
        version: VERSION.to_string(),
        status: "running".to_string(),
        endpoints,
    }))
}

/// 健康检查
///
/// 对存储执行一次连通性探测。存储不可用时返回 503 与 `status: unhealthy`。
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "运维 (Ops)",
    responses(
        (status = 200, description = "服务与存储正常", body = ApiResponse<HealthResponse>),
        (status = 503, description = "存储不可用", body = ApiResponse<HealthResponse>)
    )
)]
pub async fn health(State(state): State<AppState>) -> Response {
    let timestamp = state.clock.now().timestamp();
    match state.accounts.ping().await {
        Ok(()) => Json(ApiResponse::ok(HealthResponse {
            status: "healthy".to_string(),
            database: "connected".to_string(),
            timestamp,
            version: VERSION.to_string(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            let body = ApiResponse {
                success: false,
                data: HealthResponse {
                    status: "unhealthy".to_string(),
                    database: "disconnected".to_string(),
                    timestamp,
                    version: VERSION.to_string(),
                },
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
