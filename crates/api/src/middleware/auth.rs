//! # 鉴权中间件
//!
//! 终端与运维调用方使用同一个静态 Bearer Token (`server.api_key`)。

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::server::AppState;

/// 提取并验证 Authorization: Bearer <token>
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => {
            tracing::warn!("Missing Authorization header on {}", path);
            return Err(ApiError::Unauthorized("Missing Authorization header".into()));
        }
    };

    let raw = header_val
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid auth header".into()))?;
    let token = match raw.strip_prefix("Bearer ") {
        Some(t) => t.trim(),
        None => {
            tracing::warn!("Invalid Bearer format on {}", path);
            return Err(ApiError::Unauthorized("Invalid Bearer format".into()));
        }
    };

    if !token_matches(token, &state.config.server.api_key) {
        tracing::warn!("Rejected invalid API key on {}", path);
        return Err(ApiError::Unauthorized("Invalid API key".into()));
    }

    Ok(next.run(req).await)
}

/// 以 SHA-256 摘要比较 token，空密钥永不匹配
pub fn token_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
