//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tradepub_core::store::error::StoreError;
use tradepub_core::sync::error::SyncError;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 认证失败 (401)
    #[error("认证失败: {0}")]
    Unauthorized(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    Validation(String),

    /// 资源未找到 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 快照早于已存储状态 (409)
    #[error("状态冲突: {0}")]
    Conflict(String),

    /// 存储暂不可用，可重试 (503)
    #[error("存储暂不可用: {0}")]
    Unavailable(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 响应体中的 `kind` 字段
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "auth",
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unavailable(_) => "store",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match self {
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                "Internal server error".to_string()
            }
            ApiError::Unavailable(msg) => {
                tracing::warn!("Store unavailable: {}", msg);
                "Storage temporarily unavailable, retry later".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
        };

        let mut response = (status, Json(ApiErrorResponse::new(kind, message))).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// 从 `StoreError` 转换
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound => ApiError::NotFound(err.to_string()),
            _ if err.is_transient() => ApiError::Unavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

/// 从 `SyncError` 转换
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(msg) => ApiError::Validation(msg),
            SyncError::NotFound(msg) => ApiError::NotFound(msg),
            e @ SyncError::Conflict { .. } => ApiError::Conflict(e.to_string()),
            e @ SyncError::Timeout(_) => ApiError::Unavailable(e.to_string()),
            SyncError::Store(e) => e.into(),
        }
    }
}

/// 请求体 JSON 非法或字段类型错误
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
