//! # 信号队列路由
//!
//! 终端轮询 `GET /api/signals/{id}` 取回待执行的指令，执行后逐条确认。
//! 运维方或自动化策略通过 `POST /api/signals` 入队新指令。

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use std::str::FromStr;

use tradepub_core::common::{AccountNumber, SignalId, Ticket};
use tradepub_core::signal::entity::{SignalCommand, SignalType};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    AckResponse, ApiErrorResponse, ApiResponse, EnqueueSignalRequest, PurgeQuery, PurgeResponse,
    SignalListResponse, SignalResponse,
};

/// 查询账户的待处理信号
///
/// 按入队顺序返回全部 `processed = false` 的信号。未知账户返回空列表。
#[utoipa::path(
    get,
    path = "/api/signals/{id}",
    tag = "信号 (Signals)",
    security(("bearer" = [])),
    params(
        ("id" = i64, Path, description = "终端账户号")
    ),
    responses(
        (status = 200, description = "待处理信号", body = ApiResponse<SignalListResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn get_signals(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<SignalListResponse>>, ApiError> {
    let Path(account_number) = path?;
    let signals = state
        .queue
        .pending(AccountNumber(account_number))
        .await?
        .into_iter()
        .map(SignalResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::ok(SignalListResponse {
        count: signals.len(),
        signals,
    })))
}

/// 入队一条信号
///
/// CLOSE / MODIFY 必须引用账户当前持仓的 ticket；OPEN 不携带 ticket。
#[utoipa::path(
    post,
    path = "/api/signals",
    tag = "信号 (Signals)",
    security(("bearer" = [])),
    request_body = EnqueueSignalRequest,
    responses(
        (status = 200, description = "已入队", body = ApiResponse<SignalResponse>),
        (status = 400, description = "指令非法", body = ApiErrorResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户或持仓不存在", body = ApiErrorResponse)
    )
)]
pub async fn enqueue_signal(
    State(state): State<AppState>,
    body: Result<Json<EnqueueSignalRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SignalResponse>>, ApiError> {
    let Json(req) = body?;

    let account = req
        .account_number
        .map(AccountNumber)
        .ok_or_else(|| ApiError::Validation("Missing required field: account_number".into()))?;
    let signal_type = req
        .signal_type
        .as_deref()
        .ok_or_else(|| ApiError::Validation("Missing required field: signal_type".into()))
        .and_then(|s| SignalType::from_str(s).map_err(ApiError::Validation))?;
    let command = SignalCommand::from_parts(signal_type, req.ticket.map(Ticket), req.signal_data)
        .map_err(ApiError::Validation)?;

    let signal = state.queue.enqueue(account, command).await?;
    Ok(Json(ApiResponse::ok(SignalResponse::try_from(signal)?)))
}

/// 确认信号已处理
///
/// 幂等：重复确认返回 `already_processed`，未知 id 返回 `unknown`，均为 200。
#[utoipa::path(
    post,
    path = "/api/signals/{id}/processed",
    tag = "信号 (Signals)",
    security(("bearer" = [])),
    params(
        ("id" = i64, Path, description = "信号 ID")
    ),
    responses(
        (status = 200, description = "确认结果", body = ApiResponse<AckResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn acknowledge_signal(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<AckResponse>>, ApiError> {
    let Path(signal_id) = path?;
    let outcome = state.queue.acknowledge(SignalId(signal_id)).await?;
    Ok(Json(ApiResponse::ok(AckResponse { signal_id, outcome })))
}

/// 清理已处理信号
///
/// 只删除 `processed_at` 早于 `processed_before` 的已处理信号，待处理信号永不删除。
#[utoipa::path(
    delete,
    path = "/api/signals",
    tag = "信号 (Signals)",
    security(("bearer" = [])),
    params(PurgeQuery),
    responses(
        (status = 200, description = "清理条数", body = ApiResponse<PurgeResponse>),
        (status = 400, description = "缺少 processed_before", body = ApiErrorResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn purge_signals(
    State(state): State<AppState>,
    query: Result<Query<PurgeQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<PurgeResponse>>, ApiError> {
    let Query(query) = query?;
    let purged = state.queue.purge_processed(query.cutoff()?).await?;
    Ok(Json(ApiResponse::ok(PurgeResponse { purged })))
}
