//! # 快照上报与持仓查询路由
//!
//! 终端通过 `POST /api/trades` 推送完整快照，运维方查询当前持仓或为某笔持仓发出平仓信号。

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};

use tradepub_core::common::{AccountNumber, Ticket};
use tradepub_core::signal::entity::{ClosePayload, SignalCommand};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiErrorResponse, ApiResponse, Pagination, ReconcileResponse, SignalResponse, SnapshotRequest,
    TradeListResponse, TradeResponse, TradesQuery,
};

/// 每页默认条数
pub const DEFAULT_LIMIT: u32 = 100;
/// 每页最大条数
pub const MAX_LIMIT: u32 = 1000;

/// 上报账户快照
///
/// 以快照为准更新账户资金字段与持仓集合：新 ticket 插入，已知 ticket 只更新可变字段，
/// 快照中缺失的 ticket 视为已平仓并删除。整个过程在单个事务中完成。
#[utoipa::path(
    post,
    path = "/api/trades",
    tag = "持仓 (Trades)",
    security(("bearer" = [])),
    request_body = SnapshotRequest,
    responses(
        (status = 200, description = "对账完成", body = ApiResponse<ReconcileResponse>),
        (status = 400, description = "快照字段缺失或非法", body = ApiErrorResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 409, description = "快照早于已存储状态", body = ApiErrorResponse),
        (status = 503, description = "存储暂不可用，可重试", body = ApiErrorResponse)
    )
)]
pub async fn publish_trades(
    State(state): State<AppState>,
    body: Result<Json<SnapshotRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ReconcileResponse>>, ApiError> {
    let Json(req) = body?;
    let snapshot = req.into_snapshot()?;
    let report = state.reconciler.reconcile(snapshot).await?;
    Ok(Json(ApiResponse::ok(report.into())))
}

/// 查询账户当前持仓
///
/// 按 `open_time` 倒序分页返回，附带账户资金快照。
#[utoipa::path(
    get,
    path = "/api/trades/{account_number}",
    tag = "持仓 (Trades)",
    security(("bearer" = [])),
    params(
        ("account_number" = i64, Path, description = "终端账户号"),
        TradesQuery
    ),
    responses(
        (status = 200, description = "当前持仓", body = ApiResponse<TradeListResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户不存在", body = ApiErrorResponse)
    )
)]
pub async fn get_trades(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<TradesQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<TradeListResponse>>, ApiError> {
    let Path(account_number) = path?;
    let Query(query) = query?;
    let account_number = AccountNumber(account_number);

    let account = state
        .accounts
        .get_account(account_number)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Account {} not found", account_number)))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    // 多取一条判断是否还有下一页
    let mut trades = state
        .accounts
        .list_trades(account_number, limit + 1, offset)
        .await?;
    let page = usize::try_from(limit).unwrap_or(usize::MAX);
    let has_more = trades.len() > page;
    trades.truncate(page);

    let trades: Vec<TradeResponse> = trades.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(TradeListResponse {
        account: account.into(),
        trades_count: trades.len(),
        trades,
        pagination: Pagination {
            limit,
            offset,
            has_more,
        },
    })))
}

/// 为指定持仓发出平仓信号
///
/// 持仓必须是该账户当前的持仓，否则返回 404。
#[utoipa::path(
    post,
    path = "/api/trades/{account_number}/close/{ticket}",
    tag = "持仓 (Trades)",
    security(("bearer" = [])),
    params(
        ("account_number" = i64, Path, description = "终端账户号"),
        ("ticket" = i64, Path, description = "持仓 ticket")
    ),
    responses(
        (status = 200, description = "平仓信号已入队", body = ApiResponse<SignalResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户或持仓不存在", body = ApiErrorResponse)
    )
)]
pub async fn close_trade(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<ApiResponse<SignalResponse>>, ApiError> {
    let Path((account_number, ticket)) = path?;
    let signal = state
        .queue
        .enqueue(
            AccountNumber(account_number),
            SignalCommand::Close {
                ticket: Ticket(ticket),
                payload: ClosePayload::default(),
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(SignalResponse::try_from(signal)?)))
}
