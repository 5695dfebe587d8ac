//! # 账户路由控制器

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

use tradepub_core::common::AccountNumber;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    AccountListResponse, AccountSummaryResponse, ApiErrorResponse, ApiResponse,
    DeleteAccountResponse,
};

/// 列出全部已知账户
///
/// 按 `last_update` 倒序，每项附带当前持仓单数量。
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "账户 (Accounts)",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "账户列表", body = ApiResponse<AccountListResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccountListResponse>>, ApiError> {
    let accounts: Vec<AccountSummaryResponse> = state
        .accounts
        .list_accounts()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(ApiResponse::ok(AccountListResponse {
        count: accounts.len(),
        accounts,
    })))
}

/// 删除账户
///
/// 同时删除该账户的全部持仓单与信号。与该账户的快照对账互斥执行。
#[utoipa::path(
    delete,
    path = "/api/accounts/{account_number}",
    tag = "账户 (Accounts)",
    security(("bearer" = [])),
    params(
        ("account_number" = i64, Path, description = "终端账户号")
    ),
    responses(
        (status = 200, description = "已删除", body = ApiResponse<DeleteAccountResponse>),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户不存在", body = ApiErrorResponse)
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiResponse<DeleteAccountResponse>>, ApiError> {
    let Path(account_number) = path?;
    let account = AccountNumber(account_number);

    if !state.reconciler.remove_account(account).await? {
        return Err(ApiError::NotFound(format!("Account {} not found", account)));
    }
    tracing::info!("Account {} removed via API", account);

    Ok(Json(ApiResponse::ok(DeleteAccountResponse {
        account_number,
        deleted: true,
    })))
}
