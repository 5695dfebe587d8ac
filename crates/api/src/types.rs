//! # DTO (Data Transfer Object) 层
//!
//! 终端与运维调用方看到的 JSON 结构。时间统一为 Unix 秒，金额为 JSON 数字。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use tradepub_core::account::entity::{
    Account, AccountSummary, ReportedTrade, Snapshot, Trade, TradeType,
};
use tradepub_core::common::time::is_storable;
use tradepub_core::common::{AccountNumber, Ticket};
use tradepub_core::signal::entity::{AckOutcome, Signal};
use tradepub_core::sync::entity::ReconcileReport;

use crate::error::ApiError;

/// Unix 秒转时间，只接受可持久化区间 (1970 至 9999 年)
fn to_datetime(field: &str, secs: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp(secs, 0)
        .filter(is_storable)
        .ok_or_else(|| ApiError::Validation(format!("{} out of range: {}", field, secs)))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("Missing required field: {}", field)))
}

// ============================================================
//  通用响应包装
// ============================================================

/// 成功响应包装
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷
    pub data: T,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// 失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误类别: validation / auth / not_found / conflict / store / internal
    #[schema(example = "validation")]
    pub kind: String,
    /// 错误描述信息
    #[schema(example = "Missing required field: server")]
    pub error: String,
}

impl ApiErrorResponse {
    pub fn new(kind: &str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.to_string(),
            error: msg.into(),
        }
    }
}

// ============================================================
//  快照上报 DTO
// ============================================================

/// 快照中的一笔持仓单。除 `ticket` / `symbol` 外均可省略，`type` 缺省为 0 (buy)。
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TradeInput {
    #[schema(example = 555)]
    pub ticket: Option<i64>,
    #[schema(example = "EURUSD")]
    pub symbol: Option<String>,
    /// 订单类型编码: 0 buy, 1 sell, 2 buy_limit, 3 sell_limit, 4 buy_stop, 5 sell_stop
    #[serde(rename = "type")]
    #[schema(example = 0)]
    pub trade_type: Option<i64>,
    #[schema(example = 1.0)]
    pub lots: Option<Decimal>,
    #[schema(example = 1.0850)]
    pub open_price: Option<Decimal>,
    /// 开仓时间 (Unix 秒)，缺省取快照时间
    #[schema(example = 1772000000_i64)]
    pub open_time: Option<i64>,
    pub sl: Option<Decimal>,
    pub tp: Option<Decimal>,
    #[schema(example = 12.5)]
    pub profit: Option<Decimal>,
    pub comment: Option<String>,
}

impl TradeInput {
    fn into_reported(self, index: usize, snapshot_time: DateTime<Utc>) -> Result<ReportedTrade, ApiError> {
        let field = |name: &str| format!("trades[{}].{}", index, name);

        let code = self.trade_type.unwrap_or(0);
        let trade_type = TradeType::try_from(code)
            .map_err(|e| ApiError::Validation(format!("{}: {}", field("type"), e)))?;
        let open_time = match self.open_time {
            Some(secs) => to_datetime(&field("open_time"), secs)?,
            None => snapshot_time,
        };

        Ok(ReportedTrade {
            ticket: Ticket(required(self.ticket, &field("ticket"))?),
            symbol: required(self.symbol, &field("symbol"))?.trim().to_string(),
            trade_type,
            lots: self.lots.unwrap_or_default(),
            open_price: self.open_price.unwrap_or_default(),
            open_time,
            sl: self.sl.unwrap_or_default(),
            tp: self.tp.unwrap_or_default(),
            profit: self.profit.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
        })
    }
}

/// 终端推送的账户快照
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SnapshotRequest {
    /// 账户号，兼容旧字段名 `account`
    #[serde(alias = "account")]
    #[schema(example = 1001)]
    pub account_number: Option<i64>,
    #[schema(example = "Broker-Live01")]
    pub server: Option<String>,
    #[schema(example = 10000.0)]
    pub balance: Option<Decimal>,
    #[schema(example = 10012.5)]
    pub equity: Option<Decimal>,
    #[schema(example = 100.0)]
    pub margin: Option<Decimal>,
    #[schema(example = 9912.5)]
    pub free_margin: Option<Decimal>,
    /// 快照时间 (Unix 秒)
    #[schema(example = 1772000000_i64)]
    pub timestamp: Option<i64>,
    /// 当前全部持仓单，缺失的 ticket 视为已平仓。必填，空数组表示全部已平仓
    pub trades: Option<Vec<TradeInput>>,
}

impl SnapshotRequest {
    /// # Summary
    /// 转换为领域快照，补齐缺省值。
    ///
    /// # Logic
    /// `account_number` / `server` / `timestamp` / `trades` 必填；资金字段缺省为 0；
    /// 持仓单的取值约束留给对账引擎校验。
    /// 缺少 `trades` 与空持仓不同，前者拒绝，否则会把全部持仓误判为已平仓。
    pub fn into_snapshot(self) -> Result<Snapshot, ApiError> {
        let account_number = AccountNumber(required(self.account_number, "account_number")?);
        let server = required(self.server, "server")?;
        let timestamp = to_datetime("timestamp", required(self.timestamp, "timestamp")?)?;

        let trades = required(self.trades, "trades")?
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_reported(i, timestamp))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            account_number,
            server,
            balance: self.balance.unwrap_or_default(),
            equity: self.equity.unwrap_or_default(),
            margin: self.margin.unwrap_or_default(),
            free_margin: self.free_margin.unwrap_or_default(),
            timestamp,
            trades,
        })
    }
}

/// 快照对账结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResponse {
    #[schema(example = 1001)]
    pub account_number: i64,
    /// 是否首次创建该账户
    pub created_account: bool,
    #[schema(example = 1)]
    pub inserted: usize,
    #[schema(example = 0)]
    pub updated: usize,
    #[schema(example = 0)]
    pub unchanged: usize,
    #[schema(example = 1)]
    pub closed: usize,
    /// 推断为已平仓并被删除的 ticket (升序)
    pub closed_tickets: Vec<i64>,
    /// 对账后的 `last_update` (Unix 秒)
    pub last_update: i64,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(r: ReconcileReport) -> Self {
        Self {
            account_number: r.account_number.0,
            created_account: r.created_account,
            inserted: r.inserted,
            updated: r.updated,
            unchanged: r.unchanged,
            closed: r.closed,
            closed_tickets: r.closed_tickets.into_iter().map(|t| t.0).collect(),
            last_update: r.last_update.timestamp(),
        }
    }
}

// ============================================================
//  账户 / 持仓查询 DTO
// ============================================================

/// 账户资金快照
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(example = 1001)]
    pub account_number: i64,
    #[schema(example = "Broker-Live01")]
    pub server: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    /// 最近一次被接受的快照时间 (Unix 秒)
    pub last_update: i64,
    /// 首次上报时间 (Unix 秒)
    pub created_at: i64,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            account_number: a.account_number.0,
            server: a.server,
            balance: a.balance,
            equity: a.equity,
            margin: a.margin,
            free_margin: a.free_margin,
            last_update: a.last_update.timestamp(),
            created_at: a.created_at.timestamp(),
        }
    }
}

/// 账户列表中的一项
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountSummaryResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    /// 当前持仓单数量
    pub trades_count: i64,
}

impl From<AccountSummary> for AccountSummaryResponse {
    fn from(s: AccountSummary) -> Self {
        Self {
            account: s.account.into(),
            trades_count: s.trades_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountSummaryResponse>,
    pub count: usize,
}

/// 删除账户结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteAccountResponse {
    pub account_number: i64,
    pub deleted: bool,
}

/// 持仓单
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradeResponse {
    #[schema(example = 555)]
    pub ticket: i64,
    #[schema(example = "EURUSD")]
    pub symbol: String,
    /// 订单类型编码
    #[serde(rename = "type")]
    #[schema(example = 0)]
    pub trade_type: i64,
    /// 订单类型名称
    #[schema(example = "buy")]
    pub type_name: String,
    pub lots: Decimal,
    pub open_price: Decimal,
    /// 开仓时间 (Unix 秒)
    pub open_time: i64,
    pub sl: Decimal,
    pub tp: Decimal,
    pub profit: Decimal,
    pub comment: String,
    /// 最近一次写入该行的快照时间 (Unix 秒)
    pub last_update: i64,
}

impl From<Trade> for TradeResponse {
    fn from(t: Trade) -> Self {
        Self {
            ticket: t.ticket.0,
            symbol: t.symbol,
            trade_type: t.trade_type.code(),
            type_name: t.trade_type.to_string(),
            lots: t.lots,
            open_price: t.open_price,
            open_time: t.open_time.timestamp(),
            sl: t.sl,
            tp: t.tp,
            profit: t.profit,
            comment: t.comment,
            last_update: t.last_update.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

/// 账户持仓查询结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradeListResponse {
    pub account: AccountResponse,
    pub trades: Vec<TradeResponse>,
    /// 本页条数
    pub trades_count: usize,
    pub pagination: Pagination,
}

/// 持仓分页参数
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TradesQuery {
    /// 每页条数，默认 100，最大 1000
    pub limit: Option<u32>,
    /// 跳过条数，默认 0
    pub offset: Option<u32>,
}

// ============================================================
//  信号 DTO
// ============================================================

/// 队列中的一条信号
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignalResponse {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 1001)]
    pub account_number: i64,
    /// CLOSE / MODIFY 针对的 ticket，OPEN 为 null
    #[schema(example = 555)]
    pub ticket: Option<i64>,
    #[schema(example = "CLOSE")]
    pub signal_type: String,
    /// 指令载荷
    #[schema(value_type = Object)]
    pub signal_data: serde_json::Value,
    pub processed: bool,
    /// 入队时间 (Unix 秒)
    pub created_at: i64,
    /// 确认时间 (Unix 秒)
    pub processed_at: Option<i64>,
}

impl TryFrom<Signal> for SignalResponse {
    type Error = ApiError;

    fn try_from(s: Signal) -> Result<Self, Self::Error> {
        let signal_data = s
            .command
            .payload_json()
            .map_err(|e| ApiError::Internal(format!("Failed to encode signal {}: {}", s.id, e)))?;
        Ok(Self {
            id: s.id.0,
            account_number: s.account_number.0,
            ticket: s.command.ticket().map(|t| t.0),
            signal_type: s.command.signal_type().to_string(),
            signal_data,
            processed: s.processed,
            created_at: s.created_at.timestamp(),
            processed_at: s.processed_at.map(|t| t.timestamp()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignalListResponse {
    pub signals: Vec<SignalResponse>,
    pub count: usize,
}

/// 通用入队请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EnqueueSignalRequest {
    /// 目标账户号，兼容旧字段名 `account`
    #[serde(alias = "account")]
    #[schema(example = 1001)]
    pub account_number: Option<i64>,
    /// CLOSE / MODIFY / OPEN
    #[schema(example = "MODIFY")]
    pub signal_type: Option<String>,
    /// CLOSE / MODIFY 必填，OPEN 不可填
    #[schema(example = 555)]
    pub ticket: Option<i64>,
    /// 指令载荷: CLOSE `{lots?}`，MODIFY `{sl?, tp?}`，OPEN `{symbol, type, lots, price?, sl?, tp?, comment?}`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub signal_data: serde_json::Value,
}

/// 确认结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub signal_id: i64,
    /// acknowledged / already_processed / unknown
    #[schema(value_type = String, example = "acknowledged")]
    pub outcome: AckOutcome,
}

/// 清理参数
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurgeQuery {
    /// 删除 `processed_at` 早于该时间 (Unix 秒) 的已处理信号
    pub processed_before: Option<i64>,
}

impl PurgeQuery {
    pub fn cutoff(&self) -> Result<DateTime<Utc>, ApiError> {
        to_datetime(
            "processed_before",
            required(self.processed_before, "processed_before")?,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    pub purged: u64,
}

// ============================================================
//  运维 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "connected")]
    pub database: String,
    /// 服务端当前时间 (Unix 秒)
    pub timestamp: i64,
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// 根路径返回的服务描述
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceDescriptor {
    #[schema(example = "Trade Publisher API")]
    pub service: String,
    pub version: String,
    #[schema(example = "running")]
    pub status: String,
    pub endpoints: BTreeMap<String, String>,
}
