//! 快照与信号指令的业务校验。
//!
//! 字段缺失 / 类型错误在 API 层反序列化时已被拒绝，这里只检查取值约束。

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tradepub_core::account::entity::Snapshot;
use tradepub_core::common::time::is_storable;
use tradepub_core::signal::entity::SignalCommand;
use tradepub_core::sync::error::SyncError;

/// `server` 标识的最大字符数
pub const MAX_SERVER_LEN: usize = 128;

/// # Summary
/// 校验一份快照，任何一项不满足即整体拒绝。
///
/// # Logic
/// 1. 账户号为正数，`server` 去除空白后非空且不超过 `MAX_SERVER_LEN`。
/// 2. 快照时间与每笔 `open_time` 落在可持久化区间内。
/// 3. 每笔持仓单 ticket 为正数、`symbol` 非空、`lots` 与 `open_price` 非负。
/// 4. 同一快照内 ticket 不得重复。
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), SyncError> {
    if snapshot.account_number.0 <= 0 {
        return Err(SyncError::Validation(format!(
            "account_number must be positive, got {}",
            snapshot.account_number
        )));
    }

    let server = snapshot.server.trim();
    if server.is_empty() {
        return Err(SyncError::Validation("server must not be empty".into()));
    }
    if server.chars().count() > MAX_SERVER_LEN {
        return Err(SyncError::Validation(format!(
            "server must be at most {} characters",
            MAX_SERVER_LEN
        )));
    }

    if !is_storable(&snapshot.timestamp) {
        return Err(SyncError::Validation(format!(
            "timestamp out of range: {}",
            snapshot.timestamp
        )));
    }

    let mut seen = HashSet::with_capacity(snapshot.trades.len());
    for trade in &snapshot.trades {
        if !is_storable(&trade.open_time) {
            return Err(SyncError::Validation(format!(
                "trade {}: open_time out of range: {}",
                trade.ticket, trade.open_time
            )));
        }
        if trade.ticket.0 <= 0 {
            return Err(SyncError::Validation(format!(
                "ticket must be positive, got {}",
                trade.ticket
            )));
        }
        if trade.symbol.trim().is_empty() {
            return Err(SyncError::Validation(format!(
                "trade {}: symbol must not be empty",
                trade.ticket
            )));
        }
        if trade.lots < Decimal::ZERO {
            return Err(SyncError::Validation(format!(
                "trade {}: lots must not be negative",
                trade.ticket
            )));
        }
        if trade.open_price < Decimal::ZERO {
            return Err(SyncError::Validation(format!(
                "trade {}: open_price must not be negative",
                trade.ticket
            )));
        }
        if !seen.insert(trade.ticket) {
            return Err(SyncError::Validation(format!(
                "duplicate ticket {} in snapshot",
                trade.ticket
            )));
        }
    }
    Ok(())
}

/// # Summary
/// 拒绝明显超前于服务端时钟的快照。
///
/// # Logic
/// 快照时间一旦被接受就成为该账户的 `last_update`，之后更早的快照都会被判为过期。
/// 误传毫秒等远未来时间会让账户永久无法更新，因此超过 `max_skew` 即拒绝。
pub fn validate_clock_skew(
    snapshot: &Snapshot,
    now: DateTime<Utc>,
    max_skew: TimeDelta,
) -> Result<(), SyncError> {
    let Some(limit) = now.checked_add_signed(max_skew) else {
        return Ok(());
    };
    if snapshot.timestamp > limit {
        return Err(SyncError::Validation(format!(
            "timestamp {} is more than {}s ahead of server time {}",
            snapshot.timestamp,
            max_skew.num_seconds(),
            now
        )));
    }
    Ok(())
}

fn non_negative(field: &str, value: Option<Decimal>) -> Result<(), SyncError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(SyncError::Validation(format!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

/// # Summary
/// 校验信号指令载荷，不涉及账户 / ticket 是否存在。
///
/// # Logic
/// * CLOSE: ticket 为正数，部分平仓的 `lots` 给出时必须大于 0。
/// * MODIFY: ticket 为正数，`sl` / `tp` 至少给出一个且非负。
/// * OPEN: `symbol` 非空，`lots` 大于 0，价格类字段非负。
pub fn validate_command(command: &SignalCommand) -> Result<(), SyncError> {
    if let Some(ticket) = command.ticket()
        && ticket.0 <= 0
    {
        return Err(SyncError::Validation(format!(
            "ticket must be positive, got {}",
            ticket
        )));
    }

    match command {
        SignalCommand::Close { payload, .. } => {
            if let Some(lots) = payload.lots
                && lots <= Decimal::ZERO
            {
                return Err(SyncError::Validation(
                    "CLOSE lots must be greater than 0".into(),
                ));
            }
        }
        SignalCommand::Modify { payload, .. } => {
            if payload.sl.is_none() && payload.tp.is_none() {
                return Err(SyncError::Validation(
                    "MODIFY requires at least one of sl / tp".into(),
                ));
            }
            non_negative("sl", payload.sl)?;
            non_negative("tp", payload.tp)?;
        }
        SignalCommand::Open(payload) => {
            if payload.symbol.trim().is_empty() {
                return Err(SyncError::Validation("OPEN symbol must not be empty".into()));
            }
            if payload.lots <= Decimal::ZERO {
                return Err(SyncError::Validation(
                    "OPEN lots must be greater than 0".into(),
                ));
            }
            non_negative("price", payload.price)?;
            non_negative("sl", payload.sl)?;
            non_negative("tp", payload.tp)?;
        }
    }
    Ok(())
}
