use crate::common::{AccountNumber, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 一次快照对账的结果统计。
///
/// # Invariants
/// - `closed == closed_tickets.len()`，`closed_tickets` 升序排列。
/// - `inserted + updated + unchanged` 等于快照上报的持仓单数量。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub account_number: AccountNumber,
    /// 本次快照是否首次创建了该账户
    pub created_account: bool,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub closed: usize,
    pub closed_tickets: Vec<Ticket>,
    /// 对账后账户的 `last_update`
    pub last_update: DateTime<Utc>,
}

impl ReconcileReport {
    /// 快照上报的持仓单总数
    pub fn reported(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}
