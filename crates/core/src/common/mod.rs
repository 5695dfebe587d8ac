use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod time;

/// # Summary
/// 终端账户号，由交易终端 (券商) 分配。
///
/// # Invariants
/// - 在整个系统中全局唯一，合法值恒为正数。
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(pub i64);

/// # Summary
/// 终端分配的订单号 (ticket)。
///
/// # Invariants
/// - 仅在所属账户内唯一，跨账户可能重复，必须与 `AccountNumber` 组合使用。
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub i64);

/// # Summary
/// 信号在存储层分配的自增 ID，其大小顺序即为入队顺序。
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(pub i64);

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(AccountNumber)
            .map_err(|_| format!("Invalid account number: {}", s))
    }
}
