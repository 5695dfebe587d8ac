use crate::account::entity::TradeType;
use crate::common::{AccountNumber, SignalId, Ticket};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// # Summary
/// 信号类型，与存储层 `signal_type` 列的取值一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Close,
    Modify,
    Open,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Close => "CLOSE",
            SignalType::Modify => "MODIFY",
            SignalType::Open => "OPEN",
        }
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CLOSE" => Ok(SignalType::Close),
            "MODIFY" => Ok(SignalType::Modify),
            "OPEN" => Ok(SignalType::Open),
            _ => Err(format!("Unknown signal type: {}", s)),
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CLOSE 指令载荷。`lots` 为空表示全部平仓。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lots: Option<Decimal>,
}

/// MODIFY 指令载荷：新的止损 / 止盈，至少给出其一。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp: Option<Decimal>,
}

/// OPEN 指令载荷：开新仓所需的全部参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenPayload {
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub lots: Decimal,
    /// 挂单价格，市价单可为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// # Summary
/// 按信号类型区分的强类型指令。
///
/// # Invariants
/// - CLOSE / MODIFY 必然携带 ticket，OPEN 必然不携带 (新仓尚无 ticket)。
#[derive(Debug, Clone, PartialEq)]
pub enum SignalCommand {
    Close { ticket: Ticket, payload: ClosePayload },
    Modify { ticket: Ticket, payload: ModifyPayload },
    Open(OpenPayload),
}

impl SignalCommand {
    pub fn signal_type(&self) -> SignalType {
        match self {
            SignalCommand::Close { .. } => SignalType::Close,
            SignalCommand::Modify { .. } => SignalType::Modify,
            SignalCommand::Open(_) => SignalType::Open,
        }
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            SignalCommand::Close { ticket, .. } | SignalCommand::Modify { ticket, .. } => {
                Some(*ticket)
            }
            SignalCommand::Open(_) => None,
        }
    }

    /// 序列化为 `signal_data` 列及对外接口使用的 JSON 载荷
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            SignalCommand::Close { payload, .. } => serde_json::to_value(payload),
            SignalCommand::Modify { payload, .. } => serde_json::to_value(payload),
            SignalCommand::Open(payload) => serde_json::to_value(payload),
        }
    }

    /// # Summary
    /// 由扁平的 (类型, ticket, 载荷) 三元组还原强类型指令。
    ///
    /// # Logic
    /// 1. CLOSE / MODIFY 缺失 ticket 或 OPEN 携带 ticket 均视为非法。
    /// 2. 载荷为 `null` 时按空对象处理 (CLOSE 允许空载荷)。
    /// 3. 载荷字段按各类型的结构体严格反序列化，未知字段拒绝。
    ///
    /// # Returns
    /// 成功返回指令，失败返回可读的错误描述。
    pub fn from_parts(
        signal_type: SignalType,
        ticket: Option<Ticket>,
        data: serde_json::Value,
    ) -> Result<Self, String> {
        let data = if data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            data
        };

        match (signal_type, ticket) {
            (SignalType::Close, Some(ticket)) => {
                let payload: ClosePayload = serde_json::from_value(data)
                    .map_err(|e| format!("Invalid CLOSE signal_data: {}", e))?;
                Ok(SignalCommand::Close { ticket, payload })
            }
            (SignalType::Modify, Some(ticket)) => {
                let payload: ModifyPayload = serde_json::from_value(data)
                    .map_err(|e| format!("Invalid MODIFY signal_data: {}", e))?;
                Ok(SignalCommand::Modify { ticket, payload })
            }
            (SignalType::Open, None) => {
                let payload: OpenPayload = serde_json::from_value(data)
                    .map_err(|e| format!("Invalid OPEN signal_data: {}", e))?;
                Ok(SignalCommand::Open(payload))
            }
            (SignalType::Open, Some(_)) => Err("OPEN signal must not reference a ticket".into()),
            (other, None) => Err(format!("{} signal requires a ticket", other)),
        }
    }
}

/// # Summary
/// 入队请求。
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub account_number: AccountNumber,
    pub command: SignalCommand,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 已持久化的信号。
///
/// # Invariants
/// - `processed` 一旦为 true 永不回退，`processed_at` 同时被写入且以后不再改变。
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: SignalId,
    pub account_number: AccountNumber,
    pub command: SignalCommand,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// # Summary
/// 确认 (acknowledge) 操作的结果。三种结果对调用方都不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    /// 本次调用将信号标记为已处理
    Acknowledged,
    /// 信号此前已被确认，本次为空操作
    AlreadyProcessed,
    /// 信号不存在 (可能已被清理或随账户删除)
    Unknown,
}
