use crate::common::{AccountNumber, Ticket};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// # Summary
/// 终端上报的订单类型，沿用交易终端的数值编码。
///
/// # Invariants
/// - 只接受 0..=5 六种编码，其余编码在反序列化时即被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TradeType {
    /// 市价买入 (0)
    Buy,
    /// 市价卖出 (1)
    Sell,
    /// 限价买入挂单 (2)
    BuyLimit,
    /// 限价卖出挂单 (3)
    SellLimit,
    /// 突破买入挂单 (4)
    BuyStop,
    /// 突破卖出挂单 (5)
    SellStop,
}

impl TradeType {
    /// 终端使用的数值编码
    pub fn code(self) -> i64 {
        match self {
            TradeType::Buy => 0,
            TradeType::Sell => 1,
            TradeType::BuyLimit => 2,
            TradeType::SellLimit => 3,
            TradeType::BuyStop => 4,
            TradeType::SellStop => 5,
        }
    }
}

impl TryFrom<i64> for TradeType {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TradeType::Buy),
            1 => Ok(TradeType::Sell),
            2 => Ok(TradeType::BuyLimit),
            3 => Ok(TradeType::SellLimit),
            4 => Ok(TradeType::BuyStop),
            5 => Ok(TradeType::SellStop),
            other => Err(format!("Unknown trade type code: {}", other)),
        }
    }
}

impl From<TradeType> for i64 {
    fn from(t: TradeType) -> Self {
        t.code()
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
            TradeType::BuyLimit => "buy_limit",
            TradeType::SellLimit => "sell_limit",
            TradeType::BuyStop => "buy_stop",
            TradeType::SellStop => "sell_stop",
        };
        write!(f, "{}", name)
    }
}

/// # Summary
/// 终端账户的资金快照行。
///
/// # Invariants
/// - 每个 `account_number` 恰好一行。
/// - 资金字段始终反映最近一次成功对账的快照。
/// - `last_update` 单调不减；`created_at` 插入后不再改变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: AccountNumber,
    /// 终端 / 券商服务器标识
    pub server: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    /// 最近一次被接受的快照时间戳
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 账户列表查询结果：账户行 + 当前持仓单数量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: Account,
    pub trades_count: i64,
}

/// # Summary
/// 已持久化的持仓单。
///
/// # Invariants
/// - (`account_number`, `ticket`) 唯一。
/// - `symbol` / `trade_type` / `lots` / `open_price` / `open_time` 写入后不可变，
///   后续快照只会修改 `sl` / `tp` / `profit` / `comment`。
/// - `sl` / `tp` 为零表示未设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub account_number: AccountNumber,
    pub ticket: Ticket,
    pub symbol: String,
    pub trade_type: TradeType,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub sl: Decimal,
    pub tp: Decimal,
    pub profit: Decimal,
    pub comment: String,
    /// 最近一次写入该行的快照时间戳
    pub last_update: DateTime<Utc>,
}

impl Trade {
    /// 可变字段 (`sl` / `tp` / `profit` / `comment`) 是否与上报值一致
    pub fn mutable_fields_match(&self, reported: &ReportedTrade) -> bool {
        self.sl == reported.sl
            && self.tp == reported.tp
            && self.profit == reported.profit
            && self.comment == reported.comment
    }

    /// 不可变字段是否与上报值一致，不一致时仍以存储值为准
    pub fn immutable_fields_match(&self, reported: &ReportedTrade) -> bool {
        self.symbol == reported.symbol
            && self.trade_type == reported.trade_type
            && self.lots == reported.lots
            && self.open_price == reported.open_price
            && self.open_time == reported.open_time
    }

    /// 仅用上报值覆盖可变字段，其余字段保持不动
    pub fn with_mutable_fields(&self, reported: &ReportedTrade, at: DateTime<Utc>) -> Trade {
        Trade {
            sl: reported.sl,
            tp: reported.tp,
            profit: reported.profit,
            comment: reported.comment.clone(),
            last_update: at,
            ..self.clone()
        }
    }
}

/// # Summary
/// 快照中终端上报的一笔持仓单 (尚未绑定账户)。
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedTrade {
    pub ticket: Ticket,
    pub symbol: String,
    pub trade_type: TradeType,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub sl: Decimal,
    pub tp: Decimal,
    pub profit: Decimal,
    pub comment: String,
}

impl ReportedTrade {
    /// 绑定账户与快照时间，生成待插入的新持仓单
    pub fn into_trade(self, account_number: AccountNumber, at: DateTime<Utc>) -> Trade {
        Trade {
            account_number,
            ticket: self.ticket,
            symbol: self.symbol,
            trade_type: self.trade_type,
            lots: self.lots,
            open_price: self.open_price,
            open_time: self.open_time,
            sl: self.sl,
            tp: self.tp,
            profit: self.profit,
            comment: self.comment,
            last_update: at,
        }
    }
}

/// # Summary
/// 终端一次推送的完整账户快照：资金指标 + 当前全部持仓单。
///
/// # Invariants
/// - `trades` 是该时刻的全集，缺失的 ticket 视为已被终端平仓。
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub account_number: AccountNumber,
    pub server: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    /// 终端附带的快照时间，用于拒绝乱序到达的旧快照
    pub timestamp: DateTime<Utc>,
    pub trades: Vec<ReportedTrade>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn reported() -> ReportedTrade {
        ReportedTrade {
            ticket: Ticket(555),
            symbol: "EURUSD".into(),
            trade_type: TradeType::Buy,
            lots: dec!(1.0),
            open_price: dec!(1.0850),
            open_time: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            sl: dec!(0),
            tp: dec!(0),
            profit: dec!(12.5),
            comment: String::new(),
        }
    }

    #[test]
    fn test_trade_type_codes() {
        for code in 0..=5 {
            let t = TradeType::try_from(code).unwrap();
            assert_eq!(i64::from(t), code);
        }
        assert!(TradeType::try_from(6).is_err());
        assert!(TradeType::try_from(-1).is_err());
    }

    #[test]
    fn test_trade_type_serde_uses_numeric_code() {
        let t: TradeType = serde_json::from_str("1").unwrap();
        assert_eq!(t, TradeType::Sell);
        assert_eq!(serde_json::to_string(&TradeType::BuyLimit).unwrap(), "2");
        assert!(serde_json::from_str::<TradeType>("9").is_err());
    }

    #[test]
    fn test_with_mutable_fields_keeps_immutable_fields() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let stored = reported().into_trade(AccountNumber(1001), at);

        let mut incoming = reported();
        incoming.sl = dec!(1.0800);
        incoming.profit = dec!(-3);
        incoming.open_price = dec!(9.9999);
        incoming.symbol = "GBPUSD".into();

        assert!(!stored.mutable_fields_match(&incoming));
        assert!(!stored.immutable_fields_match(&incoming));

        let later = at + chrono::Duration::seconds(5);
        let updated = stored.with_mutable_fields(&incoming, later);
        assert_eq!(updated.sl, dec!(1.0800));
        assert_eq!(updated.profit, dec!(-3));
        assert_eq!(updated.open_price, dec!(1.0850));
        assert_eq!(updated.symbol, "EURUSD");
        assert_eq!(updated.open_time, stored.open_time);
        assert_eq!(updated.last_update, later);
    }
}
