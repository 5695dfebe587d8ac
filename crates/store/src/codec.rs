//! 数据库行与领域实体之间的转换。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tradepub_core::account::entity::{Account, Trade, TradeType};
use tradepub_core::common::{AccountNumber, SignalId, Ticket};
use tradepub_core::signal::entity::{Signal, SignalCommand, SignalType};
use tradepub_core::store::error::StoreError;

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("column {} holds '{}': {}", column, raw, e)))
}

#[derive(sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub account_number: i64,
    pub server: String,
    pub balance: String,
    pub equity: String,
    pub margin: String,
    pub free_margin: String,
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            account_number: AccountNumber(r.account_number),
            server: r.server,
            balance: parse_decimal("balance", &r.balance)?,
            equity: parse_decimal("equity", &r.equity)?,
            margin: parse_decimal("margin", &r.margin)?,
            free_margin: parse_decimal("free_margin", &r.free_margin)?,
            last_update: r.last_update,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TradeRow {
    pub account_number: i64,
    pub ticket: i64,
    pub symbol: String,
    #[sqlx(rename = "type")]
    pub trade_type: i64,
    pub lots: String,
    pub open_price: String,
    pub open_time: DateTime<Utc>,
    pub sl: String,
    pub tp: String,
    pub profit: String,
    pub comment: String,
    pub last_update: DateTime<Utc>,
}

pub(crate) const TRADE_COLUMNS: &str = "account_number, ticket, symbol, type, lots, open_price, \
     open_time, sl, tp, profit, comment, last_update";

impl TryFrom<TradeRow> for Trade {
    type Error = StoreError;

    fn try_from(r: TradeRow) -> Result<Self, Self::Error> {
        Ok(Trade {
            account_number: AccountNumber(r.account_number),
            ticket: Ticket(r.ticket),
            symbol: r.symbol,
            trade_type: TradeType::try_from(r.trade_type).map_err(StoreError::Corrupt)?,
            lots: parse_decimal("lots", &r.lots)?,
            open_price: parse_decimal("open_price", &r.open_price)?,
            open_time: r.open_time,
            sl: parse_decimal("sl", &r.sl)?,
            tp: parse_decimal("tp", &r.tp)?,
            profit: parse_decimal("profit", &r.profit)?,
            comment: r.comment,
            last_update: r.last_update,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SignalRow {
    pub id: i64,
    pub account_number: i64,
    pub ticket: Option<i64>,
    pub signal_type: String,
    pub signal_data: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

pub(crate) const SIGNAL_COLUMNS: &str =
    "id, account_number, ticket, signal_type, signal_data, processed, created_at, processed_at";

impl TryFrom<SignalRow> for Signal {
    type Error = StoreError;

    fn try_from(r: SignalRow) -> Result<Self, Self::Error> {
        let signal_type = SignalType::from_str(&r.signal_type).map_err(StoreError::Corrupt)?;
        let data: serde_json::Value = serde_json::from_str(&r.signal_data)
            .map_err(|e| StoreError::Corrupt(format!("signal {} data: {}", r.id, e)))?;
        let command = SignalCommand::from_parts(signal_type, r.ticket.map(Ticket), data)
            .map_err(|e| StoreError::Corrupt(format!("signal {}: {}", r.id, e)))?;

        Ok(Signal {
            id: SignalId(r.id),
            account_number: AccountNumber(r.account_number),
            command,
            processed: r.processed,
            created_at: r.created_at,
            processed_at: r.processed_at,
        })
    }
}
