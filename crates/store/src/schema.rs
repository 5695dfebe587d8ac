//! 数据库表结构。
//!
//! 金额类字段以十进制字符串存储，避免浮点误差；
//! 时间字段由 sqlx 以 RFC 3339 文本写入。

use sqlx::SqlitePool;
use tradepub_core::store::error::StoreError;

/// 建表与索引 DDL，可重复执行
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_number INTEGER PRIMARY KEY,
    server TEXT NOT NULL,
    balance TEXT NOT NULL DEFAULT '0',
    equity TEXT NOT NULL DEFAULT '0',
    margin TEXT NOT NULL DEFAULT '0',
    free_margin TEXT NOT NULL DEFAULT '0',
    last_update DATETIME NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_last_update ON accounts (last_update DESC);

CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_number INTEGER NOT NULL
        REFERENCES accounts (account_number) ON DELETE CASCADE,
    ticket INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    type INTEGER NOT NULL,
    lots TEXT NOT NULL,
    open_price TEXT NOT NULL,
    open_time DATETIME NOT NULL,
    sl TEXT NOT NULL DEFAULT '0',
    tp TEXT NOT NULL DEFAULT '0',
    profit TEXT NOT NULL DEFAULT '0',
    comment TEXT NOT NULL DEFAULT '',
    last_update DATETIME NOT NULL,
    UNIQUE (account_number, ticket)
);

CREATE INDEX IF NOT EXISTS idx_trades_account_open_time ON trades (account_number, open_time DESC);

CREATE TABLE IF NOT EXISTS trade_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_number INTEGER NOT NULL
        REFERENCES accounts (account_number) ON DELETE CASCADE,
    ticket INTEGER NULL,
    signal_type TEXT NOT NULL CHECK (signal_type IN ('CLOSE', 'MODIFY', 'OPEN')),
    signal_data TEXT NOT NULL DEFAULT '{}',
    processed INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL,
    processed_at DATETIME NULL
);

CREATE INDEX IF NOT EXISTS idx_signals_pending ON trade_signals (account_number, processed, id);
"#;

/// 在写连接上执行 DDL
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;
    Ok(())
}
