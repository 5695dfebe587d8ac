use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};
use tradepub_core::account::entity::{Account, AccountSummary, Trade};
use tradepub_core::common::{AccountNumber, Ticket};
use tradepub_core::store::error::StoreError;
use tradepub_core::store::port::{AccountStore, SyncTransaction};

use crate::codec::{AccountRow, TRADE_COLUMNS, TradeRow};
use crate::sqlite::{SqliteStore, db_err};

#[derive(sqlx::FromRow)]
struct AccountSummaryRow {
    #[sqlx(flatten)]
    account: AccountRow,
    trades_count: i64,
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn begin_sync(&self) -> Result<Box<dyn SyncTransaction>, StoreError> {
        let tx = self.writer.begin().await.map_err(db_err)?;
        Ok(Box::new(SqliteSyncTransaction { tx }))
    }

    async fn get_account(&self, account: AccountNumber) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT account_number, server, balance, equity, margin, free_margin, last_update, created_at \
             FROM accounts WHERE account_number = ?",
        )
        .bind(account.0)
        .fetch_optional(&self.reader)
        .await
        .map_err(db_err)?
        .map(Account::try_from)
        .transpose()
    }

    /// # Summary
    /// 列出全部账户及持仓单数量。
    ///
    /// # Logic
    /// `accounts LEFT JOIN trades` 后按账户分组计数，按 `last_update` 倒序。
    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        let rows = sqlx::query_as::<_, AccountSummaryRow>(
            r#"
            SELECT a.account_number, a.server, a.balance, a.equity, a.margin, a.free_margin,
                   a.last_update, a.created_at, COUNT(t.id) AS trades_count
            FROM accounts a
            LEFT JOIN trades t ON a.account_number = t.account_number
            GROUP BY a.account_number
            ORDER BY a.last_update DESC, a.account_number ASC
            "#,
        )
        .fetch_all(&self.reader)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|r| {
                Ok(AccountSummary {
                    account: Account::try_from(r.account)?,
                    trades_count: r.trades_count,
                })
            })
            .collect()
    }

    async fn list_trades(
        &self,
        account: AccountNumber,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, StoreError> {
        let sql = format!(
            "SELECT {} FROM trades WHERE account_number = ? \
             ORDER BY open_time DESC, ticket DESC LIMIT ? OFFSET ?",
            TRADE_COLUMNS
        );
        sqlx::query_as::<_, TradeRow>(&sql)
            .bind(account.0)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.reader)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Trade::try_from)
            .collect()
    }

    async fn get_trade(
        &self,
        account: AccountNumber,
        ticket: Ticket,
    ) -> Result<Option<Trade>, StoreError> {
        let sql = format!(
            "SELECT {} FROM trades WHERE account_number = ? AND ticket = ?",
            TRADE_COLUMNS
        );
        sqlx::query_as::<_, TradeRow>(&sql)
            .bind(account.0)
            .bind(ticket.0)
            .fetch_optional(&self.reader)
            .await
            .map_err(db_err)?
            .map(Trade::try_from)
            .transpose()
    }

    /// # Summary
    /// 删除账户及其全部子记录。
    ///
    /// # Logic
    /// 1. 在写事务中显式删除 `trade_signals` 与 `trades` 中该账户的记录。
    /// 2. 删除账户行，外键级联兜底。
    /// 3. 账户行不存在时回滚并返回 `false`。
    async fn delete_account(&self, account: AccountNumber) -> Result<bool, StoreError> {
        let mut tx = self.writer.begin().await.map_err(db_err)?;

        let signals = sqlx::query("DELETE FROM trade_signals WHERE account_number = ?")
            .bind(account.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let trades = sqlx::query("DELETE FROM trades WHERE account_number = ?")
            .bind(account.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let accounts = sqlx::query("DELETE FROM accounts WHERE account_number = ?")
            .bind(account.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        if accounts == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        tx.commit().await.map_err(db_err)?;
        info!(
            "Deleted account {} with {} trades and {} signals",
            account, trades, signals
        );
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.reader)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

/// # Summary
/// 基于写连接事务的 `SyncTransaction` 实现。
///
/// # Invariants
/// * 持有写连接直到提交或丢弃；丢弃时 sqlx 自动回滚。
pub struct SqliteSyncTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl SyncTransaction for SqliteSyncTransaction {
    async fn load_account(&mut self, account: AccountNumber) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT account_number, server, balance, equity, margin, free_margin, last_update, created_at \
             FROM accounts WHERE account_number = ?",
        )
        .bind(account.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?
        .map(Account::try_from)
        .transpose()
    }

    async fn upsert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_number, server, balance, equity, margin, free_margin, last_update, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (account_number) DO UPDATE SET
                balance = excluded.balance,
                equity = excluded.equity,
                margin = excluded.margin,
                free_margin = excluded.free_margin,
                last_update = excluded.last_update
            "#,
        )
        .bind(account.account_number.0)
        .bind(&account.server)
        .bind(account.balance.to_string())
        .bind(account.equity.to_string())
        .bind(account.margin.to_string())
        .bind(account.free_margin.to_string())
        .bind(account.last_update)
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_trades(&mut self, account: AccountNumber) -> Result<Vec<Trade>, StoreError> {
        let sql = format!(
            "SELECT {} FROM trades WHERE account_number = ? ORDER BY ticket ASC",
            TRADE_COLUMNS
        );
        sqlx::query_as::<_, TradeRow>(&sql)
            .bind(account.0)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Trade::try_from)
            .collect()
    }

    async fn insert_trade(&mut self, trade: &Trade) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO trades ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TRADE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(trade.account_number.0)
            .bind(trade.ticket.0)
            .bind(&trade.symbol)
            .bind(trade.trade_type.code())
            .bind(trade.lots.to_string())
            .bind(trade.open_price.to_string())
            .bind(trade.open_time)
            .bind(trade.sl.to_string())
            .bind(trade.tp.to_string())
            .bind(trade.profit.to_string())
            .bind(&trade.comment)
            .bind(trade.last_update)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_trade(&mut self, trade: &Trade) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE trades
            SET sl = ?, tp = ?, profit = ?, comment = ?, last_update = ?
            WHERE account_number = ? AND ticket = ?
            "#,
        )
        .bind(trade.sl.to_string())
        .bind(trade.tp.to_string())
        .bind(trade.profit.to_string())
        .bind(&trade.comment)
        .bind(trade.last_update)
        .bind(trade.account_number.0)
        .bind(trade.ticket.0)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_trades(
        &mut self,
        account: AccountNumber,
        tickets: &[Ticket],
    ) -> Result<u64, StoreError> {
        let mut deleted = 0;
        for ticket in tickets {
            deleted += sqlx::query("DELETE FROM trades WHERE account_number = ? AND ticket = ?")
                .bind(account.0)
                .bind(ticket.0)
                .execute(&mut *self.tx)
                .await
                .map_err(db_err)?
                .rows_affected();
        }
        debug!("Deleted {} closed trades for account {}", deleted, account);
        Ok(deleted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }
}
