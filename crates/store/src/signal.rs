use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use tradepub_core::common::{AccountNumber, SignalId};
use tradepub_core::signal::entity::{AckOutcome, NewSignal, Signal};
use tradepub_core::store::error::StoreError;
use tradepub_core::store::port::SignalStore;

use crate::codec::{SIGNAL_COLUMNS, SignalRow};
use crate::sqlite::{SqliteStore, db_err};

#[async_trait]
impl SignalStore for SqliteStore {
    /// # Summary
    /// 写入新信号。
    ///
    /// # Logic
    /// 1. 将指令拆分为 `signal_type` / `ticket` / `signal_data` 三列。
    /// 2. 以 `processed = 0` 插入，`id` 由 AUTOINCREMENT 分配，保证单调递增。
    async fn enqueue(&self, signal: &NewSignal) -> Result<Signal, StoreError> {
        let data = signal
            .command
            .payload_json()
            .map_err(|e| StoreError::Database(format!("Failed to encode signal_data: {}", e)))?;

        let id = sqlx::query(
            r#"
            INSERT INTO trade_signals (account_number, ticket, signal_type, signal_data, processed, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(signal.account_number.0)
        .bind(signal.command.ticket().map(|t| t.0))
        .bind(signal.command.signal_type().as_str())
        .bind(data.to_string())
        .bind(signal.created_at)
        .execute(&self.writer)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        Ok(Signal {
            id: SignalId(id),
            account_number: signal.account_number,
            command: signal.command.clone(),
            processed: false,
            created_at: signal.created_at,
            processed_at: None,
        })
    }

    async fn pending(&self, account: AccountNumber) -> Result<Vec<Signal>, StoreError> {
        let sql = format!(
            "SELECT {} FROM trade_signals WHERE account_number = ? AND processed = 0 ORDER BY id ASC",
            SIGNAL_COLUMNS
        );
        sqlx::query_as::<_, SignalRow>(&sql)
            .bind(account.0)
            .fetch_all(&self.reader)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Signal::try_from)
            .collect()
    }

    /// # Summary
    /// 幂等确认。
    ///
    /// # Logic
    /// 1. 条件更新 `WHERE processed = 0`，命中即为本次确认。
    /// 2. 未命中时在同一写连接上查询该 id 是否存在，区分重复确认与未知信号。
    async fn acknowledge(&self, id: SignalId, at: DateTime<Utc>) -> Result<AckOutcome, StoreError> {
        let mut tx = self.writer.begin().await.map_err(db_err)?;

        let affected = sqlx::query(
            "UPDATE trade_signals SET processed = 1, processed_at = ? WHERE id = ? AND processed = 0",
        )
        .bind(at)
        .bind(id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        let outcome = if affected > 0 {
            AckOutcome::Acknowledged
        } else {
            let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM trade_signals WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
            match exists {
                Some(_) => AckOutcome::AlreadyProcessed,
                None => AckOutcome::Unknown,
            }
        };

        tx.commit().await.map_err(db_err)?;
        debug!("Acknowledge signal {} -> {:?}", id, outcome);
        Ok(outcome)
    }

    async fn purge_processed(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let deleted = sqlx::query(
            "DELETE FROM trade_signals WHERE processed = 1 AND processed_at IS NOT NULL AND processed_at < ?",
        )
        .bind(before)
        .execute(&self.writer)
        .await
        .map_err(db_err)?
        .rows_affected();
        Ok(deleted)
    }
}
