use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use tradepub_core::common::time::TimeProvider;
use tradepub_core::common::{AccountNumber, SignalId};
use tradepub_core::signal::entity::{AckOutcome, NewSignal, Signal, SignalCommand};
use tradepub_core::store::error::StoreError;
use tradepub_core::store::port::{AccountStore, SignalStore};
use tradepub_core::sync::error::SyncError;

use crate::validate::validate_command;

/// # Summary
/// 面向终端的按账户信号队列。纯拉取模式，不做任何后台调度。
///
/// # Invariants
/// * 待处理信号按入队顺序交付。
/// * 确认幂等：重复确认或确认未知信号都不是错误。
/// * 未处理信号永不自动过期，只有已处理信号可被清理。
pub struct SignalQueue {
    signals: Arc<dyn SignalStore>,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn TimeProvider>,
}

impl SignalQueue {
    pub fn new(
        signals: Arc<dyn SignalStore>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            signals,
            accounts,
            clock,
        }
    }

    /// # Summary
    /// 为账户入队一条指令。
    ///
    /// # Logic
    /// 1. 校验指令载荷。
    /// 2. 账户必须存在；CLOSE / MODIFY 引用的 ticket 必须是该账户当前持仓。
    /// 3. 以当前时间作为 `created_at` 写入。
    ///
    /// # Arguments
    /// * `account` - 目标账户。
    /// * `command` - 强类型指令。
    ///
    /// # Returns
    /// 持久化后的信号 (含存储分配的 id)。
    pub async fn enqueue(
        &self,
        account: AccountNumber,
        command: SignalCommand,
    ) -> Result<Signal, SyncError> {
        validate_command(&command)?;

        if self.accounts.get_account(account).await?.is_none() {
            return Err(SyncError::NotFound(format!("Account {} not found", account)));
        }
        if let Some(ticket) = command.ticket()
            && self.accounts.get_trade(account, ticket).await?.is_none()
        {
            return Err(SyncError::NotFound(format!(
                "Trade {} not found on account {}",
                ticket, account
            )));
        }

        let signal = self
            .signals
            .enqueue(&NewSignal {
                account_number: account,
                command,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| match e {
                // 检查之后账户被并发删除
                StoreError::NotFound => {
                    SyncError::NotFound(format!("Account {} not found", account))
                }
                other => other.into(),
            })?;

        info!(
            "Enqueued {} signal {} for account {}",
            signal.command.signal_type(),
            signal.id,
            account
        );
        Ok(signal)
    }

    /// 账户当前的全部待处理信号，按入队顺序排列。未知账户返回空列表。
    pub async fn pending(&self, account: AccountNumber) -> Result<Vec<Signal>, SyncError> {
        let signals = self.signals.pending(account).await?;
        debug!("Account {} has {} pending signals", account, signals.len());
        Ok(signals)
    }

    /// # Summary
    /// 确认信号已被终端处理。
    ///
    /// # Returns
    /// `Acknowledged` / `AlreadyProcessed` / `Unknown` 三者之一，均为正常结果。
    pub async fn acknowledge(&self, id: SignalId) -> Result<AckOutcome, SyncError> {
        let outcome = self.signals.acknowledge(id, self.clock.now()).await?;
        match outcome {
            AckOutcome::Acknowledged => info!("Signal {} acknowledged", id),
            AckOutcome::AlreadyProcessed => debug!("Signal {} was already processed", id),
            AckOutcome::Unknown => info!("Acknowledge for unknown signal {}", id),
        }
        Ok(outcome)
    }

    /// 清理 `processed_at` 早于 `before` 的已处理信号，返回清理条数
    pub async fn purge_processed(&self, before: DateTime<Utc>) -> Result<u64, SyncError> {
        let purged = self.signals.purge_processed(before).await?;
        info!("Purged {} processed signals older than {}", purged, before);
        Ok(purged)
    }
}
