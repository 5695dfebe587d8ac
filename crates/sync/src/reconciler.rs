use std::future::Future;
use std::sync::Arc;
use chrono::TimeDelta;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};
use tradepub_core::account::entity::{Account, Snapshot};
use tradepub_core::common::AccountNumber;
use tradepub_core::common::time::TimeProvider;
use tradepub_core::config::SyncConfig;
use tradepub_core::store::port::AccountStore;
use tradepub_core::sync::entity::ReconcileReport;
use tradepub_core::sync::error::SyncError;

use crate::diff;
use crate::locks::AccountLocks;
use crate::validate::{validate_clock_skew, validate_snapshot};

/// # Summary
/// 快照对账引擎：把终端推送的完整快照原子地应用到存储。
///
/// # Invariants
/// * 同一账户的对账与删除串行执行，不同账户完全并行。
/// * 每次对账在单个存储事务内完成，失败时之前的状态原样保留。
/// * 对账本身不生成任何信号。
pub struct Reconciler {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn TimeProvider>,
    locks: AccountLocks,
    apply_timeout: Duration,
    max_clock_skew: TimeDelta,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn TimeProvider>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store,
            clock,
            locks: AccountLocks::new(),
            apply_timeout: config.apply_timeout(),
            max_clock_skew: TimeDelta::from_std(config.max_clock_skew())
                .unwrap_or(TimeDelta::MAX),
        }
    }

    /// # Summary
    /// 应用一份快照。
    ///
    /// # Logic
    /// 1. 校验快照取值及其时间是否超前服务端时钟，不合法直接拒绝，不触碰存储。
    /// 2. 在限时内获取账户锁并执行事务 (见 `apply`)。
    /// 3. 超时视为可重试的瞬时失败，未提交的事务随 future 一起丢弃并回滚。
    ///
    /// # Arguments
    /// * `snapshot` - 终端上报的完整快照。
    ///
    /// # Returns
    /// * `Ok(ReconcileReport)` - 本次写入的统计。
    /// * `Err(SyncError)` - 校验失败、旧快照、超时或存储错误。
    pub async fn reconcile(&self, snapshot: Snapshot) -> Result<ReconcileReport, SyncError> {
        let account = snapshot.account_number;
        let span = info_span!("reconcile", account = %account);

        async move {
            if let Err(e) = validate_snapshot(&snapshot)
                .and_then(|()| validate_clock_skew(&snapshot, self.clock.now(), self.max_clock_skew))
            {
                warn!("Rejected snapshot: {}", e);
                return Err(e);
            }
            self.exclusive(account, self.apply(snapshot)).await
        }
        .instrument(span)
        .await
    }

    /// # Summary
    /// 删除账户及其持仓单与信号。与该账户的对账互斥。
    ///
    /// # Returns
    /// 账户存在并被删除时返回 `true`。
    pub async fn remove_account(&self, account: AccountNumber) -> Result<bool, SyncError> {
        self.exclusive(account, async {
            let removed = self.store.delete_account(account).await?;
            Ok(removed)
        })
        .await
    }

    /// 在限时内持有账户锁执行 `work`
    async fn exclusive<T, F>(&self, account: AccountNumber, work: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        let locked = async {
            let _guard = self.locks.acquire(account).await;
            work.await
        };

        match tokio::time::timeout(self.apply_timeout, locked).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Account {} operation timed out after {:?}",
                    account, self.apply_timeout
                );
                Err(SyncError::Timeout(self.apply_timeout))
            }
        }
    }

    /// # Summary
    /// 持锁状态下的对账事务主体。
    ///
    /// # Logic
    /// 1. 开启事务并读取已存储的账户行。
    /// 2. 快照时间早于 `last_update` 时拒绝 (相等视为重放，照常接受)。
    /// 3. 已知账户保留原 `server` 与 `created_at`，新账户以当前时间作为 `created_at`。
    /// 4. 写入账户资金字段，读取当前持仓单并计算差异计划。
    /// 5. 依次执行插入、可变字段更新、平仓删除，最后提交。
    async fn apply(&self, snapshot: Snapshot) -> Result<ReconcileReport, SyncError> {
        let account = snapshot.account_number;
        let incoming_server = snapshot.server.trim().to_string();
        let mut tx = self.store.begin_sync().await?;

        let existing = tx.load_account(account).await?;
        let (server, created_at) = match &existing {
            Some(stored) => {
                if snapshot.timestamp < stored.last_update {
                    warn!(
                        "Stale snapshot at {} (stored {})",
                        snapshot.timestamp, stored.last_update
                    );
                    return Err(SyncError::Conflict {
                        stored: stored.last_update,
                        incoming: snapshot.timestamp,
                    });
                }
                if stored.server != incoming_server {
                    warn!(
                        "Server mismatch: stored '{}', reported '{}'; keeping stored value",
                        stored.server, incoming_server
                    );
                }
                (stored.server.clone(), stored.created_at)
            }
            None => (incoming_server, self.clock.now()),
        };

        tx.upsert_account(&Account {
            account_number: account,
            server,
            balance: snapshot.balance,
            equity: snapshot.equity,
            margin: snapshot.margin,
            free_margin: snapshot.free_margin,
            last_update: snapshot.timestamp,
            created_at,
        })
        .await?;

        let stored_trades = tx.load_trades(account).await?;
        let plan = diff::plan(account, stored_trades, &snapshot.trades, snapshot.timestamp);
        if plan.is_noop() {
            debug!("Plan: {} trades unchanged", plan.unchanged);
        } else {
            debug!(
                "Plan: {} inserts, {} updates, {} unchanged, closed {:?}",
                plan.inserts.len(),
                plan.updates.len(),
                plan.unchanged,
                plan.closed
            );
        }
        for ticket in &plan.immutable_conflicts {
            warn!(
                "Trade {} reported with different immutable fields; keeping stored values",
                ticket
            );
        }

        for trade in &plan.inserts {
            tx.insert_trade(trade).await?;
        }
        for trade in &plan.updates {
            tx.update_trade(trade).await?;
        }
        if !plan.closed.is_empty() {
            tx.delete_trades(account, &plan.closed).await?;
        }

        tx.commit().await?;

        let report = ReconcileReport {
            account_number: account,
            created_account: existing.is_none(),
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            unchanged: plan.unchanged,
            closed: plan.closed.len(),
            closed_tickets: plan.closed,
            last_update: snapshot.timestamp,
        };
        info!(
            "Reconciled {} reported trades: inserted={} updated={} unchanged={} closed={}{}",
            report.reported(),
            report.inserted,
            report.updated,
            report.unchanged,
            report.closed,
            if report.created_account { " (new account)" } else { "" }
        );
        Ok(report)
    }
}
