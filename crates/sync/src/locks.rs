use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tradepub_core::common::AccountNumber;

/// # Summary
/// 按账户号划分的异步互斥锁表。
///
/// # Invariants
/// * 同一账户同一时刻至多一个持锁者，不同账户之间互不阻塞。
/// * 锁条目按需创建且不回收，同一账户始终对应同一把锁。
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<AccountNumber, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Summary
    /// 获取指定账户的锁，必要时等待其他持锁者释放。
    ///
    /// # Logic
    /// 先在 DashMap 分片锁内取出 (或创建) 该账户的 `Arc<Mutex>`，
    /// 释放分片锁之后再 `await`，避免跨 await 持有分片锁。
    ///
    /// # Returns
    /// 独立持有的锁守卫，drop 时释放。
    pub async fn acquire(&self, account: AccountNumber) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = AccountLocks::new();
        let guard = locks.acquire(AccountNumber(1)).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(AccountNumber(1))).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(AccountNumber(1))).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire(AccountNumber(1)).await;
        let b =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(AccountNumber(2))).await;
        assert!(b.is_ok());
        assert_eq!(locks.locks.len(), 2);
    }
}
