use crate::store::error::StoreError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// # Summary
/// 对账引擎与信号队列的统一错误类型。
///
/// # Invariants
/// - 任何错误返回时，本次操作的写入均已回滚。
#[derive(Error, Debug)]
pub enum SyncError {
    /// 快照或指令字段缺失 / 非法
    #[error("Validation failed: {0}")]
    Validation(String),
    /// 快照时间早于已存储状态
    #[error("Stale snapshot: incoming {incoming} is older than stored {stored}")]
    Conflict {
        stored: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },
    /// 引用了不存在的账户 / ticket / 信号
    #[error("Not found: {0}")]
    NotFound(String),
    /// 事务在限定时间内未完成
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// 调用方是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout(_) => true,
            SyncError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
