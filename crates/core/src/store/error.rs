use thiserror::Error;

/// # Summary
/// 存储层错误枚举，处理数据库连接、读写失败等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - `Unavailable` 仅用于可重试的瞬时故障 (连接池超时、数据库忙)。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库操作失败
    #[error("Database error: {0}")]
    Database(String),
    /// 存储暂不可用，调用方可重试
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// 已持久化的数据无法解析
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    /// 记录未找到
    #[error("Not found")]
    NotFound,
    /// 初始化存储失败
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl StoreError {
    /// 是否属于可重试的瞬时故障
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
