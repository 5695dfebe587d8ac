use super::error::StoreError;
use crate::account::entity::{Account, AccountSummary, Trade};
use crate::common::{AccountNumber, SignalId, Ticket};
use crate::signal::entity::{AckOutcome, NewSignal, Signal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// # Summary
/// 账户与持仓单的持久化接口。
///
/// # Invariants
/// - (`account_number`, `ticket`) 唯一由存储引擎约束保证。
/// - 删除账户必须同时删除其全部持仓单与信号，不留孤儿行。
/// - 实现类必须线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// # Summary
    /// 开启一个对账事务。
    ///
    /// # Logic
    /// 返回的事务对象持有底层写连接，所有对账步骤在同一事务中执行。
    /// 事务对象在未调用 `commit` 前被丢弃时自动回滚。
    ///
    /// # Returns
    /// 事务句柄；连接池超时返回 `StoreError::Unavailable`。
    async fn begin_sync(&self) -> Result<Box<dyn SyncTransaction>, StoreError>;

    /// 按账户号读取账户行
    async fn get_account(&self, account: AccountNumber) -> Result<Option<Account>, StoreError>;

    /// # Summary
    /// 列出全部账户及其持仓单数量。
    ///
    /// # Returns
    /// 按 `last_update` 倒序排列的账户列表。
    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError>;

    /// # Summary
    /// 分页读取指定账户当前的持仓单。
    ///
    /// # Arguments
    /// * `account`: 账户号。
    /// * `limit`: 最大返回条数。
    /// * `offset`: 跳过的条数。
    ///
    /// # Returns
    /// 按 `open_time` 倒序排列的持仓单列表。
    async fn list_trades(
        &self,
        account: AccountNumber,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, StoreError>;

    /// 读取单笔持仓单
    async fn get_trade(
        &self,
        account: AccountNumber,
        ticket: Ticket,
    ) -> Result<Option<Trade>, StoreError>;

    /// # Summary
    /// 删除账户及其全部持仓单与信号。
    ///
    /// # Logic
    /// 在单个事务中先显式删除子表记录，再删除账户行；外键级联作为第二道保障。
    ///
    /// # Returns
    /// 账户存在并被删除返回 `true`，账户不存在返回 `false`。
    async fn delete_account(&self, account: AccountNumber) -> Result<bool, StoreError>;

    /// 存储连通性检查 (健康检查使用)
    async fn ping(&self) -> Result<(), StoreError>;
}

/// # Summary
/// 单次快照对账使用的事务句柄。
///
/// # Invariants
/// - 所有方法在同一个数据库事务内执行，外部在 `commit` 之前看不到任何写入。
/// - 未提交即被丢弃时回滚，保证全有或全无。
#[async_trait]
pub trait SyncTransaction: Send {
    /// 在事务内读取账户行
    async fn load_account(&mut self, account: AccountNumber) -> Result<Option<Account>, StoreError>;

    /// 插入或覆盖账户行。`server` 与 `created_at` 仅在插入时写入。
    async fn upsert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// 在事务内读取账户当前全部持仓单
    async fn load_trades(&mut self, account: AccountNumber) -> Result<Vec<Trade>, StoreError>;

    /// 插入新持仓单，违反唯一约束时返回错误
    async fn insert_trade(&mut self, trade: &Trade) -> Result<(), StoreError>;

    /// 只更新可变字段 (`sl` / `tp` / `profit` / `comment` / `last_update`)
    async fn update_trade(&mut self, trade: &Trade) -> Result<(), StoreError>;

    /// 删除指定的 ticket，返回实际删除的行数
    async fn delete_trades(
        &mut self,
        account: AccountNumber,
        tickets: &[Ticket],
    ) -> Result<u64, StoreError>;

    /// 提交事务
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// # Summary
/// 信号队列的持久化接口。
///
/// # Invariants
/// - 待处理信号按入队顺序 (`SignalId` 递增) 返回。
/// - 已处理信号永不回退为待处理。
/// - 存储层不会自动过期任何待处理信号。
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// 写入一条 `processed = false` 的新信号并返回其持久化形态
    async fn enqueue(&self, signal: &NewSignal) -> Result<Signal, StoreError>;

    /// 按入队顺序返回账户的全部待处理信号
    async fn pending(&self, account: AccountNumber) -> Result<Vec<Signal>, StoreError>;

    /// # Summary
    /// 幂等地将信号标记为已处理。
    ///
    /// # Logic
    /// 仅当 `processed = false` 时写入 `processed = true` 与 `processed_at = at`；
    /// 已处理或不存在的信号不做任何修改。
    ///
    /// # Returns
    /// 本次调用的结果，三种结果都不是错误。
    async fn acknowledge(&self, id: SignalId, at: DateTime<Utc>) -> Result<AckOutcome, StoreError>;

    /// # Summary
    /// 清理 `processed_at` 早于 `before` 的已处理信号。
    ///
    /// # Returns
    /// 删除的行数。待处理信号不受影响。
    async fn purge_processed(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;
}
