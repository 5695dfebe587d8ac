use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::info;
use tradepub_core::config::DatabaseConfig;
use tradepub_core::store::error::StoreError;

/// # Summary
/// `AccountStore` 与 `SignalStore` 的 SQLite 实现。
///
/// # Invariants
/// * 数据库结构在 `open` 时初始化。
/// * 所有写事务经过唯一的写连接串行执行，事务中途不会被其他写者打断。
/// * 读操作使用独立连接池，WAL 模式下不阻塞写者，读到的总是已提交数据。
/// * 每条连接都显式开启外键约束。
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) writer: SqlitePool,
    pub(crate) reader: SqlitePool,
}

impl SqliteStore {
    /// # Summary
    /// 打开 (必要时创建) 数据库文件并初始化表结构。
    ///
    /// # Logic
    /// 1. 确保数据库所在目录存在。
    /// 2. 以 WAL + `busy_timeout` + 外键约束配置连接选项。
    /// 3. 建立容量为 1 的写连接池并执行 DDL。
    /// 4. 建立只读查询使用的连接池。
    ///
    /// # Arguments
    /// * `config` - 数据库配置。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或初始化错误。
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InitError(format!("Failed to create db dir {:?}: {}", parent, e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options.clone())
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        crate::schema::migrate(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        info!("SQLite store opened at {}", config.path.display());
        Ok(Self { writer, reader })
    }

    /// 关闭全部连接
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }

    /// 测试与运维使用的只读连接池
    pub fn read_pool(&self) -> &SqlitePool {
        &self.reader
    }
}

/// 将 sqlx 错误归类为存储层错误。连接池超时与数据库忙视为可重试，
/// 外键约束失败说明引用的账户不存在 (例如已被并发删除)，归为 `NotFound`。
pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        sqlx::Error::Database(db) => {
            // SQLITE_BUSY (5) / SQLITE_LOCKED (6) 及其扩展码
            let busy = matches!(
                db.code().as_deref(),
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
            );
            if busy {
                StoreError::Unavailable(e.to_string())
            } else if db.is_foreign_key_violation() {
                StoreError::NotFound
            } else {
                StoreError::Database(e.to_string())
            }
        }
        _ => StoreError::Database(e.to_string()),
    }
}
