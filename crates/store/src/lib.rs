//! # `tradepub-store` - SQLite 持久化层
//!
//! 以单个 SQLite 数据库文件实现 `AccountStore` 与 `SignalStore`。
//! 写操作统一走容量为 1 的写连接池，读操作走独立的只读连接池 (WAL 模式下互不阻塞)。

pub mod account;
mod codec;
pub mod schema;
pub mod signal;
pub mod sqlite;

pub use sqlite::SqliteStore;
