//! # `tradepub-core` - 领域核心
//!
//! 定义账户、持仓单 (Trade) 与指令信号 (Signal) 的实体模型，
//! 以及存储层、同步层之间的端口 Trait 与错误类型。
//! 本 crate 不包含任何具体实现，`store` / `sync` / `api` 仅依赖这里的抽象。

pub mod account;
pub mod common;
pub mod config;
pub mod signal;
pub mod store;
pub mod sync;
