//! 快照对账引擎与信号队列。
//!
//! 两者都只依赖 `tradepub-core` 中的端口抽象，具体存储由上层注入。

pub mod diff;
pub mod locks;
pub mod queue;
pub mod reconciler;
pub mod validate;

pub use queue::SignalQueue;
pub use reconciler::Reconciler;
