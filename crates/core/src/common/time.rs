use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// 可持久化时间的上限 9999-12-31T23:59:59Z (Unix 秒)
pub const MAX_STORABLE_UNIX_SECS: i64 = 253_402_300_799;

/// # Summary
/// 时间是否落在可持久化区间 [1970-01-01, 9999-12-31]。
///
/// # Invariants
/// - 时间以 RFC3339 文本落库并按字符串排序，只有四位年份的正向时间才保持字典序与时间序一致。
pub fn is_storable(time: &DateTime<Utc>) -> bool {
    (0..=MAX_STORABLE_UNIX_SECS).contains(&time.timestamp())
}

/// # Summary
/// 时间供给器接口，隔离物理系统时钟。
/// 信号的 `created_at` / `processed_at` 等服务端时间一律通过此接口获取，
/// 以便测试中固定时间。
pub trait TimeProvider: Send + Sync {
    /// 获取当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// # Summary
/// 生产环境使用的真实时钟，直接返回操作系统当前时间。
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// # Summary
/// 测试专用虚拟时钟，允许主动拨快或回退时间。
///
/// # Invariants
/// - 并发安全：内部利用 `RwLock` 保护当前时间。
/// - 锁中毒时沿用中毒前的值，不向调用方传播 panic。
pub struct FakeClockProvider {
    current_time: RwLock<DateTime<Utc>>,
}

impl FakeClockProvider {
    /// 使用指定的初始时间创建虚拟时钟
    pub fn new(initial_time: DateTime<Utc>) -> Self {
        Self {
            current_time: RwLock::new(initial_time),
        }
    }

    /// 强制修改时钟的当前时间
    pub fn set_time(&self, new_time: DateTime<Utc>) {
        let mut time = self
            .current_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *time = new_time;
    }

    /// 将时钟向前拨动指定时长
    pub fn advance(&self, delta: chrono::Duration) {
        let mut time = self
            .current_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *time += delta;
    }
}

impl TimeProvider for FakeClockProvider {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
