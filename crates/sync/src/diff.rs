use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tradepub_core::account::entity::{ReportedTrade, Trade};
use tradepub_core::common::{AccountNumber, Ticket};

/// # Summary
/// 已存储持仓单集合与快照上报集合之间的差异计划。
///
/// # Invariants
/// * `inserts` / `updates` / `unchanged` 覆盖快照中的每一笔持仓单，且互不相交。
/// * `closed` 为存储中存在而快照中缺失的 ticket，升序排列。
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TradePlan {
    /// 首次出现的 ticket，待插入
    pub inserts: Vec<Trade>,
    /// 可变字段有变化的 ticket，已合并为新行
    pub updates: Vec<Trade>,
    /// 与存储完全一致、无需改写的 ticket 数量
    pub unchanged: usize,
    /// 推断为已被终端平仓的 ticket
    pub closed: Vec<Ticket>,
    /// 不可变字段与存储不一致的 ticket，以存储值为准
    pub immutable_conflicts: Vec<Ticket>,
}

impl TradePlan {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.closed.is_empty()
    }
}

/// # Summary
/// 计算一次快照需要执行的写操作。纯函数，不访问存储。
///
/// # Logic
/// 1. 以 ticket 为键索引已存储的持仓单。
/// 2. 遍历上报集合：未知 ticket 进入 `inserts`；
///    已知 ticket 比较可变字段，不同则合并进 `updates`，相同计入 `unchanged`。
/// 3. 剩余未被匹配的已存储 ticket 即为平仓集合。
///
/// # Arguments
/// * `account` - 快照所属账户。
/// * `stored` - 事务内读取的当前持仓单。
/// * `reported` - 快照上报的持仓单，调用方保证 ticket 不重复。
/// * `at` - 快照时间，写入新行与被修改行的 `last_update`。
pub fn plan(
    account: AccountNumber,
    stored: Vec<Trade>,
    reported: &[ReportedTrade],
    at: DateTime<Utc>,
) -> TradePlan {
    let mut known: HashMap<Ticket, Trade> = stored.into_iter().map(|t| (t.ticket, t)).collect();
    let mut result = TradePlan::default();

    for incoming in reported {
        match known.remove(&incoming.ticket) {
            None => result.inserts.push(incoming.clone().into_trade(account, at)),
            Some(existing) => {
                if !existing.immutable_fields_match(incoming) {
                    result.immutable_conflicts.push(incoming.ticket);
                }
                if existing.mutable_fields_match(incoming) {
                    result.unchanged += 1;
                } else {
                    result.updates.push(existing.with_mutable_fields(incoming, at));
                }
            }
        }
    }

    let closed: BTreeSet<Ticket> = known.into_keys().collect();
    result.closed = closed.into_iter().collect();
    result
}
