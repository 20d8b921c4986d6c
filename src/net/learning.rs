//! 地址学习表
//!
//! 每台交换机一张表：源硬件地址 -> 入端口。每个 (switch, address) 最多对应一个端口，
//! 记录总是无条件覆盖。表项在 `ttl` 内未刷新即视为失效；单台交换机的表项数有上限，
//! 超出时淘汰最久未刷新的表项。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::id::{MacAddr, PortNo, SwitchId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningEntry {
    pub port: PortNo,
    pub last_seen: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct LearningTable {
    tables: HashMap<SwitchId, HashMap<MacAddr, LearningEntry>>,
    ttl: Option<Duration>,
    max_per_switch: Option<usize>,
}

impl LearningTable {
    /// `ttl` 为 None 表示表项永不过期；`max_per_switch` 为 None 表示不限容量。
    pub fn new(ttl: Option<Duration>, max_per_switch: Option<usize>) -> Self {
        Self {
            tables: HashMap::new(),
            ttl,
            max_per_switch: max_per_switch.filter(|&n| n > 0),
        }
    }

    /// 记录 `address` 在 `switch` 上从 `port` 进入，返回被覆盖的旧端口。
    pub fn record_ingress(
        &mut self,
        switch: SwitchId,
        address: MacAddr,
        port: PortNo,
        now: Instant,
    ) -> Option<PortNo> {
        let table = self.tables.entry(switch).or_default();

        if let Some(cap) = self.max_per_switch {
            if !table.contains_key(&address) && table.len() >= cap {
                if let Some(victim) = table
                    .iter()
                    .min_by_key(|(mac, e)| (e.last_seen, **mac))
                    .map(|(mac, _)| *mac)
                {
                    table.remove(&victim);
                    debug!(%switch, mac = %victim, "学习表已满，淘汰最旧表项");
                }
            }
        }

        let prev = table
            .insert(
                address,
                LearningEntry {
                    port,
                    last_seen: now,
                },
            )
            .map(|e| e.port);
        trace!(%switch, %address, port, ?prev, "学习源地址");
        prev
    }

    /// 查询表项，不考虑过期。
    pub fn lookup(&self, switch: SwitchId, address: MacAddr) -> Option<PortNo> {
        self.tables.get(&switch)?.get(&address).map(|e| e.port)
    }

    /// 查询在 `now` 时刻仍然有效的表项
    pub fn lookup_at(&self, switch: SwitchId, address: MacAddr, now: Instant) -> Option<PortNo> {
        let entry = self.tables.get(&switch)?.get(&address)?;
        if self.is_stale(entry, now) {
            return None;
        }
        Some(entry.port)
    }

    /// 清理过期表项，返回清理数量
    pub fn expire(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let mut removed = 0;
        for table in self.tables.values_mut() {
            let before = table.len();
            table.retain(|_, e| now.saturating_duration_since(e.last_seen) < ttl);
            removed += before - table.len();
        }
        self.tables.retain(|_, t| !t.is_empty());
        if removed > 0 {
            debug!(removed, "清理过期学习表项");
        }
        removed
    }

    /// 删除某台交换机的全部表项
    pub fn forget_switch(&mut self, switch: SwitchId) -> usize {
        self.tables.remove(&switch).map_or(0, |t| t.len())
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_stale(&self, entry: &LearningEntry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.last_seen) >= ttl)
    }
}
