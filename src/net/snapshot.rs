//! 拓扑快照
//!
//! 最短路计算使用的只读图视图，与拓扑存储的后续修改互不影响。

use std::collections::BTreeMap;

use super::id::SwitchId;

/// 只读的有向加权图。邻居按标识符升序存放，保证遍历顺序确定。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologySnapshot {
    adj: BTreeMap<SwitchId, BTreeMap<SwitchId, f64>>,
}

impl TopologySnapshot {
    /// 由节点与边直接构造；边的端点自动成为节点，重复的 (src, dst) 以后者为准。
    ///
    /// 这里不做权重校验，负权边由最短路引擎在计算时拒绝。
    pub fn from_edges(
        nodes: impl IntoIterator<Item = SwitchId>,
        edges: impl IntoIterator<Item = (SwitchId, SwitchId, f64)>,
    ) -> Self {
        let mut adj: BTreeMap<SwitchId, BTreeMap<SwitchId, f64>> = BTreeMap::new();
        for n in nodes {
            adj.entry(n).or_default();
        }
        for (src, dst, cost) in edges {
            adj.entry(dst).or_default();
            adj.entry(src).or_default().insert(dst, cost);
        }
        Self { adj }
    }

    pub fn contains(&self, id: SwitchId) -> bool {
        self.adj.contains_key(&id)
    }

    /// 升序遍历所有节点
    pub fn nodes(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.adj.keys().copied()
    }

    /// 升序遍历 `id` 的出边 (邻居, 代价)
    pub fn neighbors(&self, id: SwitchId) -> impl Iterator<Item = (SwitchId, f64)> + '_ {
        self.adj
            .get(&id)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&n, &c)| (n, c)))
    }

    pub fn edge_cost(&self, src: SwitchId, dst: SwitchId) -> Option<f64> {
        self.adj.get(&src).and_then(|m| m.get(&dst)).copied()
    }

    pub fn node_count(&self) -> usize {
        self.adj.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adj.values().map(BTreeMap::len).sum()
    }
}
