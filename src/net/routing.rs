//! 最短路引擎
//!
//! 在拓扑快照上用 Dijkstra 计算两台交换机之间代价最小的路径。
//!
//! 拓扑规模在几十台交换机量级，这里采用 O(V²) 的朴素选点：每轮在未访问节点中选出
//! 暂定距离最小者（距离相同时取标识符最小者），松弛其出边，直到访问到目的节点
//! 或不存在有限距离的未访问节点。所有状态都是局部变量，结果只对本次快照有效。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, trace};

use super::error::RouteError;
use super::id::SwitchId;
use super::snapshot::TopologySnapshot;

/// 一条路径：从源到目的（含两端）的交换机序列及总代价
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub hops: Vec<SwitchId>,
    pub cost: f64,
}

impl PathResult {
    pub fn src(&self) -> SwitchId {
        self.hops[0]
    }

    pub fn dst(&self) -> SwitchId {
        self.hops[self.hops.len() - 1]
    }

    /// 相邻交换机对 (from, to)
    pub fn hop_pairs(&self) -> impl Iterator<Item = (SwitchId, SwitchId)> + '_ {
        self.hops.windows(2).map(|w| (w[0], w[1]))
    }
}

/// 计算 `src` 到 `dst` 的最短路径。
///
/// 图中存在负权（或非有限）边时直接返回 `RouteError::NegativeWeight`，不给出可能错误的结果。
#[tracing::instrument(skip(graph), fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub fn shortest_path(
    graph: &TopologySnapshot,
    src: SwitchId,
    dst: SwitchId,
) -> Result<PathResult, RouteError> {
    if !graph.contains(src) {
        return Err(RouteError::SourceNotFound(src));
    }
    if !graph.contains(dst) {
        return Err(RouteError::DestinationNotFound(dst));
    }
    check_weights(graph)?;

    let mut dist: BTreeMap<SwitchId, f64> = BTreeMap::new();
    let mut parent: HashMap<SwitchId, SwitchId> = HashMap::new();
    let mut visited: BTreeSet<SwitchId> = BTreeSet::new();
    dist.insert(src, 0.0);

    loop {
        // 升序遍历 + 严格小于：距离相同时保留标识符最小的节点。
        let mut best: Option<(SwitchId, f64)> = None;
        for (&node, &d) in &dist {
            if visited.contains(&node) {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((node, d));
            }
        }
        let Some((u, du)) = best else {
            break;
        };
        visited.insert(u);
        trace!(node = %u, dist = du, "访问节点");

        if u == dst {
            let path = build_path(&parent, src, dst, du);
            debug!(hops = ?path.hops, cost = path.cost, "找到最短路径");
            return Ok(path);
        }

        for (v, w) in graph.neighbors(u) {
            if visited.contains(&v) {
                continue;
            }
            let nd = du + w;
            if dist.get(&v).is_none_or(|&d| nd < d) {
                dist.insert(v, nd);
                parent.insert(v, u);
            }
        }
    }

    debug!(%src, %dst, "目的不可达");
    Err(RouteError::NoPathExists { src, dst })
}

fn check_weights(graph: &TopologySnapshot) -> Result<(), RouteError> {
    for u in graph.nodes() {
        for (v, w) in graph.neighbors(u) {
            if !w.is_finite() || w < 0.0 {
                return Err(RouteError::NegativeWeight {
                    src: u,
                    dst: v,
                    cost: w,
                });
            }
        }
    }
    Ok(())
}

fn build_path(
    parent: &HashMap<SwitchId, SwitchId>,
    src: SwitchId,
    dst: SwitchId,
    cost: f64,
) -> PathResult {
    let mut hops = vec![dst];
    let mut cur = dst;
    while cur != src {
        // parent 链一定能回到 src：只有被松弛过的节点才会进入 dist。
        match parent.get(&cur) {
            Some(&p) => {
                hops.push(p);
                cur = p;
            }
            None => break,
        }
    }
    hops.reverse();
    PathResult { hops, cost }
}
