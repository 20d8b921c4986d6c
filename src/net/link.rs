//! 链路类型
//!
//! 定义交换机之间的单向链路及其代价、测得带宽。

use serde::{Deserialize, Serialize};

use super::id::{PortNo, SwitchId};

/// 单向链路。双向连接用两条记录表示，两个方向的代价可以不同。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: SwitchId,
    pub src_port: PortNo,
    pub dst: SwitchId,
    pub dst_port: PortNo,
    /// 最短路计算使用的代价（非负）
    pub cost: f64,
    /// 最近一次测得的吞吐（Mbps）。None 表示尚未测量。
    pub bandwidth_mbps: Option<f64>,
}

impl Link {
    /// 创建新链路
    pub fn new(src: SwitchId, src_port: PortNo, dst: SwitchId, dst_port: PortNo, cost: f64) -> Self {
        Self {
            src,
            src_port,
            dst,
            dst_port,
            cost,
            bandwidth_mbps: None,
        }
    }

    /// 由测得带宽推导代价：带宽越低代价越高（参考带宽 / 实测带宽）。
    pub(crate) fn cost_from_bandwidth(reference_mbps: f64, mbps: f64) -> f64 {
        reference_mbps / mbps
    }
}
