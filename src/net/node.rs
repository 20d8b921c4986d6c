//! 节点类型
//!
//! 定义拓扑中的交换机节点与主机。

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Instant;

use serde::Serialize;

use super::id::{MacAddr, PortNo, SwitchId};

/// 交换机节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchNode {
    pub id: SwitchId,
    pub ports: BTreeSet<PortNo>,
}

impl SwitchNode {
    /// 创建新交换机
    pub fn new(id: SwitchId) -> Self {
        Self {
            id,
            ports: BTreeSet::new(),
        }
    }
}

/// 主机：一个硬件地址只有一个当前位置，后到的观测覆盖先前的位置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub mac: MacAddr,
    pub ip: Option<IpAddr>,
    pub switch: SwitchId,
    pub port: PortNo,
    #[serde(skip)]
    pub(crate) last_seen: Option<Instant>,
}

impl Host {
    pub fn new(mac: MacAddr, ip: Option<IpAddr>, switch: SwitchId, port: PortNo) -> Self {
        Self {
            mac,
            ip,
            switch,
            port,
            last_seen: None,
        }
    }

    /// 位置 (switch, port)
    pub fn location(&self) -> (SwitchId, PortNo) {
        (self.switch, self.port)
    }
}
