//! 拓扑声明
//!
//! 把测试床风格的拓扑声明（主机、交换机、带权双向链路）转换为控制器会收到的发现事件流。
//! 端口号按声明顺序在每台交换机上从 1 开始递增分配。

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::config::{ControllerConfig, LinkWeight};
use crate::ctrl::{ChannelState, ControlEvent};
use crate::net::{MacAddr, PortNo, SwitchId};

#[derive(Debug, Clone)]
pub struct DeclaredHost {
    pub name: String,
    pub mac: MacAddr,
    pub ip: IpAddr,
    pub switch: SwitchId,
    pub port: PortNo,
}

#[derive(Debug, Clone, Default)]
pub struct DeclaredTopology {
    pub switches: Vec<SwitchId>,
    pub hosts: Vec<DeclaredHost>,
    /// (src, src_port, dst, dst_port)，每个方向一条
    pub links: Vec<(SwitchId, PortNo, SwitchId, PortNo)>,
    pub weights: Vec<LinkWeight>,
}

impl DeclaredTopology {
    /// 会话建立 -> 交换机加入 -> 链路发现 -> 主机发现
    pub fn events(&self) -> Vec<ControlEvent> {
        let mut out = Vec::new();
        for &switch in &self.switches {
            for state in [
                ChannelState::Connecting,
                ChannelState::Configured,
                ChannelState::Active,
            ] {
                out.push(ControlEvent::ChannelState { switch, state });
            }
            out.push(ControlEvent::SwitchJoined {
                switch,
                ports: Vec::new(),
            });
        }
        for &(src, src_port, dst, dst_port) in &self.links {
            out.push(ControlEvent::LinkDiscovered {
                src,
                src_port,
                dst,
                dst_port,
            });
        }
        for h in &self.hosts {
            out.push(ControlEvent::HostDiscovered {
                mac: h.mac,
                ip: Some(h.ip),
                switch: h.switch,
                port: h.port,
            });
        }
        out
    }

    /// 把静态权重与主机名写入配置
    pub fn apply_to(&self, cfg: &mut ControllerConfig) {
        cfg.link_weights.extend(self.weights.iter().cloned());
        for h in &self.hosts {
            cfg.probe.host_names.insert(h.mac, h.name.clone());
        }
    }
}

#[derive(Debug, Default)]
pub struct TopoBuilder {
    next_port: BTreeMap<SwitchId, PortNo>,
    topo: DeclaredTopology,
}

impl TopoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_switch(&mut self, n: u64) -> SwitchId {
        let id = SwitchId(n);
        if !self.topo.switches.contains(&id) {
            self.topo.switches.push(id);
            self.next_port.insert(id, 1);
        }
        id
    }

    fn alloc_port(&mut self, switch: SwitchId) -> PortNo {
        let p = self.next_port.entry(switch).or_insert(1);
        let port = *p;
        *p += 1;
        port
    }

    /// 添加主机 `h<n>`：地址 `00:00:00:00:00:<n>`，IP `10.0.0.<n>`
    pub fn add_host(&mut self, n: u8, switch: SwitchId) -> MacAddr {
        let mac = MacAddr::from_index(n);
        let port = self.alloc_port(switch);
        self.topo.hosts.push(DeclaredHost {
            name: format!("h{n}"),
            mac,
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)),
            switch,
            port,
        });
        mac
    }

    /// 添加双向链路；`cost` 为 Some 时两个方向都写入静态权重
    pub fn add_link(&mut self, a: SwitchId, b: SwitchId, cost: Option<f64>) {
        let pa = self.alloc_port(a);
        let pb = self.alloc_port(b);
        self.topo.links.push((a, pa, b, pb));
        self.topo.links.push((b, pb, a, pa));
        if let Some(cost) = cost {
            self.topo.weights.push(LinkWeight { src: a, dst: b, cost });
            self.topo.weights.push(LinkWeight { src: b, dst: a, cost });
        }
    }

    pub fn build(self) -> DeclaredTopology {
        self.topo
    }
}
