//! 拓扑存储
//!
//! 维护交换机、链路与主机构成的当前网络图。所有操作都是按标识覆盖写入的幂等操作，
//! 除了非法标识符之外不会失败，也没有内存状态之外的副作用。

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::error::{TopologyError, validate_link_weight};
use super::id::{MacAddr, PortNo, SwitchId, validate_port};
use super::link::Link;
use super::node::{Host, SwitchNode};
use super::snapshot::TopologySnapshot;

/// `upsert_link` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Added,
    /// 已存在，端口发生变化
    Rewired,
    Unchanged,
}

/// `upsert_host` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostChange {
    New,
    Moved { from: (SwitchId, PortNo) },
    /// 位置未变（IP 可能被更新）
    Refreshed,
}

/// 移除交换机时连带移除的内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchRemoval {
    pub links: usize,
    pub hosts: Vec<MacAddr>,
}

/// 网络拓扑
#[derive(Debug, Clone)]
pub struct Topology {
    switches: BTreeMap<SwitchId, SwitchNode>,
    links: BTreeMap<(SwitchId, SwitchId), Link>,
    hosts: BTreeMap<MacAddr, Host>,
    /// 静态配置的链路权重，优先于默认代价
    weights: HashMap<(SwitchId, SwitchId), f64>,
    default_cost: f64,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Topology {
    /// `default_cost` 由配置层保证非负。
    pub fn new(default_cost: f64) -> Self {
        Self {
            switches: BTreeMap::new(),
            links: BTreeMap::new(),
            hosts: BTreeMap::new(),
            weights: HashMap::new(),
            default_cost,
        }
    }

    /// 设置某个方向的静态权重；已存在的链路立即生效。
    pub fn set_configured_weight(
        &mut self,
        src: SwitchId,
        dst: SwitchId,
        cost: f64,
    ) -> Result<(), TopologyError> {
        let cost = validate_link_weight(src, dst, cost)?;
        self.weights.insert((src, dst), cost);
        if let Some(link) = self.links.get_mut(&(src, dst)) {
            link.cost = cost;
        }
        Ok(())
    }

    /// 添加交换机；已存在时合并端口集合。返回是否为新节点。
    pub fn upsert_switch(&mut self, id: SwitchId, ports: &[PortNo]) -> Result<bool, TopologyError> {
        let id = id.validate()?;
        for &p in ports {
            validate_port(id, p)?;
        }
        let created = !self.switches.contains_key(&id);
        let node = self.switches.entry(id).or_insert_with(|| SwitchNode::new(id));
        node.ports.extend(ports.iter().copied());
        if created {
            info!(switch = %id, ports = ports.len(), "🔌 交换机加入拓扑");
        } else {
            trace!(switch = %id, "交换机已存在，合并端口");
        }
        Ok(created)
    }

    /// 移除交换机及所有相关链路和位于其上的主机
    pub fn remove_switch(&mut self, id: SwitchId) -> Option<SwitchRemoval> {
        self.switches.remove(&id)?;

        let before = self.links.len();
        self.links.retain(|&(s, d), _| s != id && d != id);
        let links = before - self.links.len();

        let hosts: Vec<MacAddr> = self
            .hosts
            .values()
            .filter(|h| h.switch == id)
            .map(|h| h.mac)
            .collect();
        for mac in &hosts {
            self.hosts.remove(mac);
        }

        info!(switch = %id, links, hosts = hosts.len(), "交换机离开拓扑");
        Some(SwitchRemoval { links, hosts })
    }

    /// 添加或覆盖一条单向链路。
    ///
    /// `cost` 为 None 时：已存在的链路保留原代价（可能来自测量），新链路使用静态权重或默认代价。
    /// 端点交换机缺失时自动补齐并告警。
    pub fn upsert_link(
        &mut self,
        src: SwitchId,
        src_port: PortNo,
        dst: SwitchId,
        dst_port: PortNo,
        cost: Option<f64>,
    ) -> Result<LinkChange, TopologyError> {
        let src = src.validate()?;
        let dst = dst.validate()?;
        validate_port(src, src_port)?;
        validate_port(dst, dst_port)?;
        let cost = cost.map(|c| validate_link_weight(src, dst, c)).transpose()?;

        self.ensure_switch(src, src_port);
        self.ensure_switch(dst, dst_port);

        let change = match self.links.get_mut(&(src, dst)) {
            Some(link) => {
                let rewired = link.src_port != src_port || link.dst_port != dst_port;
                link.src_port = src_port;
                link.dst_port = dst_port;
                if let Some(c) = cost {
                    link.cost = c;
                }
                if rewired {
                    LinkChange::Rewired
                } else {
                    LinkChange::Unchanged
                }
            }
            None => {
                let c = cost
                    .or_else(|| self.weights.get(&(src, dst)).copied())
                    .unwrap_or(self.default_cost);
                self.links
                    .insert((src, dst), Link::new(src, src_port, dst, dst_port, c));
                LinkChange::Added
            }
        };

        debug!(%src, src_port, %dst, dst_port, ?change, "更新链路");
        Ok(change)
    }

    /// 记录主机位置，后到的观测覆盖先前位置。
    pub fn upsert_host(
        &mut self,
        mac: MacAddr,
        switch: SwitchId,
        port: PortNo,
        ip: Option<IpAddr>,
    ) -> Result<HostChange, TopologyError> {
        let mac = mac.validate_unicast()?;
        let switch = switch.validate()?;
        validate_port(switch, port)?;
        self.ensure_switch(switch, port);

        let change = match self.hosts.get_mut(&mac) {
            Some(host) => {
                let from = host.location();
                host.switch = switch;
                host.port = port;
                if ip.is_some() {
                    host.ip = ip;
                }
                if from != (switch, port) {
                    HostChange::Moved { from }
                } else {
                    HostChange::Refreshed
                }
            }
            None => {
                self.hosts.insert(mac, Host::new(mac, ip, switch, port));
                HostChange::New
            }
        };

        match change {
            HostChange::New => info!(%mac, %switch, port, ?ip, "🖥️  发现新主机"),
            HostChange::Moved { from } => {
                info!(%mac, from = ?from, %switch, port, "主机位置变化，覆盖旧位置")
            }
            HostChange::Refreshed => trace!(%mac, "主机位置未变"),
        }
        Ok(change)
    }

    /// 更新主机的最近观测时间
    pub fn touch_host(&mut self, mac: MacAddr, now: Instant) {
        if let Some(h) = self.hosts.get_mut(&mac) {
            h.last_seen = Some(now);
        }
    }

    /// 移除超过 `ttl` 未被观测到的主机。只有 `touch_host` 记录过的主机（即在数据帧中出现过）
    /// 参与过期；仅由发现事件或静态拓扑声明的主机不过期。
    pub fn expire_hosts(&mut self, now: Instant, ttl: Duration) -> Vec<MacAddr> {
        let stale: Vec<MacAddr> = self
            .hosts
            .values()
            .filter(|h| {
                h.last_seen
                    .is_some_and(|t| now.saturating_duration_since(t) >= ttl)
            })
            .map(|h| h.mac)
            .collect();
        for mac in &stale {
            self.hosts.remove(mac);
            debug!(%mac, "主机过期");
        }
        stale
    }

    /// 写入测得带宽并据此更新代价，返回旧代价。链路不存在时返回 None。
    pub fn set_link_bandwidth(
        &mut self,
        src: SwitchId,
        dst: SwitchId,
        mbps: f64,
        reference_mbps: f64,
    ) -> Option<f64> {
        let link = self.links.get_mut(&(src, dst))?;
        let old = link.cost;
        link.bandwidth_mbps = Some(mbps);
        link.cost = Link::cost_from_bandwidth(reference_mbps, mbps);
        debug!(%src, %dst, mbps, old_cost = old, new_cost = link.cost, "更新链路代价");
        Some(old)
    }

    /// 生成用于路径计算的只读快照
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot::from_edges(
            self.switches.keys().copied(),
            self.links.values().map(|l| (l.src, l.dst, l.cost)),
        )
    }

    pub fn contains_switch(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    pub fn switch(&self, id: SwitchId) -> Option<&SwitchNode> {
        self.switches.get(&id)
    }

    pub fn switches(&self) -> impl Iterator<Item = &SwitchNode> {
        self.switches.values()
    }

    pub fn link(&self, src: SwitchId, dst: SwitchId) -> Option<&Link> {
        self.links.get(&(src, dst))
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn host(&self, mac: MacAddr) -> Option<&Host> {
        self.hosts.get(&mac)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// 端口是否为交换机间链路的端点（这类端口上看到的源地址不代表主机位置）
    pub fn is_link_port(&self, switch: SwitchId, port: PortNo) -> bool {
        self.links.values().any(|l| {
            (l.src == switch && l.src_port == port) || (l.dst == switch && l.dst_port == port)
        })
    }

    /// 当前主机、交换机、链路的文本摘要
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Current Hosts:");
        for h in self.hosts.values() {
            let ip = h.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".into());
            let _ = writeln!(out, "\t{} ip={} at {}:{}", h.mac, ip, h.switch, h.port);
        }
        let _ = writeln!(out, "Current Switches:");
        for s in self.switches.values() {
            let _ = writeln!(out, "\t{} ports={:?}", s.id, s.ports);
        }
        let _ = writeln!(out, "Current Links:");
        for l in self.links.values() {
            let bw = l
                .bandwidth_mbps
                .map(|b| format!("{b:.2}Mbps"))
                .unwrap_or_else(|| "-".into());
            let _ = writeln!(
                out,
                "\t{}:{} -> {}:{} cost={} bw={}",
                l.src, l.src_port, l.dst, l.dst_port, l.cost, bw
            );
        }
        out
    }

    fn ensure_switch(&mut self, id: SwitchId, port: PortNo) {
        let node = self.switches.entry(id).or_insert_with(|| {
            warn!(switch = %id, "拓扑不一致：引用了未知交换机，自动补齐节点");
            SwitchNode::new(id)
        });
        node.ports.insert(port);
    }
}
