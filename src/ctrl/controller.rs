//! 转发决策
//!
//! 控制器独占拓扑存储与地址学习表，按到达顺序逐个处理事件并产出转发指令。
//! 带宽测量只通过消息交回的结果修改链路代价，测量本身不在这里执行。

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use super::error::CtrlError;
use super::event::{ControlEvent, FrameArrival};
use super::instruction::{Action, FlowMatch, Instruction};
use super::session::{ChannelState, SessionTable};
use crate::config::{ConfigError, ControllerConfig};
use crate::net::{
    HostChange, LearningTable, LinkChange, MacAddr, PathResult, PortNo, RouteError, SwitchId,
    Topology, shortest_path, validate_port,
};
use crate::probe::{CancelToken, MeasureRequest, ProbeMessage, QuietPeriodTrigger, SweepId, SweepJob};

/// 进行中的一轮测量
#[derive(Debug, Clone)]
struct ActiveSweep {
    id: SweepId,
    cancel: CancelToken,
    hosts: BTreeSet<MacAddr>,
}

/// 事件处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CtrlStats {
    pub events: u64,
    pub dropped: u64,
    pub floods: u64,
    pub flow_installs: u64,
    pub sweeps_started: u64,
    pub sweeps_cancelled: u64,
    pub probe_failures: u64,
    /// 学习到的出端口与最短路首跳不一致的次数
    pub route_divergences: u64,
}

pub struct Controller {
    cfg: ControllerConfig,
    topo: Topology,
    learning: LearningTable,
    sessions: SessionTable,
    trigger: QuietPeriodTrigger,
    next_sweep: u64,
    active_sweep: Option<ActiveSweep>,
    /// (client, server) -> 最近一次测得的 Mbps
    pair_bandwidth: BTreeMap<(MacAddr, MacAddr), f64>,
    pub stats: CtrlStats,
}

impl Controller {
    /// 校验配置并构造控制器；负权等配置错误在此处致命返回。
    pub fn new(cfg: ControllerConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let topo = cfg.build_topology()?;
        let learning = cfg.build_learning_table();
        let trigger = QuietPeriodTrigger::new(cfg.probe.quiet_period(), cfg.probe.reprobe_interval());
        Ok(Self {
            cfg,
            topo,
            learning,
            sessions: SessionTable::default(),
            trigger,
            next_sweep: 1,
            active_sweep: None,
            pair_bandwidth: BTreeMap::new(),
            stats: CtrlStats::default(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.cfg
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn learning(&self) -> &LearningTable {
        &self.learning
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn pair_bandwidth(&self) -> &BTreeMap<(MacAddr, MacAddr), f64> {
        &self.pair_bandwidth
    }

    /// 处理一个事件；错误只记录日志，返回空指令列表。
    pub fn handle(&mut self, now: Instant, event: ControlEvent) -> Vec<Instruction> {
        let kind = event.kind();
        match self.try_handle(now, event) {
            Ok(out) => out,
            Err(e) => {
                self.stats.dropped += 1;
                match e {
                    CtrlError::InactiveSession { .. } => debug!(event = kind, error = %e, "丢弃事件"),
                    _ => warn!(event = kind, error = %e, "丢弃事件"),
                }
                Vec::new()
            }
        }
    }

    /// 处理一个事件并返回产生的指令或错误原因
    #[tracing::instrument(skip(self, now, event), fields(event = event.kind()))]
    pub fn try_handle(&mut self, now: Instant, event: ControlEvent) -> Result<Vec<Instruction>, CtrlError> {
        self.stats.events += 1;
        self.housekeeping(now);

        match event {
            ControlEvent::SwitchJoined { switch, ports } => {
                self.reject_disconnected(switch)?;
                if self.topo.upsert_switch(switch, &ports)? {
                    self.trigger.note_change(now);
                }
                Ok(Vec::new())
            }
            ControlEvent::SwitchLeft { switch } => {
                self.drop_switch(now, switch);
                Ok(Vec::new())
            }
            ControlEvent::ChannelState { switch, state } => {
                let switch = switch.validate()?;
                Ok(self.on_channel_state(now, switch, state))
            }
            ControlEvent::LinkDiscovered {
                src,
                src_port,
                dst,
                dst_port,
            } => {
                self.reject_disconnected(src)?;
                self.reject_disconnected(dst)?;
                match self.topo.upsert_link(src, src_port, dst, dst_port, None)? {
                    LinkChange::Added | LinkChange::Rewired => self.trigger.note_change(now),
                    LinkChange::Unchanged => {}
                }
                Ok(Vec::new())
            }
            ControlEvent::HostDiscovered {
                mac,
                ip,
                switch,
                port,
            } => {
                self.reject_disconnected(switch)?;
                let change = self.topo.upsert_host(mac, switch, port, ip)?;
                self.on_host_change(now, mac, change);
                Ok(Vec::new())
            }
            ControlEvent::FrameArrived(frame) => self.on_frame(now, frame),
        }
    }

    /// 过期清理：学习表项与长时间未出现的主机
    pub fn housekeeping(&mut self, now: Instant) {
        self.learning.expire(now);
        if let Some(ttl) = self.cfg.host_ttl() {
            let expired = self.topo.expire_hosts(now, ttl);
            if !expired.is_empty() {
                info!(hosts = expired.len(), "主机过期移除");
                self.trigger.note_change(now);
                self.cancel_sweep_involving(&expired);
            }
        }
    }

    fn reject_disconnected(&mut self, switch: SwitchId) -> Result<(), CtrlError> {
        if self.sessions.is_disconnected(switch) {
            if self.topo.contains_switch(switch) {
                self.topo.remove_switch(switch);
                self.learning.forget_switch(switch);
            }
            return Err(CtrlError::InactiveSession {
                switch,
                state: Some(ChannelState::Disconnected),
            });
        }
        Ok(())
    }

    fn on_channel_state(&mut self, now: Instant, switch: SwitchId, state: ChannelState) -> Vec<Instruction> {
        let Ok(from) = self.sessions.transition(switch, state) else {
            return Vec::new();
        };
        if from == Some(state) {
            return Vec::new();
        }
        match state {
            ChannelState::Configured => {
                // table-miss：未命中任何流表项的报文上送控制器
                info!(%switch, "⚙️  交换机完成配置，安装 table-miss 流表");
                vec![Instruction::InstallFlowRule {
                    switch,
                    matcher: FlowMatch::all(),
                    actions: vec![Action::Controller],
                    priority: self.cfg.table_miss_priority,
                    buffer_id: None,
                }]
            }
            ChannelState::Active => {
                info!(%switch, "会话进入 Active");
                Vec::new()
            }
            ChannelState::Disconnected => {
                self.drop_switch(now, switch);
                Vec::new()
            }
            ChannelState::Connecting => Vec::new(),
        }
    }

    fn drop_switch(&mut self, now: Instant, switch: SwitchId) {
        let forgotten = self.learning.forget_switch(switch);
        if let Some(removed) = self.topo.remove_switch(switch) {
            debug!(%switch, links = removed.links, hosts = removed.hosts.len(), forgotten, "移除交换机");
            self.trigger.note_change(now);
            self.cancel_sweep_involving(&removed.hosts);
        }
    }

    fn on_host_change(&mut self, now: Instant, mac: MacAddr, change: HostChange) {
        match change {
            HostChange::New => self.trigger.note_change(now),
            HostChange::Moved { .. } => {
                self.trigger.note_change(now);
                self.cancel_sweep_involving(&[mac]);
            }
            HostChange::Refreshed => {}
        }
    }

    #[tracing::instrument(skip(self, now, frame), fields(switch = %frame.switch, in_port = frame.in_port, src = %frame.src, dst = %frame.dst))]
    fn on_frame(&mut self, now: Instant, frame: FrameArrival) -> Result<Vec<Instruction>, CtrlError> {
        let switch = frame
            .switch
            .validate()
            .map_err(|_| CtrlError::MalformedFrame(format!("switch id {}", frame.switch.0)))?;
        validate_port(switch, frame.in_port)
            .map_err(|_| CtrlError::MalformedFrame(format!("ingress port {}", frame.in_port)))?;
        frame
            .src
            .validate_unicast()
            .map_err(|_| CtrlError::MalformedFrame(format!("source address {}", frame.src)))?;

        match self.sessions.get(switch) {
            Some(ChannelState::Active) => {}
            None if !self.topo.contains_switch(switch) => return Err(CtrlError::UnknownSwitch(switch)),
            state => {
                if state == Some(ChannelState::Disconnected) {
                    self.reject_disconnected(switch)?;
                }
                return Err(CtrlError::InactiveSession { switch, state });
            }
        }

        if frame.is_discovery() {
            trace!("忽略拓扑发现帧");
            return Ok(Vec::new());
        }

        // 学习源地址
        self.learning
            .record_ingress(switch, frame.src, frame.in_port, now);

        // 边缘端口上出现的源地址就是主机位置
        if !self.topo.is_link_port(switch, frame.in_port) {
            let change = self.topo.upsert_host(frame.src, switch, frame.in_port, None)?;
            self.topo.touch_host(frame.src, now);
            self.on_host_change(now, frame.src, change);
        }

        let Some(out_port) = self.learning.lookup_at(switch, frame.dst, now) else {
            debug!("目的地址未学习，泛洪");
            self.stats.floods += 1;
            let payload = if frame.buffer_id.is_none() { frame.payload } else { None };
            return Ok(vec![Instruction::EmitPacket {
                switch,
                buffer_id: frame.buffer_id,
                in_port: frame.in_port,
                actions: vec![Action::Flood],
                payload,
            }]);
        };

        let mut out = Vec::new();
        if self.cfg.install_paths {
            if let Some(route) = self.route_to_host(switch, frame.dst) {
                let first_hop = route
                    .hop_pairs()
                    .next()
                    .and_then(|(a, b)| self.topo.link(a, b))
                    .map(|l| l.src_port);
                if first_hop != Some(out_port) {
                    self.stats.route_divergences += 1;
                    debug!(out_port, ?first_hop, hops = ?route.hops, "学习端口与最短路首跳不一致，下游流表不会被命中");
                }
                out.extend(self.path_rules(&route, frame.dst));
            }
        }

        debug!(out_port, "目的地址已学习，安装单播流表");
        let actions = vec![Action::Output { port: out_port }];
        out.push(Instruction::InstallFlowRule {
            switch,
            matcher: FlowMatch::in_port_dst(frame.in_port, frame.dst),
            actions: actions.clone(),
            priority: self.cfg.flow_priority,
            buffer_id: frame.buffer_id,
        });
        self.stats.flow_installs += 1;

        // 带 buffer id 的流表安装会直接释放缓存的报文
        if frame.buffer_id.is_none() {
            out.push(Instruction::EmitPacket {
                switch,
                buffer_id: None,
                in_port: frame.in_port,
                actions,
                payload: frame.payload,
            });
        }
        Ok(out)
    }

    /// 从 `from` 到目的主机所在交换机的最短路；主机未知、就在本交换机或不可达时返回 None。
    pub fn route_to_host(&self, from: SwitchId, dst: MacAddr) -> Option<PathResult> {
        let host = self.topo.host(dst)?;
        if host.switch == from {
            return None;
        }
        match self.route(from, host.switch) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(%from, to = %host.switch, error = %e, "无可用路径");
                None
            }
        }
    }

    /// 在当前拓扑快照上计算交换机间最短路
    pub fn route(&self, src: SwitchId, dst: SwitchId) -> Result<PathResult, RouteError> {
        shortest_path(&self.topo.snapshot(), src, dst)
    }

    /// 沿路径在下游交换机上生成流表：匹配 (上一跳链路的入端口, 目的地址)，输出到下一跳链路或主机端口。
    fn path_rules(&self, route: &PathResult, dst: MacAddr) -> Vec<Instruction> {
        let Some(host) = self.topo.host(dst) else {
            return Vec::new();
        };
        let mut rules = Vec::new();
        let pairs: Vec<(SwitchId, SwitchId)> = route.hop_pairs().collect();
        for (i, &(prev, cur)) in pairs.iter().enumerate() {
            let Some(incoming) = self.topo.link(prev, cur) else {
                warn!(%prev, %cur, "路径引用了不存在的链路，放弃预装");
                return Vec::new();
            };
            let out_port: PortNo = match pairs.get(i + 1) {
                Some(&(_, next)) => match self.topo.link(cur, next) {
                    Some(l) => l.src_port,
                    None => {
                        warn!(%cur, %next, "路径引用了不存在的链路，放弃预装");
                        return Vec::new();
                    }
                },
                None => host.port,
            };
            rules.push(Instruction::InstallFlowRule {
                switch: cur,
                matcher: FlowMatch::in_port_dst(incoming.dst_port, dst),
                actions: vec![Action::Output { port: out_port }],
                priority: self.cfg.path_priority,
                buffer_id: None,
            });
        }
        debug!(hops = ?route.hops, rules = rules.len(), "沿最短路预装流表");
        rules
    }

    /// 若满足触发条件，规划新一轮测量。同一时刻最多一轮测量。
    pub fn poll_probe(&mut self, now: Instant) -> Option<SweepJob> {
        if !self.cfg.probe.enabled || self.active_sweep.is_some() {
            return None;
        }
        if !self.trigger.should_fire(now) {
            return None;
        }
        self.trigger.mark_fired(now);

        let requests = self.plan_sweep();
        if requests.is_empty() {
            debug!("可测量的主机对不足，跳过本轮");
            return None;
        }

        let id = SweepId(self.next_sweep);
        self.next_sweep += 1;
        let cancel = CancelToken::new();
        let hosts = requests
            .iter()
            .flat_map(|r| [r.client, r.server])
            .collect();
        self.active_sweep = Some(ActiveSweep {
            id,
            cancel: cancel.clone(),
            hosts,
        });
        self.stats.sweeps_started += 1;
        info!(sweep = id.0, pairs = requests.len(), "📶 规划带宽测量");
        Some(SweepJob {
            id,
            requests,
            cancel,
        })
    }

    /// 所有有序主机对（不含自身）；没有网络地址的主机不能作为服务端。
    pub fn plan_sweep(&self) -> Vec<MeasureRequest> {
        let mut requests = Vec::new();
        for server in self.topo.hosts() {
            let Some(server_ip) = server.ip else {
                debug!(host = %server.mac, "主机没有网络地址，不能作为测量服务端");
                continue;
            };
            for client in self.topo.hosts() {
                if client.mac == server.mac {
                    continue;
                }
                requests.push(MeasureRequest {
                    server: server.mac,
                    server_ip,
                    client: client.mac,
                    client_ip: client.ip,
                });
            }
        }
        requests
    }

    /// 应用测量线程交回的结果
    pub fn apply_probe(&mut self, now: Instant, msg: ProbeMessage) {
        match msg {
            ProbeMessage::Measured {
                sweep,
                request,
                result,
            } => {
                if !self.is_current_sweep(sweep) {
                    debug!(sweep = sweep.0, "丢弃已失效轮次的测量结果");
                    return;
                }
                match result {
                    Ok(mbps) => self.record_measurement(&request, mbps),
                    Err(e) => {
                        self.stats.probe_failures += 1;
                        warn!(client = %request.client, server = %request.server, error = %e, "测量失败，保留原代价");
                    }
                }
            }
            ProbeMessage::Finished {
                sweep,
                cancelled,
                succeeded,
                failed,
            } => {
                if !self.is_current_sweep(sweep) {
                    return;
                }
                self.active_sweep = None;
                info!(sweep = sweep.0, cancelled, succeeded, failed, "带宽测量轮次结束");
                info!("\n{}", self.topo.report());
                // 轮次期间如有拓扑变化，静默期从结束时重新计算
                if self.trigger.is_pending() {
                    self.trigger.note_change(now);
                }
            }
        }
    }

    fn is_current_sweep(&self, sweep: SweepId) -> bool {
        self.active_sweep.as_ref().is_some_and(|s| s.id == sweep)
    }

    fn record_measurement(&mut self, req: &MeasureRequest, mbps: f64) {
        self.pair_bandwidth.insert((req.client, req.server), mbps);

        let (Some(client), Some(server)) = (self.topo.host(req.client), self.topo.host(req.server))
        else {
            debug!(client = %req.client, server = %req.server, "主机已不在拓扑中，只记录主机对带宽");
            return;
        };
        let (src, dst) = (client.switch, server.switch);
        if src == dst {
            return;
        }
        let reference = self.cfg.probe.reference_mbps;
        match self.topo.set_link_bandwidth(src, dst, mbps, reference) {
            Some(old) => debug!(%src, %dst, mbps, old_cost = old, "链路代价已更新"),
            None => trace!(%src, %dst, "主机所在交换机不相邻，只记录主机对带宽"),
        }
    }

    /// 取消涉及给定主机的进行中测量
    fn cancel_sweep_involving(&mut self, hosts: &[MacAddr]) {
        let hit = self
            .active_sweep
            .as_ref()
            .is_some_and(|s| hosts.iter().any(|h| s.hosts.contains(h)));
        if !hit {
            return;
        }
        if let Some(sweep) = self.active_sweep.take() {
            sweep.cancel.cancel();
            self.stats.sweeps_cancelled += 1;
            info!(sweep = sweep.id.0, "拓扑变化使测量失效，取消本轮");
        }
    }

    /// 是否有进行中的测量
    pub fn sweep_in_flight(&self) -> bool {
        self.active_sweep.is_some()
    }

    /// 取消进行中的测量（关闭时使用）
    pub fn cancel_sweep(&mut self) {
        if let Some(sweep) = self.active_sweep.take() {
            sweep.cancel.cancel();
        }
    }
}
