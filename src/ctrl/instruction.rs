//! 出站指令
//!
//! 控制器交给控制通道协作方的转发指令：安装流表项，或下发一个报文。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::{MacAddr, PortNo, SwitchId};

/// 匹配条件；None 字段为通配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<MacAddr>,
}

impl FlowMatch {
    /// 全通配（table-miss）
    pub fn all() -> Self {
        Self::default()
    }

    /// 按 (入端口, 目的地址) 精确匹配，不会遮蔽其它地址的泛洪/学习
    pub fn in_port_dst(in_port: PortNo, eth_dst: MacAddr) -> Self {
        Self {
            in_port: Some(in_port),
            eth_dst: Some(eth_dst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Output { port: PortNo },
    /// 从除入端口外的所有端口发出
    Flood,
    /// 上送控制器（不缓存）
    Controller,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    InstallFlowRule {
        switch: SwitchId,
        #[serde(rename = "match")]
        matcher: FlowMatch,
        actions: Vec<Action>,
        priority: u16,
        #[serde(default)]
        buffer_id: Option<u32>,
    },
    EmitPacket {
        switch: SwitchId,
        #[serde(default)]
        buffer_id: Option<u32>,
        in_port: PortNo,
        actions: Vec<Action>,
        #[serde(default)]
        payload: Option<Vec<u8>>,
    },
}

impl Instruction {
    pub fn switch(&self) -> SwitchId {
        match self {
            Instruction::InstallFlowRule { switch, .. } | Instruction::EmitPacket { switch, .. } => {
                *switch
            }
        }
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            Instruction::InstallFlowRule { actions, .. } | Instruction::EmitPacket { actions, .. } => {
                actions
            }
        }
    }

    pub fn is_flood(&self) -> bool {
        self.actions().contains(&Action::Flood)
    }

    pub fn is_flow_rule(&self) -> bool {
        matches!(self, Instruction::InstallFlowRule { .. })
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.in_port, self.eth_dst) {
            (None, None) => write!(f, "*"),
            (Some(p), None) => write!(f, "in_port={p}"),
            (None, Some(d)) => write!(f, "eth_dst={d}"),
            (Some(p), Some(d)) => write!(f, "in_port={p},eth_dst={d}"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output { port } => write!(f, "output:{port}"),
            Action::Flood => write!(f, "flood"),
            Action::Controller => write!(f, "controller"),
        }
    }
}

fn fmt_actions(actions: &[Action]) -> String {
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn fmt_buffer(b: Option<u32>) -> String {
    b.map(|b| b.to_string()).unwrap_or_else(|| "-".into())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::InstallFlowRule {
                switch,
                matcher,
                actions,
                priority,
                buffer_id,
            } => write!(
                f,
                "install_flow switch={} match={} actions={} priority={} buffer={}",
                switch.0,
                matcher,
                fmt_actions(actions),
                priority,
                fmt_buffer(*buffer_id)
            ),
            Instruction::EmitPacket {
                switch,
                buffer_id,
                in_port,
                actions,
                payload,
            } => write!(
                f,
                "packet_out switch={} in_port={} actions={} buffer={} payload_bytes={}",
                switch.0,
                in_port,
                fmt_actions(actions),
                fmt_buffer(*buffer_id),
                payload.as_ref().map_or(0, Vec::len)
            ),
        }
    }
}
