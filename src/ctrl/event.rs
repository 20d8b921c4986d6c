//! 入站事件
//!
//! 由控制通道 / 拓扑发现协作方交给控制器的事件。

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::error::CtrlError;
use super::session::ChannelState;
use crate::net::{MacAddr, PortNo, SwitchId};

/// LLDP：拓扑发现协议使用的控制帧，不属于用户数据
pub const ETH_TYPE_LLDP: u16 = 0x88cc;
pub const ETH_TYPE_VLAN: u16 = 0x8100;
/// OpenFlow 中表示“未缓存”的 buffer id
pub const NO_BUFFER: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    SwitchJoined {
        switch: SwitchId,
        #[serde(default)]
        ports: Vec<PortNo>,
    },
    SwitchLeft {
        switch: SwitchId,
    },
    /// 控制通道会话状态变化
    ChannelState {
        switch: SwitchId,
        state: ChannelState,
    },
    LinkDiscovered {
        src: SwitchId,
        src_port: PortNo,
        dst: SwitchId,
        dst_port: PortNo,
    },
    HostDiscovered {
        mac: MacAddr,
        #[serde(default)]
        ip: Option<IpAddr>,
        switch: SwitchId,
        port: PortNo,
    },
    FrameArrived(FrameArrival),
}

/// 一个上送控制器的数据帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameArrival {
    pub switch: SwitchId,
    pub in_port: PortNo,
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ether_type: u16,
    #[serde(default)]
    pub buffer_id: Option<u32>,
    #[serde(default)]
    pub payload: Option<Vec<u8>>,
}

impl FrameArrival {
    /// 从原始以太网帧解析地址与类型（跳过单层 802.1Q 标签）。
    ///
    /// `buffer_id` 为 `NO_BUFFER` 时视为未缓存，此时保留原始帧作为 payload。
    pub fn from_ethernet(
        switch: SwitchId,
        in_port: PortNo,
        buffer_id: u32,
        data: &[u8],
    ) -> Result<Self, CtrlError> {
        if data.len() < 14 {
            return Err(CtrlError::MalformedFrame(format!(
                "frame too short: {} bytes",
                data.len()
            )));
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&data[0..6]);
        src.copy_from_slice(&data[6..12]);

        let mut ether_type = u16::from_be_bytes([data[12], data[13]]);
        if ether_type == ETH_TYPE_VLAN {
            if data.len() < 18 {
                return Err(CtrlError::MalformedFrame("truncated 802.1Q header".into()));
            }
            ether_type = u16::from_be_bytes([data[16], data[17]]);
        }

        let buffered = buffer_id != NO_BUFFER;
        Ok(Self {
            switch,
            in_port,
            src: MacAddr(src),
            dst: MacAddr(dst),
            ether_type,
            buffer_id: buffered.then_some(buffer_id),
            payload: (!buffered).then(|| data.to_vec()),
        })
    }

    pub fn is_discovery(&self) -> bool {
        self.ether_type == ETH_TYPE_LLDP
    }
}

impl ControlEvent {
    /// 事件涉及的交换机
    pub fn switches(&self) -> Vec<SwitchId> {
        match self {
            ControlEvent::SwitchJoined { switch, .. }
            | ControlEvent::SwitchLeft { switch }
            | ControlEvent::ChannelState { switch, .. }
            | ControlEvent::HostDiscovered { switch, .. } => vec![*switch],
            ControlEvent::LinkDiscovered { src, dst, .. } => vec![*src, *dst],
            ControlEvent::FrameArrived(f) => vec![f.switch],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlEvent::SwitchJoined { .. } => "switch_joined",
            ControlEvent::SwitchLeft { .. } => "switch_left",
            ControlEvent::ChannelState { .. } => "channel_state",
            ControlEvent::LinkDiscovered { .. } => "link_discovered",
            ControlEvent::HostDiscovered { .. } => "host_discovered",
            ControlEvent::FrameArrived(_) => "frame_arrived",
        }
    }
}
