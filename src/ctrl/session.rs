//! 控制通道会话状态
//!
//! 每台交换机一个会话：`Connecting -> Configured -> Active -> Disconnected`。
//! 握手与保活由控制通道协作方负责，这里只消费它给出的状态变化。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::net::SwitchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Connecting,
    Configured,
    Active,
    Disconnected,
}

impl ChannelState {
    /// 允许的状态迁移。任何状态都可以断开；断开后可重新连接；重复上报同一状态视为幂等。
    pub fn can_transition(from: Option<ChannelState>, to: ChannelState) -> bool {
        use ChannelState::*;
        match (from, to) {
            (Some(a), b) if a == b => true,
            (_, Disconnected) => true,
            (None | Some(Disconnected), Connecting) => true,
            (None | Some(Connecting), Configured) => true,
            (Some(Configured), Active) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    states: HashMap<SwitchId, ChannelState>,
}

impl SessionTable {
    pub fn get(&self, switch: SwitchId) -> Option<ChannelState> {
        self.states.get(&switch).copied()
    }

    pub fn is_active(&self, switch: SwitchId) -> bool {
        self.get(switch) == Some(ChannelState::Active)
    }

    pub fn is_disconnected(&self, switch: SwitchId) -> bool {
        self.get(switch) == Some(ChannelState::Disconnected)
    }

    /// 应用状态迁移，返回迁移前的状态；非法迁移返回 Err 并保持原状态。
    pub fn transition(
        &mut self,
        switch: SwitchId,
        to: ChannelState,
    ) -> Result<Option<ChannelState>, Option<ChannelState>> {
        let from = self.get(switch);
        if !ChannelState::can_transition(from, to) {
            warn!(%switch, ?from, ?to, "非法的会话状态迁移，忽略");
            return Err(from);
        }
        self.states.insert(switch, to);
        debug!(%switch, ?from, ?to, "会话状态迁移");
        Ok(from)
    }
}
