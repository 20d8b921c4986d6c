//! 单事件处理错误。只在事件循环内部记录并丢弃，不会中止事件循环。

use super::session::ChannelState;
use crate::net::{SwitchId, TopologyError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CtrlError {
    #[error("validation failed: {0}")]
    Validation(#[from] TopologyError),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("unknown switch {0}")]
    UnknownSwitch(SwitchId),
    #[error("session for {switch} is {state:?}, event dropped")]
    InactiveSession {
        switch: SwitchId,
        state: Option<ChannelState>,
    },
}
