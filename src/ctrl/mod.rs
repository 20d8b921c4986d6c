//! 控制器模块
//!
//! 入站事件、出站指令、会话状态，以及独占网络状态的转发决策与事件循环。

mod controller;
mod dispatch;
mod error;
mod event;
mod instruction;
mod session;

pub use controller::{Controller, CtrlStats};
pub use dispatch::{
    DispatchOutcome, DispatchStats, Dispatcher, Inbox, InstructionSink, JsonLinesSink,
};
pub use error::CtrlError;
pub use event::{ControlEvent, ETH_TYPE_LLDP, ETH_TYPE_VLAN, FrameArrival, NO_BUFFER};
pub use instruction::{Action, FlowMatch, Instruction};
pub use session::{ChannelState, SessionTable};
