//! 带宽测量模块
//!
//! 对已发现主机的每个有序主机对调用外部吞吐测量工具，测得的结果交回事件循环更新链路代价。

mod error;
mod tool;
mod trigger;
mod worker;

pub use error::ProbeError;
pub use tool::{CommandTool, MeasureRequest, ThroughputTool, parse_throughput};
pub use trigger::QuietPeriodTrigger;
pub use worker::{CancelToken, ProbeMessage, ProberHandle, SweepId, SweepJob, run_sweep};
