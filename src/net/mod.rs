//! 网络状态模块
//!
//! 此模块包含控制器持有的网络状态：拓扑存储、地址学习表，以及基于拓扑快照的最短路引擎。

// 子模块声明
mod error;
mod id;
mod learning;
mod link;
mod node;
mod routing;
mod snapshot;
mod topology;

// 重新导出公共接口
pub use error::{RouteError, TopologyError, validate_default_cost, validate_link_weight};
pub use id::{MacAddr, ParseMacError, PORT_MAX, PortNo, SwitchId, validate_port};
pub use learning::{LearningEntry, LearningTable};
pub use link::Link;
pub use node::{Host, SwitchNode};
pub use routing::{PathResult, shortest_path};
pub use snapshot::TopologySnapshot;
pub use topology::{HostChange, LinkChange, SwitchRemoval, Topology};
