//! 测试床拓扑声明
//!
//! 以发现事件流的形式给出几种固定拓扑，用于回放与测试。

pub mod builder;
pub mod bw_mesh;
pub mod six_switch;

pub use builder::{DeclaredHost, DeclaredTopology, TopoBuilder};
