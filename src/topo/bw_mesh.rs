//! 带宽受限的六交换机拓扑
//!
//! 链路按静态带宽声明，代价按 `reference_mbps / 带宽` 换算，与测量结果使用同一约定。

use super::builder::{DeclaredTopology, TopoBuilder};
use crate::net::SwitchId;

#[derive(Debug, Clone)]
pub struct BwMeshOpts {
    pub reference_mbps: f64,
}

impl Default for BwMeshOpts {
    fn default() -> Self {
        Self {
            reference_mbps: 1000.0,
        }
    }
}

/// (a, b, Mbps)
pub const BW_MESH_LINKS: [(u64, u64, f64); 5] = [
    (1, 2, 10.0),
    (1, 3, 10.0),
    (1, 5, 5.0),
    (3, 4, 5.0),
    (5, 6, 5.0),
];

/// 每台交换机 s<n> 接一台主机 h<n>
pub fn build_bw_mesh(opts: &BwMeshOpts) -> DeclaredTopology {
    let mut b = TopoBuilder::new();
    for n in 1..=6u8 {
        let s = b.add_switch(u64::from(n));
        b.add_host(n, s);
    }
    for (a, c, mbps) in BW_MESH_LINKS {
        b.add_link(SwitchId(a), SwitchId(c), Some(opts.reference_mbps / mbps));
    }
    b.build()
}
