//! 六交换机时延加权拓扑
//!
//! 链路权重即单向时延（毫秒）：1-2:10, 1-3:10, 1-5:15, 2-3:15, 2-4:15, 3-4:5, 4-6:10, 5-6:15。
//! 主机 h1/h2/h4/h5/h6 分别接在同号交换机上，s3 上没有主机。

use super::builder::{DeclaredTopology, TopoBuilder};

pub const SIX_SWITCH_LINKS: [(u64, u64, f64); 8] = [
    (1, 2, 10.0),
    (1, 3, 10.0),
    (1, 5, 15.0),
    (2, 3, 15.0),
    (2, 4, 15.0),
    (3, 4, 5.0),
    (4, 6, 10.0),
    (5, 6, 15.0),
];

/// 构建六交换机拓扑（先接主机，再连交换机，端口号与测试床一致）
pub fn build_six_switch() -> DeclaredTopology {
    let mut b = TopoBuilder::new();
    for n in 1..=6 {
        b.add_switch(n);
    }
    for n in [1u8, 2, 4, 5, 6] {
        b.add_host(n, crate::net::SwitchId(u64::from(n)));
    }
    for (a, c, w) in SIX_SWITCH_LINKS {
        let (a, c) = (b.add_switch(a), b.add_switch(c));
        b.add_link(a, c, Some(w));
    }
    b.build()
}
