use std::time::Instant;

use crate::config::ControllerConfig;
use crate::ctrl::{ChannelState, ControlEvent, Controller, FrameArrival};
use crate::net::{MacAddr, PortNo, SwitchId};

pub(crate) fn mac(s: &str) -> MacAddr {
    s.parse().expect("mac literal")
}

/// 会话依次进入 Connecting/Configured/Active 并加入拓扑
pub(crate) fn bring_up(ctl: &mut Controller, now: Instant, switches: &[u64]) {
    for &n in switches {
        let switch = SwitchId(n);
        for state in [
            ChannelState::Connecting,
            ChannelState::Configured,
            ChannelState::Active,
        ] {
            ctl.try_handle(now, ControlEvent::ChannelState { switch, state })
                .expect("session transition");
        }
        ctl.try_handle(
            now,
            ControlEvent::SwitchJoined {
                switch,
                ports: Vec::new(),
            },
        )
        .expect("switch joined");
    }
}

pub(crate) fn controller_with(switches: &[u64], now: Instant) -> Controller {
    let mut ctl = Controller::new(ControllerConfig::default()).expect("default config");
    bring_up(&mut ctl, now, switches);
    ctl
}

pub(crate) fn frame(switch: u64, in_port: PortNo, src: MacAddr, dst: MacAddr) -> ControlEvent {
    ControlEvent::FrameArrived(FrameArrival {
        switch: SwitchId(switch),
        in_port,
        src,
        dst,
        ether_type: 0x0800,
        buffer_id: None,
        payload: Some(vec![0xde, 0xad]),
    })
}
