use crate::ctrl::{Action, ControlEvent, Instruction};
use crate::net::{MacAddr, RouteError, SwitchId};
use crate::scenario::{PathQuery, ScenarioSpec};

#[test]
fn six_switch_scenario_replays_and_routes() {
    let raw = r#"{
        "schema_version": 1,
        "topology": {"kind": "six_switch"},
        "step_ms": 10,
        "events": [
            {"type": "frame_arrived", "switch": 1, "in_port": 1,
             "src": "00:00:00:00:00:01", "dst": "00:00:00:00:00:06", "ether_type": 2048},
            {"type": "frame_arrived", "switch": 6, "in_port": 1,
             "src": "00:00:00:00:00:06", "dst": "00:00:00:00:00:01", "ether_type": 2048}
        ],
        "queries": [{"src": 1, "dst": 6}, {"src": 1, "dst": 42}]
    }"#;
    let spec = ScenarioSpec::from_json_str(raw).expect("scenario");
    let replay = spec.replay(None).expect("replay");

    // 6 条 table-miss，h1 的帧泛洪
    let table_miss = replay
        .instructions
        .iter()
        .filter(|i| i.actions() == [Action::Controller])
        .count();
    assert_eq!(table_miss, 6);
    assert!(replay.instructions[6].is_flood());

    // h6 的回包在 s6 上未学习到 h1，同样泛洪
    assert_eq!(replay.instructions.len(), 8);
    assert_eq!(replay.controller.stats.floods, 2);
    assert_eq!(replay.controller.stats.dropped, 0);

    let (q, route) = &replay.routes[0];
    assert_eq!(*q, PathQuery { src: SwitchId(1), dst: SwitchId(6) });
    let route = route.as_ref().expect("route 1 -> 6");
    assert_eq!(route.hops, vec![SwitchId(1), SwitchId(3), SwitchId(4), SwitchId(6)]);
    assert_eq!(route.cost, 25.0);
    assert_eq!(
        replay.routes[1].1,
        Err(RouteError::DestinationNotFound(SwitchId(42)))
    );
}

#[test]
fn bw_mesh_costs_follow_reference_bandwidth() {
    let raw = r#"{
        "schema_version": 1,
        "topology": {"kind": "bw_mesh"},
        "queries": [{"src": 1, "dst": 4}, {"src": 2, "dst": 6}]
    }"#;
    let replay = ScenarioSpec::from_json_str(raw)
        .expect("scenario")
        .replay(None)
        .expect("replay");
    let r14 = replay.routes[0].1.as_ref().expect("route 1 -> 4");
    assert_eq!(r14.hops, vec![SwitchId(1), SwitchId(3), SwitchId(4)]);
    assert_eq!(r14.cost, 300.0);
    let r26 = replay.routes[1].1.as_ref().expect("route 2 -> 6");
    assert_eq!(
        r26.hops,
        vec![SwitchId(2), SwitchId(1), SwitchId(5), SwitchId(6)]
    );
    assert_eq!(r26.cost, 500.0);
}

#[test]
fn embedded_config_is_validated() {
    let raw = r#"{
        "schema_version": 1,
        "config": {"link_weights": [{"src": 1, "dst": 2, "cost": -1}]}
    }"#;
    let spec = ScenarioSpec::from_json_str(raw).expect("parses");
    assert!(spec.replay(None).is_err());
}

#[test]
fn events_parse_from_tagged_json() {
    let raw = r#"[
        {"type": "switch_joined", "switch": 3},
        {"type": "channel_state", "switch": 3, "state": "configured"},
        {"type": "link_discovered", "src": 3, "src_port": 1, "dst": 4, "dst_port": 2},
        {"type": "host_discovered", "mac": "00:00:00:00:00:0a", "ip": "10.0.0.10", "switch": 3, "port": 5},
        {"type": "switch_left", "switch": 3}
    ]"#;
    let events: Vec<ControlEvent> = serde_json::from_str(raw).expect("events");
    assert_eq!(
        events[0],
        ControlEvent::SwitchJoined {
            switch: SwitchId(3),
            ports: vec![]
        }
    );
    match &events[3] {
        ControlEvent::HostDiscovered { mac, ip, .. } => {
            assert_eq!(*mac, MacAddr::from_index(10));
            assert_eq!(ip.map(|i| i.to_string()).as_deref(), Some("10.0.0.10"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(events[2].switches(), vec![SwitchId(3), SwitchId(4)]);
    assert_eq!(events[4].kind(), "switch_left");
}

#[test]
fn instructions_serialize_with_match_key() {
    let ins = Instruction::InstallFlowRule {
        switch: SwitchId(1),
        matcher: crate::ctrl::FlowMatch::in_port_dst(5, MacAddr::from_index(0xaa)),
        actions: vec![Action::Output { port: 3 }],
        priority: 1,
        buffer_id: None,
    };
    let v = serde_json::to_value(&ins).expect("json");
    assert_eq!(v["type"], "install_flow_rule");
    assert_eq!(v["match"]["in_port"], 5);
    assert_eq!(v["match"]["eth_dst"], "00:00:00:00:00:aa");
    assert_eq!(v["actions"][0]["type"], "output");
    assert_eq!(
        ins.to_string(),
        "install_flow switch=1 match=in_port=5,eth_dst=00:00:00:00:00:aa actions=output:3 priority=1 buffer=-"
    );
}
