use crate::config::{ConfigError, ControllerConfig};
use crate::net::{MacAddr, SwitchId, TopologyError};

#[test]
fn empty_object_uses_defaults() {
    let cfg = ControllerConfig::from_json_str("{}").expect("defaults");
    assert_eq!(cfg.default_link_cost, 1.0);
    assert_eq!(cfg.flow_priority, 1);
    assert_eq!(cfg.table_miss_priority, 0);
    assert!(cfg.install_paths);
    assert_eq!(cfg.learning.ttl_secs, Some(300));
    assert!(!cfg.probe.enabled);
    assert_eq!(cfg.probe.reference_mbps, 1000.0);
}

#[test]
fn parses_weights_and_probe_section() {
    let raw = r#"{
        "default_link_cost": 2.0,
        "link_weights": [{"src": 1, "dst": 2, "cost": 10.0}],
        "learning": {"ttl_secs": null, "max_entries_per_switch": 16},
        "probe": {
            "enabled": true,
            "quiet_period_ms": 500,
            "command": {"program": "iperf", "args": ["-c", "{server_ip}"]},
            "host_names": {"00:00:00:00:00:01": "h1"}
        }
    }"#;
    let cfg = ControllerConfig::from_json_str(raw).expect("config");
    assert_eq!(cfg.learning_ttl(), None);
    assert_eq!(cfg.learning.max_entries_per_switch, Some(16));
    assert_eq!(cfg.probe.quiet_period().as_millis(), 500);
    let cmd = cfg.probe.command.as_ref().expect("command");
    assert_eq!(cmd.timeout_secs, 30);
    assert_eq!(
        cfg.probe.host_names.get(&MacAddr::from_index(1)).map(String::as_str),
        Some("h1")
    );

    let mut topo = cfg.build_topology().expect("topology");
    topo.upsert_link(SwitchId(1), 1, SwitchId(2), 1, None).expect("link");
    topo.upsert_link(SwitchId(2), 1, SwitchId(1), 1, None).expect("link");
    assert_eq!(topo.link(SwitchId(1), SwitchId(2)).expect("link").cost, 10.0);
    assert_eq!(topo.link(SwitchId(2), SwitchId(1)).expect("link").cost, 2.0);
}

#[test]
fn negative_configured_weight_is_fatal() {
    let raw = r#"{"link_weights": [{"src": 1, "dst": 2, "cost": -3.0}]}"#;
    match ControllerConfig::from_json_str(raw) {
        Err(ConfigError::Topology(e)) => {
            assert!(e.is_fatal());
            assert!(matches!(e, TopologyError::NegativeWeight { .. }));
        }
        other => panic!("expected negative weight error, got {other:?}"),
    }
}

#[test]
fn negative_default_cost_is_fatal() {
    assert!(matches!(
        ControllerConfig::from_json_str(r#"{"default_link_cost": -1}"#),
        Err(ConfigError::Topology(TopologyError::InvalidDefaultCost(_)))
    ));
}

#[test]
fn invalid_switch_in_weights_is_rejected() {
    assert!(matches!(
        ControllerConfig::from_json_str(r#"{"link_weights": [{"src": 0, "dst": 2, "cost": 1}]}"#),
        Err(ConfigError::Topology(TopologyError::InvalidSwitch(0)))
    ));
}

#[test]
fn probing_requires_a_command() {
    assert!(matches!(
        ControllerConfig::from_json_str(r#"{"probe": {"enabled": true}}"#),
        Err(ConfigError::Probe(_))
    ));
    assert!(matches!(
        ControllerConfig::from_json_str(r#"{"probe": {"reference_mbps": 0}}"#),
        Err(ConfigError::Probe(_))
    ));
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(
        ControllerConfig::from_json_str("{"),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("sdnctl-rs-missing-config.json");
    let _ = std::fs::remove_file(&path);
    assert!(matches!(
        ControllerConfig::load(&path),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn command_timeout_must_be_bounded() {
    for timeout in [0u64, crate::config::MAX_PROBE_TIMEOUT_SECS + 1, u64::MAX] {
        let raw = format!(
            r#"{{"probe": {{"enabled": true, "command": {{"program": "true", "timeout_secs": {timeout}}}}}}}"#
        );
        assert!(
            matches!(ControllerConfig::from_json_str(&raw), Err(ConfigError::Probe(_))),
            "timeout_secs {timeout} should be rejected"
        );
    }
    let raw = r#"{"probe": {"enabled": true, "command": {"program": "true", "timeout_secs": 86400}}}"#;
    assert!(ControllerConfig::from_json_str(raw).is_ok());
}
