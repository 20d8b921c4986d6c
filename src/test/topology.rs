use std::time::{Duration, Instant};

use super::util::mac;
use crate::net::{HostChange, LinkChange, MacAddr, SwitchId, Topology, TopologyError};

fn s(n: u64) -> SwitchId {
    SwitchId(n)
}

#[test]
fn upserts_are_idempotent() {
    let mut topo = Topology::default();
    assert_eq!(topo.upsert_switch(s(1), &[1, 2]), Ok(true));
    assert_eq!(topo.upsert_switch(s(1), &[1, 2]), Ok(false));
    assert_eq!(topo.upsert_switch(s(2), &[]), Ok(true));

    assert_eq!(topo.upsert_link(s(1), 2, s(2), 1, None), Ok(LinkChange::Added));
    assert_eq!(topo.upsert_link(s(1), 2, s(2), 1, None), Ok(LinkChange::Unchanged));
    assert_eq!(topo.links().count(), 1);
    assert_eq!(topo.link(s(1), s(2)).expect("link").cost, 1.0);
    assert!(topo.link(s(2), s(1)).is_none(), "links are directional");
}

#[test]
fn link_rewire_keeps_cost_and_reports_change() {
    let mut topo = Topology::new(3.0);
    topo.upsert_link(s(1), 2, s(2), 1, Some(7.0)).expect("link");
    assert_eq!(topo.upsert_link(s(1), 4, s(2), 1, None), Ok(LinkChange::Rewired));
    let link = topo.link(s(1), s(2)).expect("link");
    assert_eq!(link.src_port, 4);
    assert_eq!(link.cost, 7.0);
}

#[test]
fn link_with_unknown_switches_inserts_them() {
    let mut topo = Topology::default();
    topo.upsert_link(s(5), 1, s(6), 2, None).expect("link");
    assert!(topo.contains_switch(s(5)));
    assert!(topo.contains_switch(s(6)));
    assert!(topo.switch(s(6)).expect("s6").ports.contains(&2));
    assert!(topo.is_link_port(s(5), 1));
    assert!(!topo.is_link_port(s(5), 2));
}

#[test]
fn configured_weight_applies_to_new_and_existing_links() {
    let mut topo = Topology::default();
    topo.set_configured_weight(s(1), s(2), 10.0).expect("weight");
    topo.upsert_link(s(1), 1, s(2), 1, None).expect("link");
    assert_eq!(topo.link(s(1), s(2)).expect("link").cost, 10.0);

    topo.set_configured_weight(s(1), s(2), 4.0).expect("weight");
    assert_eq!(topo.link(s(1), s(2)).expect("link").cost, 4.0);

    let err = topo.set_configured_weight(s(1), s(2), -1.0).expect_err("negative");
    assert!(err.is_fatal());
}

#[test]
fn invalid_identifiers_are_rejected() {
    let mut topo = Topology::default();
    assert_eq!(topo.upsert_switch(s(0), &[]), Err(TopologyError::InvalidSwitch(0)));
    assert_eq!(
        topo.upsert_switch(s(1), &[0]),
        Err(TopologyError::InvalidPort { switch: s(1), port: 0 })
    );
    assert!(matches!(
        topo.upsert_link(s(1), 0xffff_fffb, s(2), 1, None),
        Err(TopologyError::InvalidPort { .. })
    ));
    assert!(matches!(
        topo.upsert_link(s(1), 1, s(2), 1, Some(-2.0)),
        Err(TopologyError::NegativeWeight { .. })
    ));
    assert_eq!(
        topo.upsert_host(MacAddr::BROADCAST, s(1), 1, None),
        Err(TopologyError::InvalidAddress(MacAddr::BROADCAST))
    );
    assert_eq!(
        topo.upsert_host(MacAddr::ZERO, s(1), 1, None),
        Err(TopologyError::InvalidAddress(MacAddr::ZERO))
    );
    assert_eq!(topo.switches().count(), 0);
}

#[test]
fn later_host_observation_overwrites_location() {
    let mut topo = Topology::default();
    let h = mac("00:00:00:00:00:0a");
    let ip = "10.0.0.10".parse().expect("ip");
    assert_eq!(topo.upsert_host(h, s(1), 3, Some(ip)), Ok(HostChange::New));
    assert_eq!(topo.upsert_host(h, s(1), 3, None), Ok(HostChange::Refreshed));
    assert_eq!(
        topo.upsert_host(h, s(2), 4, None),
        Ok(HostChange::Moved { from: (s(1), 3) })
    );
    let host = topo.host(h).expect("host");
    assert_eq!(host.location(), (s(2), 4));
    assert_eq!(host.ip, Some(ip), "a missing ip keeps the known one");
    assert_eq!(topo.hosts().count(), 1);
}

#[test]
fn removing_switch_cascades_to_links_and_hosts() {
    let mut topo = Topology::default();
    topo.upsert_link(s(1), 1, s(2), 1, None).expect("link");
    topo.upsert_link(s(2), 1, s(1), 1, None).expect("link");
    topo.upsert_link(s(2), 2, s(3), 1, None).expect("link");
    let h = mac("00:00:00:00:00:02");
    topo.upsert_host(h, s(2), 9, None).expect("host");

    let removal = topo.remove_switch(s(2)).expect("s2 present");
    assert_eq!(removal.links, 3);
    assert_eq!(removal.hosts, vec![h]);
    assert_eq!(topo.links().count(), 0);
    assert!(topo.host(h).is_none());
    assert!(topo.remove_switch(s(2)).is_none());

    let snap = topo.snapshot();
    assert!(snap.contains(s(1)));
    assert!(!snap.contains(s(2)));
}

#[test]
fn snapshot_is_isolated_from_later_mutation() {
    let mut topo = Topology::default();
    topo.upsert_link(s(1), 1, s(2), 1, Some(2.0)).expect("link");
    let snap = topo.snapshot();
    topo.upsert_link(s(1), 1, s(2), 1, Some(9.0)).expect("link");
    topo.remove_switch(s(2));
    assert_eq!(snap.edge_cost(s(1), s(2)), Some(2.0));
}

#[test]
fn measured_bandwidth_sets_cost() {
    let mut topo = Topology::default();
    topo.upsert_link(s(1), 1, s(2), 1, None).expect("link");
    assert_eq!(topo.set_link_bandwidth(s(1), s(2), 50.0, 1000.0), Some(1.0));
    let link = topo.link(s(1), s(2)).expect("link");
    assert_eq!(link.cost, 20.0);
    assert_eq!(link.bandwidth_mbps, Some(50.0));
    assert_eq!(topo.set_link_bandwidth(s(2), s(1), 50.0, 1000.0), None);
}

#[test]
fn observed_hosts_expire_static_hosts_do_not() {
    let mut topo = Topology::default();
    let seen = mac("00:00:00:00:00:01");
    let declared = mac("00:00:00:00:00:02");
    topo.upsert_host(seen, s(1), 1, None).expect("host");
    topo.upsert_host(declared, s(1), 2, None).expect("host");

    let t0 = Instant::now();
    topo.touch_host(seen, t0);
    let ttl = Duration::from_secs(10);
    assert!(topo.expire_hosts(t0 + Duration::from_secs(9), ttl).is_empty());
    assert_eq!(topo.expire_hosts(t0 + ttl, ttl), vec![seen]);
    assert!(topo.host(declared).is_some());
}

#[test]
fn report_lists_hosts_switches_and_links() {
    let mut topo = Topology::default();
    topo.upsert_link(s(1), 2, s(2), 1, None).expect("link");
    topo.upsert_host(mac("00:00:00:00:00:01"), s(1), 1, None)
        .expect("host");
    let report = topo.report();
    assert!(report.starts_with("Current Hosts:\n"));
    assert!(report.contains("\t00:00:00:00:00:01 ip=- at s1:1"));
    assert!(report.contains("Current Switches:"));
    assert!(report.contains("\ts1:2 -> s2:1 cost=1 bw=-"));
}

#[test]
fn mac_parsing_accepts_both_separators() {
    assert_eq!(mac("00-00-00-00-00-0a"), MacAddr::from_index(10));
    assert!("00:00:00:00:0a".parse::<MacAddr>().is_err());
    assert!("00:00:00:00:00:0g".parse::<MacAddr>().is_err());
    assert_eq!(MacAddr::from_index(10).to_string(), "00:00:00:00:00:0a");
}
