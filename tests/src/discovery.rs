use std::net::{Ipv4Addr, SocketAddrV4};

use atacfg_common::error::{ProvisionError, exit_code};
use atacfg_common::network::subnet::Subnet;
use atacfg_core::discovery::DeviceDiscovery;
use atacfg_core::network::tcp::ProbeOutcome;

use crate::support::*;

/// The adapter sits behind a printer on the same /24. Discovery has to pick
/// eth0, sweep upwards, skip the printer by its MAC and stop at the adapter.
#[tokio::test]
async fn discovery_finds_adapter_on_home_subnet() {
    let network = FakeNetwork::home();
    let operator = ScriptedOperator::agreeing();

    let context = network.discovery().discover(&operator).await;

    assert!(context.is_ok(), "Discovery failed: {:?}", context.err());
    let context = context.unwrap();

    assert_eq!(context.interface.name, "eth0");
    assert_eq!(context.subnet, Subnet::containing(LOCAL_IP));
    assert_eq!(context.device_addr(), ADAPTER_IP);
    assert_eq!(context.device.port, 80);
    assert_eq!(context.device.mac, Some(ADAPTER_MAC));
    assert_eq!(context.device.vendor, Some("Grandstream"));
    assert_eq!(
        context.server_addr(8080),
        SocketAddrV4::new(LOCAL_IP, 8080)
    );

    assert_eq!(operator.questions().len(), 1);
    assert!(operator.questions()[0].contains("eth0"));
}

#[tokio::test]
async fn discovery_sweeps_in_ascending_order_and_stops_at_the_match() {
    let network = FakeNetwork::home();
    network
        .discovery()
        .discover(&ScriptedOperator::agreeing())
        .await
        .unwrap();

    // .0 stays silent, .1 answers as the gateway; the sweep follows.
    let probed = network.probed();
    assert_eq!(probed[0], SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 0), 80));
    assert_eq!(probed[1], SocketAddrV4::new(GATEWAY, 80));

    let mut hosts: Vec<Ipv4Addr> = probed[2..].iter().map(|addr| *addr.ip()).collect();
    hosts.dedup();
    let expected: Vec<Ipv4Addr> = (1..=42).map(|last| Ipv4Addr::new(192, 168, 1, last)).collect();
    assert_eq!(hosts, expected);

    // Hosts that accepted on 80 are not tried on 443.
    assert_eq!(probed.len() - 2, 42 * 2 - 3);
}

#[tokio::test]
async fn discovery_reports_missing_adapter() {
    let network = FakeNetwork::default()
        .listening(GATEWAY, 80)
        .listening(PRINTER_IP, 80)
        .neighbor(PRINTER_IP, PRINTER_MAC);

    let err = network
        .discovery()
        .discover(&ScriptedOperator::agreeing())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::DeviceNotFound { .. }));
    assert_eq!(err.exit_code(), exit_code::DEVICE_NOT_FOUND);
}

#[tokio::test]
async fn discovery_without_gateway_reports_no_interface() {
    let network = FakeNetwork::default()
        .listening(ADAPTER_IP, 80)
        .neighbor(ADAPTER_IP, ADAPTER_MAC);

    let err = network
        .discovery()
        .discover(&ScriptedOperator::agreeing())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::NoInterface));
    assert_eq!(err.exit_code(), exit_code::NO_INTERFACE);
}

#[tokio::test]
async fn declined_interface_is_not_scanned() {
    let network = FakeNetwork::home();
    let operator = ScriptedOperator::default();

    let err = network.discovery().discover(&operator).await.unwrap_err();

    assert!(matches!(err, ProvisionError::NoInterface));
    assert_eq!(operator.questions().len(), 1);
    assert!(!network.probed().iter().any(|addr| *addr.ip() == ADAPTER_IP));
}

#[tokio::test]
async fn refusing_adapter_is_not_a_match() {
    let network = FakeNetwork::default()
        .listening(GATEWAY, 80)
        .answer(ADAPTER_IP, 80, ProbeOutcome::Refused)
        .answer(ADAPTER_IP, 443, ProbeOutcome::Refused)
        .neighbor(ADAPTER_IP, ADAPTER_MAC);

    let err = network
        .discovery()
        .discover(&ScriptedOperator::agreeing())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::DeviceNotFound { .. }));
}
