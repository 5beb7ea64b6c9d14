use std::fmt;
use std::net::Ipv4Addr;

use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::IpNetwork;

#[cfg(target_os = "linux")]
use linux_impl::{advertised_gateways, is_physical, is_wireless};
#[cfg(target_os = "macos")]
use macos_impl::{advertised_gateways, is_physical, is_wireless};
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use other_impl::{advertised_gateways, is_physical, is_wireless};

/// Name prefixes of adapters that never face the device's LAN.
const VIRTUAL_NAME_PREFIXES: &[&str] = &[
    "docker", "veth", "br-", "virbr", "vmnet", "vboxnet", "tun", "tap", "utun", "wg", "zt",
    "tailscale",
];

/// Description fragments used by Windows for the same kind of adapter.
const VIRTUAL_DESCRIPTION_MARKERS: &[&str] =
    &["virtual", "multiplexor", "tunnel", "tap-windows", "vpn", "pseudo"];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// The interface is the loopback adapter.
    IsLoopback,
    /// The interface was filtered out as "not physical" by the provided logic.
    NotPhysical,
    /// Name or description marks it as a virtual, tunnel or multiplexor adapter.
    Virtual,
    /// The interface does not have a MAC address.
    NoMacAddress,
    /// The interface is a point-to-point link (e.g., a VPN).
    IsPointToPoint,
    /// The interface has no IPv4 address.
    NoIpv4,
}

impl fmt::Display for ViabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ViabilityError::IsDown => "down",
            ViabilityError::IsLoopback => "loopback",
            ViabilityError::NotPhysical => "not a physical adapter",
            ViabilityError::Virtual => "virtual or tunnel adapter",
            ViabilityError::NoMacAddress => "no MAC address",
            ViabilityError::IsPointToPoint => "point-to-point link",
            ViabilityError::NoIpv4 => "no IPv4 address",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Wired,
    Wireless,
}

/// An adapter that survived filtering and may face the device's LAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceCandidate {
    pub name: String,
    pub description: String,
    pub link: LinkKind,
    pub ipv4: Ipv4Addr,
    /// Gateways the OS routing table advertises for this adapter, if any.
    pub gateways: Vec<Ipv4Addr>,
}

/// The verdict for one enumerated interface.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub name: String,
    pub verdict: Result<NetworkInterfaceCandidate, ViabilityError>,
}

/// Enumerates the local interfaces and assesses each one.
///
/// The snapshot is fresh on every call.
pub fn assess_local_interfaces() -> Vec<Assessment> {
    pnet::datalink::interfaces()
        .iter()
        .map(|interface| Assessment {
            name: interface.name.clone(),
            verdict: assess(interface, is_physical, is_wireless)
                .map(|candidate| with_gateways(candidate, advertised_gateways)),
        })
        .collect()
}

/// The candidates from [`assess_local_interfaces`], in enumeration order.
pub fn local_candidates() -> Vec<NetworkInterfaceCandidate> {
    assess_local_interfaces()
        .into_iter()
        .filter_map(|assessment| assessment.verdict.ok())
        .collect()
}

pub fn assess(
    interface: &NetworkInterface,
    is_physical: impl Fn(&NetworkInterface) -> bool,
    is_wireless: impl Fn(&NetworkInterface) -> bool,
) -> Result<NetworkInterfaceCandidate, ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if is_virtual(interface) {
        return Err(ViabilityError::Virtual);
    }
    if !is_physical(interface) {
        return Err(ViabilityError::NotPhysical);
    }
    if interface.mac.is_none() {
        return Err(ViabilityError::NoMacAddress);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
    }
    let ipv4 = first_ipv4(interface).ok_or(ViabilityError::NoIpv4)?;

    let link = if is_wireless(interface) {
        LinkKind::Wireless
    } else {
        LinkKind::Wired
    };

    Ok(NetworkInterfaceCandidate {
        name: interface.name.clone(),
        description: interface.description.clone(),
        link,
        ipv4,
        gateways: Vec::new(),
    })
}

fn with_gateways(
    mut candidate: NetworkInterfaceCandidate,
    gateways: impl Fn(&str) -> Vec<Ipv4Addr>,
) -> NetworkInterfaceCandidate {
    candidate.gateways = gateways(&candidate.name);
    candidate
}

fn first_ipv4(interface: &NetworkInterface) -> Option<Ipv4Addr> {
    interface.ips.iter().find_map(|net| match net {
        IpNetwork::V4(v4) if !v4.ip().is_loopback() && !v4.ip().is_link_local() => Some(v4.ip()),
        _ => None,
    })
}

fn is_virtual(interface: &NetworkInterface) -> bool {
    let name = interface.name.to_ascii_lowercase();
    let description = interface.description.to_ascii_lowercase();
    VIRTUAL_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
        || VIRTUAL_DESCRIPTION_MARKERS
            .iter()
            .any(|marker| description.contains(marker))
}

/// Gateways for `interface` from the contents of `/proc/net/route`.
///
/// Addresses in that table are little-endian hex.
pub fn parse_route_table(contents: &str, interface: &str) -> Vec<Ipv4Addr> {
    let mut gateways: Vec<Ipv4Addr> = Vec::new();
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[0] != interface {
            continue;
        }
        let Ok(raw) = u32::from_str_radix(fields[2], 16) else {
            continue;
        };
        let gateway = Ipv4Addr::from(raw.to_le_bytes());
        if !gateway.is_unspecified() && !gateways.contains(&gateway) {
            gateways.push(gateway);
        }
    }
    gateways
}

/// One entry of `networksetup -listallhardwareports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwarePort {
    pub device: String,
    pub wireless: bool,
    pub bridge: bool,
}

/// Pairs each `Hardware Port:` label with the `Device:` line under it.
pub fn parse_hardware_ports(listing: &str) -> Vec<HardwarePort> {
    let mut ports = Vec::new();
    let mut label: Option<&str> = None;
    for line in listing.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Hardware Port:") {
            label = Some(name.trim());
        } else if let (Some(device), Some(name)) = (line.strip_prefix("Device:"), label.take()) {
            ports.push(HardwarePort {
                device: device.trim().to_string(),
                wireless: name.contains("Wi-Fi") || name.contains("AirPort"),
                bridge: name.contains("Bridge"),
            });
        }
    }
    ports
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::path::Path;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/device", interface.name)).exists()
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/wireless", interface.name)).exists()
    }

    pub fn advertised_gateways(name: &str) -> Vec<Ipv4Addr> {
        std::fs::read_to_string("/proc/net/route")
            .map(|contents| parse_route_table(&contents, name))
            .unwrap_or_default()
    }
}

#[cfg(target_os = "macos")]
mod macos_impl {
    use super::*;
    use std::process::Command;
    use std::sync::OnceLock;

    fn ports() -> &'static [HardwarePort] {
        static PORTS: OnceLock<Vec<HardwarePort>> = OnceLock::new();
        PORTS.get_or_init(|| {
            Command::new("networksetup")
                .arg("-listallhardwareports")
                .output()
                .map(|out| parse_hardware_ports(&String::from_utf8_lossy(&out.stdout)))
                .unwrap_or_default()
        })
    }

    fn port(interface: &NetworkInterface) -> Option<&'static HardwarePort> {
        ports().iter().find(|port| port.device == interface.name)
    }

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        port(interface).is_some_and(|port| !port.bridge)
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        port(interface).is_some_and(|port| port.wireless)
    }

    pub fn advertised_gateways(_name: &str) -> Vec<Ipv4Addr> {
        Vec::new()
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod other_impl {
    use super::*;

    pub fn is_physical(_interface: &NetworkInterface) -> bool {
        true
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        let description = interface.description.to_ascii_lowercase();
        ["wi-fi", "wireless", "802.11", "wlan"]
            .iter()
            .any(|marker| description.contains(marker))
    }

    pub fn advertised_gateways(_name: &str) -> Vec<Ipv4Addr> {
        Vec::new()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
