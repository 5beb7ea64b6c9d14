use pnet::datalink::{MacAddr, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use std::net::{Ipv4Addr, Ipv6Addr};

/// `flags` values as Linux reports them for the usual adapter kinds.
pub mod flags {
    /// UP | BROADCAST | RUNNING | MULTICAST | LOWER_UP
    pub const ETHERNET: u32 = 69699;
    /// UP | LOOPBACK | RUNNING | LOWER_UP
    pub const LOOPBACK: u32 = 65609;
    /// UP | POINTOPOINT | RUNNING | NOARP | MULTICAST | LOWER_UP
    pub const TUNNEL: u32 = 69841;
    /// BROADCAST | MULTICAST, cable unplugged
    pub const DOWN: u32 = 4098;
}

pub fn ni(name: &str, index: u32, mac: Option<MacAddr>, ips: &[IpNetwork], flags: u32) -> NetworkInterface {
    NetworkInterface {
        name: name.into(),
        description: "".into(),
        index,
        mac,
        ips: ips.to_vec(),
        flags,
    }
}

pub fn described(mut interface: NetworkInterface, description: &str) -> NetworkInterface {
    interface.description = description.into();
    interface
}

pub fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> IpNetwork {
    IpNetwork::V4(Ipv4Network::new(Ipv4Addr::new(a, b, c, d), prefix).unwrap())
}

pub fn v6(s: &str, prefix: u8) -> IpNetwork {
    IpNetwork::V6(Ipv6Network::new(s.parse::<Ipv6Addr>().unwrap(), prefix).unwrap())
}
