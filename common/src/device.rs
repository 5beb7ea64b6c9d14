use std::net::{Ipv4Addr, SocketAddrV4};

use pnet::util::MacAddr;

use crate::network::interface::NetworkInterfaceCandidate;
use crate::network::subnet::Subnet;

/// A host that answered during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub addr: Ipv4Addr,
    /// The port that accepted the connection.
    pub port: u16,
    /// `None` when the neighbor table had no entry for the address.
    pub mac: Option<MacAddr>,
    /// Name of the matched vendor signature.
    pub vendor: Option<&'static str>,
}

impl DeviceCandidate {
    pub fn is_target(&self) -> bool {
        self.vendor.is_some()
    }
}

/// Everything discovery learned, handed on to the session stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    pub interface: NetworkInterfaceCandidate,
    pub subnet: Subnet,
    pub device: DeviceCandidate,
}

impl DeviceContext {
    pub fn device_addr(&self) -> Ipv4Addr {
        self.device.addr
    }

    /// Where the firmware server listens and the device fetches from.
    pub fn server_addr(&self, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(self.interface.ipv4, port)
    }
}
