use std::fmt;
use std::net::Ipv4Addr;

/// The /24 the device is expected to live in.
///
/// Derived from the selected interface address by zeroing the last octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: Ipv4Addr,
}

impl Subnet {
    pub fn containing(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self {
            network: Ipv4Addr::new(a, b, c, 0),
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn host(&self, octet: u8) -> Ipv4Addr {
        let [a, b, c, _] = self.network.octets();
        Ipv4Addr::new(a, b, c, octet)
    }

    /// Host addresses `.1` through `.254`, ascending.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (1..=254u8).map(|octet| self.host(octet))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        Subnet::containing(addr) == *self
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/24", self.network)
    }
}
