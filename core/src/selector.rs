//! Picks the interface that sits on the device's network.
//!
//! A candidate qualifies when something answers on a likely gateway address
//! behind it. The operator has the final word on every match.

use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{debug, info};

use atacfg_common::config::{GATEWAY_OCTETS, GATEWAY_PORT};
use atacfg_common::error::ProvisionError;
use atacfg_common::network::interface::NetworkInterfaceCandidate;
use atacfg_common::network::subnet::Subnet;
use atacfg_common::operator::Operator;

use crate::network::tcp::PortProber;

pub struct InterfaceSelector<P> {
    prober: P,
    octets: Vec<u8>,
    port: u16,
}

impl<P: PortProber> InterfaceSelector<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            octets: GATEWAY_OCTETS.to_vec(),
            port: GATEWAY_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Walks `candidates` in order and returns the first one whose gateway
    /// answers and that the operator accepts.
    pub async fn select(
        &self,
        candidates: Vec<NetworkInterfaceCandidate>,
        operator: &dyn Operator,
    ) -> Result<NetworkInterfaceCandidate, ProvisionError> {
        for candidate in candidates {
            let Some(gateway) = self.find_gateway(&candidate).await else {
                debug!(interface = %candidate.name, "no gateway answered");
                continue;
            };

            info!(
                "Found interface {} ({}) with gateway {gateway}",
                candidate.name, candidate.ipv4
            );
            let question = format!(
                "Use {} ({}, {}) to look for the adapter?",
                candidate.name, candidate.description, candidate.ipv4
            );
            if operator.confirm(&question) {
                return Ok(candidate);
            }
            debug!(interface = %candidate.name, "declined by operator");
        }

        Err(ProvisionError::NoInterface)
    }

    async fn find_gateway(&self, candidate: &NetworkInterfaceCandidate) -> Option<Ipv4Addr> {
        for addr in gateway_addresses(candidate, &self.octets) {
            let target = SocketAddrV4::new(addr, self.port);
            match self.prober.probe(target).await {
                Ok(outcome) if outcome.answered() => return Some(addr),
                Ok(_) => {}
                Err(e) => debug!(%target, "gateway probe failed: {e}"),
            }
        }
        None
    }
}

/// Advertised gateways first, then the conventional host octets of the
/// interface's /24. Never the interface's own address.
pub fn gateway_addresses(candidate: &NetworkInterfaceCandidate, octets: &[u8]) -> Vec<Ipv4Addr> {
    let subnet = Subnet::containing(candidate.ipv4);
    let mut addresses: Vec<Ipv4Addr> = Vec::new();

    let guesses = octets.iter().map(|octet| subnet.host(*octet));
    for addr in candidate.gateways.iter().copied().chain(guesses) {
        if addr != candidate.ipv4 && !addresses.contains(&addr) {
            addresses.push(addr);
        }
    }

    addresses
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
