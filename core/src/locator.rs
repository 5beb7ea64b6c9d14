//! Sequential /24 sweep for the first host carrying a known vendor prefix.

use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{debug, info};

use atacfg_common::config::SCAN_PORTS;
use atacfg_common::device::DeviceCandidate;
use atacfg_common::error::ProvisionError;
use atacfg_common::network::mac::{VendorRegistry, vendor_name};
use atacfg_common::network::subnet::Subnet;

use crate::arp::NeighborTable;
use crate::network::tcp::{PortProber, ProbeOutcome};

pub type ProgressFn = Box<dyn Fn(Ipv4Addr) + Send + Sync>;

pub struct DeviceLocator<P, N> {
    prober: P,
    neighbors: N,
    registry: VendorRegistry,
    ports: Vec<u16>,
    on_probe: Option<ProgressFn>,
}

impl<P: PortProber, N: NeighborTable> DeviceLocator<P, N> {
    pub fn new(prober: P, neighbors: N) -> Self {
        Self {
            prober,
            neighbors,
            registry: VendorRegistry::default(),
            ports: SCAN_PORTS.to_vec(),
            on_probe: None,
        }
    }

    pub fn with_registry(mut self, registry: VendorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Called with each address before it is probed.
    pub fn on_probe(mut self, callback: ProgressFn) -> Self {
        self.on_probe = Some(callback);
        self
    }

    /// Scans `.1` through `.254` in ascending order and stops at the first
    /// match. `Ok(None)` means the sweep finished without one.
    ///
    /// Silent or refusing hosts are skipped. Any other socket failure aborts
    /// the sweep, since it says nothing about the host being absent.
    pub async fn locate(&self, subnet: Subnet) -> Result<Option<DeviceCandidate>, ProvisionError> {
        for addr in subnet.hosts() {
            if let Some(callback) = &self.on_probe {
                callback(addr);
            }

            let Some(port) = self.first_open_port(addr).await? else {
                continue;
            };

            let mac = self
                .neighbors
                .lookup(addr)
                .await
                .map_err(|e| ProvisionError::NeighborTable {
                    reason: e.to_string(),
                })?;

            let vendor = mac
                .and_then(|mac| self.registry.identify(mac))
                .map(|signature| signature.vendor);

            let candidate = DeviceCandidate {
                addr,
                port,
                mac,
                vendor,
            };

            if candidate.is_target() {
                info!("Found {} adapter at {addr}", vendor.unwrap_or_default());
                return Ok(Some(candidate));
            }

            match mac {
                Some(mac) => debug!(
                    %addr,
                    %mac,
                    vendor = vendor_name(mac).as_deref().unwrap_or("unknown"),
                    "host answered but is not an adapter"
                ),
                None => debug!(%addr, "host answered but has no neighbor entry"),
            }
        }

        Ok(None)
    }

    async fn first_open_port(&self, addr: Ipv4Addr) -> Result<Option<u16>, ProvisionError> {
        for port in &self.ports {
            let target = SocketAddrV4::new(addr, *port);
            match self.prober.probe(target).await {
                Ok(ProbeOutcome::Connected) => return Ok(Some(*port)),
                Ok(_) => {}
                Err(source) => {
                    return Err(ProvisionError::ScanFault {
                        addr: target,
                        source,
                    });
                }
            }
        }
        Ok(None)
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
