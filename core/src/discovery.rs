//! # Device Discovery
//!
//! Ties interface selection and the subnet sweep together into the first
//! stage of a provisioning run.

use async_trait::async_trait;
use tracing::info;

use atacfg_common::config::Timings;
use atacfg_common::device::DeviceContext;
use atacfg_common::error::ProvisionError;
use atacfg_common::network::interface::{self, NetworkInterfaceCandidate};
use atacfg_common::network::subnet::Subnet;
use atacfg_common::operator::Operator;

use crate::arp::{ArpResolver, NeighborTable};
use crate::locator::{DeviceLocator, ProgressFn};
use crate::network::tcp::{PortProber, TcpProber};
use crate::selector::InterfaceSelector;

type CandidateSource = Box<dyn Fn() -> Vec<NetworkInterfaceCandidate> + Send + Sync>;

#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    async fn discover(&self, operator: &dyn Operator) -> Result<DeviceContext, ProvisionError>;
}

/// Discovery over the machine's own interfaces.
pub struct LanDiscovery<P, N> {
    selector: InterfaceSelector<P>,
    locator: DeviceLocator<P, N>,
    candidates: CandidateSource,
}

impl LanDiscovery<TcpProber, ArpResolver> {
    pub fn local(timings: &Timings, on_probe: Option<ProgressFn>) -> Self {
        let prober = TcpProber::new(timings.probe_timeout);
        let mut locator = DeviceLocator::new(prober, ArpResolver);
        if let Some(callback) = on_probe {
            locator = locator.on_probe(callback);
        }

        Self::new(
            InterfaceSelector::new(prober),
            locator,
            Box::new(interface::local_candidates),
        )
    }
}

impl<P: PortProber, N: NeighborTable> LanDiscovery<P, N> {
    pub fn new(
        selector: InterfaceSelector<P>,
        locator: DeviceLocator<P, N>,
        candidates: CandidateSource,
    ) -> Self {
        Self {
            selector,
            locator,
            candidates,
        }
    }
}

#[async_trait]
impl<P: PortProber, N: NeighborTable> DeviceDiscovery for LanDiscovery<P, N> {
    async fn discover(&self, operator: &dyn Operator) -> Result<DeviceContext, ProvisionError> {
        let interface = self.selector.select((self.candidates)(), operator).await?;
        let subnet = Subnet::containing(interface.ipv4);

        info!("Scanning {subnet} through {}", interface.name);
        let device = self
            .locator
            .locate(subnet)
            .await?
            .ok_or(ProvisionError::DeviceNotFound { subnet })?;

        Ok(DeviceContext {
            interface,
            subnet,
            device,
        })
    }
}
