//! IPv4 to MAC resolution through the operating system's neighbor cache.
//!
//! The table is read fresh on every lookup: a successful connect is what puts
//! the device into the cache, so a cached snapshot would always be stale.

use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use async_trait::async_trait;
use pnet::util::MacAddr;
use regex_lite::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use atacfg_common::network::mac::parse_mac;

/// `192.168.1.1  c0-74-ad-11-22-33` (Windows) and
/// `? (192.168.1.1) at c0:74:ad:11:22:33 [ether] on eth0` (Linux, BSD).
const ARP_LINE: &str = r"(?i)(?P<ip>\d{1,3}(?:\.\d{1,3}){3})\)?\s+(?:at\s+)?(?P<mac>[0-9a-f]{1,2}(?:[:-][0-9a-f]{1,2}){5})";

fn arp_line() -> &'static Regex {
    static ARP_RE: OnceLock<Regex> = OnceLock::new();
    ARP_RE.get_or_init(|| Regex::new(ARP_LINE).expect("ARP_LINE is a valid pattern"))
}

#[derive(Debug, Error)]
pub enum ArpError {
    #[error("failed to run `arp`: {0}")]
    Spawn(#[source] io::Error),
    #[error("`arp` exited with {0}")]
    Failed(std::process::ExitStatus),
}

#[async_trait]
pub trait NeighborTable: Send + Sync {
    /// `Ok(None)` when the address has no complete entry.
    async fn lookup(&self, addr: Ipv4Addr) -> Result<Option<MacAddr>, ArpError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArpResolver;

impl ArpResolver {
    pub async fn snapshot(&self) -> Result<HashMap<Ipv4Addr, MacAddr>, ArpError> {
        match Command::new("arp").args(arp_args()).output().await {
            Ok(output) if output.status.success() => {
                Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => Err(ArpError::Failed(output.status)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => proc_fallback(err).await,
            Err(err) => Err(ArpError::Spawn(err)),
        }
    }
}

#[async_trait]
impl NeighborTable for ArpResolver {
    async fn lookup(&self, addr: Ipv4Addr) -> Result<Option<MacAddr>, ArpError> {
        let table = self.snapshot().await?;
        let mac = table.get(&addr).copied();
        debug!(%addr, mac = ?mac.map(|m| m.to_string()), "neighbor lookup");
        Ok(mac)
    }
}

/// Numeric output elsewhere, so reverse DNS cannot garble the address column.
fn arp_args() -> &'static [&'static str] {
    if cfg!(windows) { &["-a"] } else { &["-an"] }
}

#[cfg(target_os = "linux")]
async fn proc_fallback(_err: io::Error) -> Result<HashMap<Ipv4Addr, MacAddr>, ArpError> {
    let contents = tokio::fs::read_to_string("/proc/net/arp")
        .await
        .map_err(ArpError::Spawn)?;
    Ok(parse_proc_arp(&contents))
}

#[cfg(not(target_os = "linux"))]
async fn proc_fallback(err: io::Error) -> Result<HashMap<Ipv4Addr, MacAddr>, ArpError> {
    Err(ArpError::Spawn(err))
}

pub fn parse_arp_output(output: &str) -> HashMap<Ipv4Addr, MacAddr> {
    arp_line()
        .captures_iter(output)
        .filter_map(|caps| {
            let ip: Ipv4Addr = caps.name("ip")?.as_str().parse().ok()?;
            let mac = parse_mac(caps.name("mac")?.as_str())?;
            Some((ip, mac))
        })
        .filter(|(_, mac)| !mac.is_zero())
        .collect()
}

/// `/proc/net/arp`: address, hw type, flags, hw address, mask, device.
pub fn parse_proc_arp(contents: &str) -> HashMap<Ipv4Addr, MacAddr> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || fields[2] == "0x0" {
                return None;
            }
            let ip: Ipv4Addr = fields[0].parse().ok()?;
            let mac = parse_mac(fields[3])?;
            Some((ip, mac))
        })
        .filter(|(_, mac)| !mac.is_zero())
        .collect()
}
