pub mod interfaces;
pub mod locate;
pub mod provision;
pub mod serve;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use clap::{ArgAction, Args, Parser, Subcommand};

use atacfg_common::config::{Config, Timings, UpdatePolicy};
use atacfg_common::device::DeviceContext;
use atacfg_common::error::ProvisionError;
use atacfg_common::operator::Operator;
use atacfg_core::discovery::{DeviceDiscovery, LanDiscovery};

use crate::operator::PlanPrefill;
use crate::terminal::spinner;

#[derive(Parser)]
#[command(name = "atacfg")]
#[command(version, about = "Find, update and configure a Grandstream analog telephone adapter.")]
pub struct CommandLine {
    /// More log detail (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Skip the banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the adapter, update its firmware and configure it
    #[command(alias = "p")]
    Provision(ProvisionArgs),
    /// Find the adapter and show where it is
    #[command(alias = "l")]
    Locate(LocateArgs),
    /// List local interfaces and why each one is used or skipped
    #[command(alias = "i")]
    Interfaces,
    /// Host a firmware directory until nothing has asked for a while
    #[command(alias = "s")]
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// Directory holding <model>fw.bin and version-<model>
    #[arg(long, default_value = "assets")]
    pub assets: PathBuf,

    /// Port the firmware server listens on
    #[arg(long, default_value_t = 80)]
    pub port: u16,

    /// Admin password the adapter currently accepts
    #[arg(long, default_value = "admin")]
    pub password: String,

    /// Do not look for or install firmware updates
    #[arg(long, conflicts_with = "require_update")]
    pub skip_update: bool,

    /// Always update, and fail when the version cannot be determined
    #[arg(long)]
    pub require_update: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Seconds without a request before the firmware server stops
    #[arg(long, default_value_t = 45)]
    pub idle_timeout: u64,

    /// Phone number, 10 or 11 digits
    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub sip_password: Option<String>,

    #[arg(long)]
    pub primary_server: Option<String>,

    #[arg(long)]
    pub failover_server: Option<String>,

    /// New admin password for the adapter
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Factory reset before configuring
    #[arg(long)]
    pub reset: bool,
}

impl ProvisionArgs {
    pub fn config(&self) -> Config {
        let update = if self.skip_update {
            UpdatePolicy::Skip
        } else if self.require_update {
            UpdatePolicy::Require
        } else {
            UpdatePolicy::Ask
        };

        Config {
            assets_dir: self.assets.clone(),
            server_port: self.port,
            initial_password: self.password.clone(),
            update,
            assume_yes: self.yes,
            timings: Timings {
                server_idle: Duration::from_secs(self.idle_timeout),
                ..Timings::default()
            },
            ..Config::default()
        }
    }

    pub fn prefill(&self) -> PlanPrefill {
        PlanPrefill {
            phone: self.phone.clone(),
            sip_password: self.sip_password.clone(),
            primary_server: self.primary_server.clone(),
            failover_server: self.failover_server.clone(),
            admin_password: self.admin_password.clone(),
            reset: self.reset,
        }
    }
}

#[derive(Args)]
pub struct LocateArgs {
    /// Use the first interface whose gateway answers
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Directory to serve
    #[arg(default_value = "assets")]
    pub dir: PathBuf,

    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub bind: Ipv4Addr,

    #[arg(long, default_value_t = 80)]
    pub port: u16,

    /// Seconds without a request before stopping
    #[arg(long, default_value_t = 45)]
    pub idle_timeout: u64,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// LAN discovery that drives the scan spinner and clears it when done.
pub struct SpinningDiscovery<D>(D);

#[async_trait]
impl<D: DeviceDiscovery> DeviceDiscovery for SpinningDiscovery<D> {
    async fn discover(&self, operator: &dyn Operator) -> Result<DeviceContext, ProvisionError> {
        let result = self.0.discover(operator).await;
        spinner::finish();
        result
    }
}

pub fn lan_discovery(timings: &Timings) -> SpinningDiscovery<impl DeviceDiscovery + use<>> {
    SpinningDiscovery(LanDiscovery::local(
        timings,
        Some(Box::new(spinner::report_scan_progress)),
    ))
}
