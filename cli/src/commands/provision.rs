use atacfg_core::assets::DirAssets;
use atacfg_core::server::HttpFirmwareHost;
use atacfg_core::session::ssh::SshConnector;
use atacfg_core::workflow::{Collaborators, ProvisioningWorkflow};

use crate::commands::{ProvisionArgs, lan_discovery};
use crate::operator::{TerminalOperator, TerminalPlanSource};
use crate::terminal::{format, print};

pub async fn provision(args: ProvisionArgs) -> anyhow::Result<()> {
    let config = args.config();
    print::header("provisioning");

    let parts = Collaborators {
        discovery: Box::new(lan_discovery(&config.timings)),
        connector: Box::new(SshConnector::new(config.timings.connect_timeout)),
        firmware: Box::new(HttpFirmwareHost::new(
            &config.assets_dir,
            config.timings.server_idle,
        )),
        assets: Box::new(DirAssets::new(&config.assets_dir)),
        operator: Box::new(TerminalOperator::new(config.assume_yes)),
        plans: Box::new(TerminalPlanSource::new(args.prefill(), config.assume_yes)),
    };

    let report = ProvisioningWorkflow::new(config, parts).run().await?;

    print::header("done");
    print::tree_head(0, report.device.device.vendor.unwrap_or("Adapter"));
    print::as_tree_one_level(format::report_details(&report));
    Ok(())
}
