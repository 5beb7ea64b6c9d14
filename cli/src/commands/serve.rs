use std::net::SocketAddrV4;
use std::time::Duration;

use colored::*;

use atacfg_common::error::ProvisionError;
use atacfg_core::server::FirmwareServer;

use crate::commands::ServeArgs;
use crate::terminal::print;

pub async fn serve(args: &ServeArgs) -> anyhow::Result<()> {
    print::header("firmware server");

    let addr = SocketAddrV4::new(args.bind, args.port);
    let idle = Duration::from_secs(args.idle_timeout);
    print::print_status(format!(
        "Stops after {} without a request",
        format!("{}s", idle.as_secs()).bold()
    ));

    let report = FirmwareServer::new(&args.dir, addr, idle)
        .run()
        .await
        .map_err(ProvisionError::from)?;

    print::fat_separator();
    print::centerln(&format!(
        "Served {} in {:.0?}",
        format!("{} request(s)", report.requests).green().bold(),
        report.elapsed
    ));
    Ok(())
}
