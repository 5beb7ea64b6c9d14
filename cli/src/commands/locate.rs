use std::time::Instant;

use colored::*;

use atacfg_common::config::Timings;
use atacfg_core::discovery::DeviceDiscovery;

use crate::commands::{LocateArgs, lan_discovery};
use crate::operator::TerminalOperator;
use crate::terminal::{format, print};

pub async fn locate(args: &LocateArgs) -> anyhow::Result<()> {
    print::header("looking for the adapter");

    let operator = TerminalOperator::new(args.yes);
    let started = Instant::now();
    let context = lan_discovery(&Timings::default()).discover(&operator).await?;

    print::header("adapter found");
    print::tree_head(0, context.device.vendor.unwrap_or("Adapter"));
    print::as_tree_one_level(format::context_details(&context));

    let elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()).bold().yellow();
    print::fat_separator();
    print::centerln(&format!("Located in {elapsed}"));
    Ok(())
}
