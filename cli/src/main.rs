mod commands;
mod operator;
mod terminal;

use atacfg_common::error::{ProvisionError, exit_code};
use colored::*;
use commands::{CommandLine, Commands, interfaces, locate, provision, serve};
use terminal::{logging, print};

#[tokio::main]
async fn main() {
    let cli = CommandLine::parse_args();
    logging::init(cli.verbose);
    print::banner(cli.quiet);

    if let Err(err) = run(cli).await {
        std::process::exit(report_failure(&err));
    }
    print::end_of_program();
}

async fn run(cli: CommandLine) -> anyhow::Result<()> {
    match cli.command {
        Commands::Provision(args) => provision::provision(args).await,
        Commands::Locate(args) => locate::locate(&args).await,
        Commands::Interfaces => interfaces::interfaces(),
        Commands::Serve(args) => serve::serve(&args).await,
    }
}

fn report_failure(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ProvisionError>() {
        Some(failure) => {
            tracing::error!("{failure}");
            if let Some(guidance) = failure.guidance() {
                print::fat_separator();
                for line in guidance.lines() {
                    print::print_status(line.yellow().to_string());
                }
            }
            failure.exit_code()
        }
        None => {
            tracing::error!("{err:#}");
            exit_code::ABORTED
        }
    }
}
