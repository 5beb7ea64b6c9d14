use colored::*;

use atacfg_common::network::interface;

use crate::terminal::{colors, format, print};

pub fn interfaces() -> anyhow::Result<()> {
    print::header("local interfaces");

    let assessments = interface::assess_local_interfaces();
    if assessments.is_empty() {
        print::print_status("No network interfaces found");
        return Ok(());
    }

    let mut usable: usize = 0;
    for (idx, assessment) in assessments.iter().enumerate() {
        print::tree_head(idx, &assessment.name);
        match &assessment.verdict {
            Ok(candidate) => {
                usable += 1;
                print::as_tree_one_level(format::interface_details(candidate));
            }
            Err(reason) => print::as_tree_one_level(vec![(
                "Skipped".to_string(),
                reason.to_string().color(colors::WARNING),
            )]),
        }
    }

    print::fat_separator();
    print::centerln(&format!(
        "{} of {} interfaces can reach the adapter",
        usable.to_string().green().bold(),
        assessments.len()
    ));
    Ok(())
}
