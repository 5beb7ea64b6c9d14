use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::terminal::colors;

static ACTIVE: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn new_spinner() -> ProgressBar {
    let pb: ProgressBar = ProgressBar::new_spinner();
    let style: ProgressStyle = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows the address being probed, starting the spinner on first use.
pub fn report_scan_progress(addr: Ipv4Addr) {
    let Ok(mut active) = ACTIVE.lock() else {
        return;
    };
    let pb = active.get_or_insert_with(new_spinner);
    pb.set_message(
        format!(
            "Probing {}",
            addr.to_string().color(colors::IPV4_ADDR).bold()
        )
        .color(colors::TEXT_DEFAULT)
        .to_string(),
    );
}

pub fn finish() {
    if let Ok(mut active) = ACTIVE.lock() {
        if let Some(pb) = active.take() {
            pb.finish_and_clear();
        }
    }
}

/// Routes log output above a running spinner instead of through it.
pub struct SpinnerWriter;

impl std::io::Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf);
        let msg = msg.trim_end();
        let active = ACTIVE.lock().ok().and_then(|active| active.clone());
        match active {
            Some(pb) => pb.println(msg),
            None => println!("{msg}"),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
