use colored::*;
use pnet::util::MacAddr;

use atacfg_common::device::DeviceContext;
use atacfg_common::network::interface::{LinkKind, NetworkInterfaceCandidate};
use atacfg_common::network::mac::vendor_name;
use atacfg_common::plan::ProvisioningPlan;
use atacfg_core::workflow::RunReport;

use crate::terminal::colors;
use crate::terminal::print::Detail;

const MASK: &str = "********";

fn detail(key: &str, value: ColoredString) -> Detail {
    (key.to_string(), value)
}

fn yes_no(value: bool) -> ColoredString {
    if value { "yes".green() } else { "no".normal() }
}

pub fn mac_to_detail(mac: Option<MacAddr>) -> Option<Detail> {
    mac.map(|mac| detail("MAC", mac.to_string().color(colors::MAC_ADDR)))
}

pub fn interface_details(candidate: &NetworkInterfaceCandidate) -> Vec<Detail> {
    let link = match candidate.link {
        LinkKind::Wired => "wired",
        LinkKind::Wireless => "wireless",
    };
    let mut details = vec![
        detail("IPv4", candidate.ipv4.to_string().color(colors::IPV4_ADDR)),
        detail("Link", link.normal()),
    ];
    if !candidate.description.is_empty() {
        details.push(detail("About", candidate.description.normal()));
    }
    if !candidate.gateways.is_empty() {
        let gateways: Vec<String> = candidate.gateways.iter().map(|g| g.to_string()).collect();
        details.push(detail("Gateway", gateways.join(", ").color(colors::IPV4_ADDR)));
    }
    details
}

pub fn context_details(context: &DeviceContext) -> Vec<Detail> {
    let mut details = vec![
        detail("IPv4", context.device.addr.to_string().color(colors::IPV4_ADDR).bold()),
        detail("Port", context.device.port.to_string().normal()),
    ];
    details.extend(mac_to_detail(context.device.mac));
    if let Some(vendor) = context.device.mac.and_then(vendor_name) {
        details.push(detail("Vendor", vendor.normal()));
    }
    details.push(detail("Subnet", context.subnet.to_string().normal()));
    details.push(detail("Via", context.interface.name.color(colors::PRIMARY)));
    details
}

pub fn plan_details(plan: &ProvisioningPlan) -> Vec<Detail> {
    vec![
        detail("Phone", plan.phone().to_string().bold()),
        detail("SIP password", MASK.color(colors::SECRET)),
        detail("Primary server", plan.primary_server().normal()),
        detail(
            "Failover server",
            plan.failover_server().unwrap_or("none").normal(),
        ),
        detail("Admin password", MASK.color(colors::SECRET)),
        detail("Factory reset", yes_no(plan.reset())),
    ]
}

pub fn report_details(report: &RunReport) -> Vec<Detail> {
    let mut details = context_details(&report.device);

    let firmware = match (&report.firmware, report.upgraded_to) {
        (_, Some(target)) => format!("upgraded to {target}").green(),
        (Some(check), None) => match check.device {
            Some(version) => version.to_string().normal(),
            None => "unknown".color(colors::WARNING),
        },
        (None, None) => "not checked".normal(),
    };
    details.push(detail("Firmware", firmware));
    details.push(detail("Reset", yes_no(report.reset)));
    details.push(detail(
        "Verified",
        if report.verified {
            "yes".green()
        } else {
            "no, check manually".color(colors::WARNING)
        },
    ));
    details
}
