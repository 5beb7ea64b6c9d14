//! Shell command scripts.
//!
//! The device's management shell never acknowledges a command, so a script is
//! just an ordered list of lines, each followed by a fixed pause.

use std::net::SocketAddrV4;
use std::time::Duration;

use crate::plan::ProvisioningPlan;

pub const TIME_ZONE: &str = "EST5EDT";
pub const NO_KEY_TIMEOUT: u8 = 4;

/// Keys whose values are credentials and must not reach the logs.
const SECRET_KEYS: &[&str] = &["2", "34", "196"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptDelays {
    /// Pause after an ordinary command.
    pub command: Duration,
    /// Pause after reset-related commands. Going faster corrupts the
    /// device's credential store.
    pub reset: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub command: String,
    pub delay: Duration,
    /// Progress note logged before the command is sent.
    pub milestone: Option<&'static str>,
}

impl ScriptStep {
    fn new(command: impl Into<String>, delay: Duration) -> Self {
        Self {
            command: command.into(),
            delay,
            milestone: None,
        }
    }

    /// The command with credential values masked.
    pub fn redacted(&self) -> String {
        let mut words = self.command.splitn(3, ' ');
        match (words.next(), words.next(), words.next()) {
            (Some("set"), Some(key), Some(_)) if SECRET_KEYS.contains(&key) => {
                format!("set {key} ********")
            }
            _ => self.command.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Upgrade,
    Reset,
    Configure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    kind: ScriptKind,
    steps: Vec<ScriptStep>,
}

impl CommandScript {
    /// Points the device at `server` over HTTP and starts the upgrade.
    pub fn upgrade(server: SocketAddrV4, delays: &ScriptDelays) -> Self {
        let commands = [
            "config".to_string(),
            "set 212 1".to_string(),
            format!("set 192 {server}"),
            "commit".to_string(),
            "exit".to_string(),
            "upgrade".to_string(),
            "upgrade".to_string(),
            "y".to_string(),
        ];
        Self {
            kind: ScriptKind::Upgrade,
            steps: commands
                .into_iter()
                .map(|command| ScriptStep::new(command, delays.command))
                .collect(),
        }
    }

    pub fn reset(delays: &ScriptDelays) -> Self {
        Self {
            kind: ScriptKind::Reset,
            steps: vec![
                ScriptStep::new("reset 0", delays.reset),
                ScriptStep::new("y", delays.reset),
            ],
        }
    }

    pub fn configure(plan: &ProvisioningPlan, delays: &ScriptDelays) -> Self {
        let admin = plan.admin_password();
        let phone = plan.phone().as_str();

        let mut steps: Vec<ScriptStep> = Vec::new();
        let mut push = |command: String, milestone: Option<&'static str>| {
            let mut step = ScriptStep::new(command, delays.command);
            step.milestone = milestone;
            steps.push(step);
        };

        push("config".into(), None);
        // credentials and local administration
        push(format!("set 196 {admin}"), Some("Setting login credentials, time zone..."));
        push("set 276 0".into(), None);
        push(format!("set 64 {TIME_ZONE}"), None);
        push(format!("set 2 {admin}"), None);
        push("set 88 0".into(), None);
        push("set 277 1".into(), None);
        // SIP account
        push(format!("set 47 {}", plan.primary_server()), Some("Setting SIP server settings..."));
        if let Some(failover) = plan.failover_server() {
            push(format!("set 967 {failover}"), None);
        }
        push("set 52 2".into(), None);
        push(format!("set 35 {phone}"), None);
        push(format!("set 36 {phone}"), None);
        push(format!("set 34 {}", plan.sip_password()), None);
        push("set 109 0".into(), None);
        push("set 20501 1".into(), None);
        push("set 20505 5".into(), None);
        push("set 288 1".into(), None);
        push("set 243 1".into(), None);
        push("set 2339 0".into(), None);
        // DTMF payload types
        push("set 850 101".into(), Some("Setting local dialer settings..."));
        push("set 851 100".into(), None);
        push("set 852 102".into(), None);
        // dialer
        push("set 191 0".into(), None);
        push(format!("set 85 {NO_KEY_TIMEOUT}"), None);
        push("set 29 0".into(), None);
        // vocoders 1-9
        for (key, value) in [(57, 0), (58, 18), (59, 0), (60, 0), (61, 0), (62, 0), (63, 0), (98, 0), (46, 0)] {
            push(format!("set {key} {value}"), None);
        }
        push("commit".into(), Some("Saving changes and rebooting..."));
        push("exit".into(), None);
        push("reboot".into(), None);

        Self {
            kind: ScriptKind::Configure,
            steps,
        }
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.command.as_str())
    }
}
