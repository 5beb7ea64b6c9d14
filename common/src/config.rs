use std::path::PathBuf;
use std::time::Duration;

use crate::script::ScriptDelays;
use crate::version::FirmwareVersion;

/// Host octets tried when looking for a gateway behind an interface.
pub const GATEWAY_OCTETS: [u8; 6] = [0, 1, 2, 3, 50, 254];
/// Ports the device's web UI listens on.
pub const SCAN_PORTS: [u16; 2] = [80, 443];
pub const GATEWAY_PORT: u16 = 80;
pub const MAX_PASSWORD_ATTEMPTS: usize = 3;
pub const USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";
/// First firmware that enforces the admin password complexity rule.
pub const STRICT_PASSWORD_SINCE: FirmwareVersion = FirmwareVersion::new(1, 0, 19, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Ask the operator before upgrading.
    Ask,
    /// Upgrade without asking when the device is behind.
    Always,
    /// Read the running version but never look for or install an update.
    Skip,
    /// Upgrade without asking, and treat missing version metadata as fatal.
    Require,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `<model>fw.bin` and `version-<model>`.
    pub assets_dir: PathBuf,
    /// Port the firmware server binds on the selected interface.
    pub server_port: u16,
    pub username: String,
    /// Factory credential, tried again after a reset.
    pub default_password: String,
    /// First password tried when connecting.
    pub initial_password: String,
    pub update: UpdatePolicy,
    /// Answer every confirmation with yes.
    pub assume_yes: bool,
    pub strict_password_since: FirmwareVersion,
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            server_port: 80,
            username: USERNAME.to_string(),
            default_password: DEFAULT_PASSWORD.to_string(),
            initial_password: DEFAULT_PASSWORD.to_string(),
            update: UpdatePolicy::Ask,
            assume_yes: false,
            strict_password_since: STRICT_PASSWORD_SINCE,
            timings: Timings::default(),
        }
    }
}

/// Every delay and bound the run observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Budget for a single scan or gateway connect.
    pub probe_timeout: Duration,
    /// Budget for opening a shell session.
    pub connect_timeout: Duration,
    /// How long the shell is read for after `status`.
    pub status_window: Duration,
    pub command_delay: Duration,
    pub reset_delay: Duration,
    /// Wait after a reboot-causing script before polling.
    pub settle: Duration,
    pub reconnect_interval: Duration,
    pub reconnect_attempts: u32,
    /// The firmware server stops after this long without a request.
    pub server_idle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(20),
            connect_timeout: Duration::from_secs(5),
            status_window: Duration::from_millis(200),
            command_delay: Duration::from_millis(100),
            reset_delay: Duration::from_secs(3),
            settle: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(2),
            reconnect_attempts: 60,
            server_idle: Duration::from_secs(45),
        }
    }
}

impl Timings {
    pub fn script_delays(&self) -> ScriptDelays {
        ScriptDelays {
            command: self.command_delay,
            reset: self.reset_delay,
        }
    }
}
