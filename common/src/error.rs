//! Failure taxonomy and the exit codes scripting callers rely on.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;

use thiserror::Error;

use crate::network::subnet::Subnet;
use crate::plan::PlanError;
use crate::version::FirmwareVersion;

/// One code per fatal category.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const NO_INTERFACE: i32 = 1;
    pub const VERSION_UNKNOWN: i32 = 2;
    pub const MISSING_VERSION_FILE: i32 = 3;
    pub const DEVICE_NOT_FOUND: i32 = 4;
    pub const PORT_IN_USE: i32 = 5;
    pub const PASSWORDS_EXHAUSTED: i32 = 6;
    pub const UPGRADE_MISMATCH: i32 = 7;
    pub const UPGRADE_RECONNECT: i32 = 8;
    pub const SCAN_FAULT: i32 = 9;
    pub const SESSION: i32 = 10;
    pub const SERVER: i32 = 11;
    pub const ABORTED: i32 = 12;
    pub const PLAN: i32 = 13;
}

/// Shell transport failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication rejected")]
    AuthRejected,
    #[error("device unreachable: {0}")]
    Unreachable(#[source] io::Error),
    #[error("shell protocol error: {0}")]
    Protocol(String),
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::AuthRejected)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no network interface reached a gateway")]
    NoInterface,

    #[error("no supported device found on {subnet}")]
    DeviceNotFound { subnet: Subnet },

    #[error("unexpected network fault while probing {addr}")]
    ScanFault {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("could not read the neighbor table: {reason}")]
    NeighborTable { reason: String },

    #[error("the device rejected {attempts} passwords")]
    PasswordsExhausted { attempts: usize },

    #[error("session with {addr} failed")]
    Session {
        addr: Ipv4Addr,
        #[source]
        source: SessionError,
    },

    #[error("device at {addr} did not report its firmware version")]
    VersionUnknown { addr: Ipv4Addr },

    #[error("no usable version file for model {model} in {}", dir.display())]
    MissingVersionFile { model: String, dir: PathBuf },

    #[error("cannot start the update server, something is already listening on {addr}")]
    PortInUse { addr: SocketAddrV4 },

    #[error("update server failed: {reason}")]
    Server { reason: String },

    #[error("device reports {} after the upgrade, expected {expected}", found.map(|v| v.to_string()).unwrap_or_else(|| "no version".into()))]
    UpgradeMismatch {
        expected: FirmwareVersion,
        found: Option<FirmwareVersion>,
    },

    #[error("device at {addr} did not come back after the upgrade")]
    UpgradeReconnect { addr: Ipv4Addr },

    #[error("aborted: {reason}")]
    Aborted { reason: String },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl ProvisionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoInterface => exit_code::NO_INTERFACE,
            Self::VersionUnknown { .. } => exit_code::VERSION_UNKNOWN,
            Self::MissingVersionFile { .. } => exit_code::MISSING_VERSION_FILE,
            Self::DeviceNotFound { .. } => exit_code::DEVICE_NOT_FOUND,
            Self::PortInUse { .. } => exit_code::PORT_IN_USE,
            Self::PasswordsExhausted { .. } => exit_code::PASSWORDS_EXHAUSTED,
            Self::UpgradeMismatch { .. } => exit_code::UPGRADE_MISMATCH,
            Self::UpgradeReconnect { .. } => exit_code::UPGRADE_RECONNECT,
            Self::ScanFault { .. } | Self::NeighborTable { .. } => exit_code::SCAN_FAULT,
            Self::Session { .. } => exit_code::SESSION,
            Self::Server { .. } => exit_code::SERVER,
            Self::Aborted { .. } => exit_code::ABORTED,
            Self::Plan(_) => exit_code::PLAN,
        }
    }

    /// What the operator should do next, when there is something useful to say.
    pub fn guidance(&self) -> Option<String> {
        match self {
            Self::PasswordsExhausted { .. } => Some(
                "The best thing to do from here is factory reset the adapter.\n\
                 Using a pin or paperclip, press and hold the reset button until the\n\
                 lights turn off. Once the globe light turns on, run this tool again."
                    .to_string(),
            ),
            Self::PortInUse { addr } => Some(format!(
                "Please do one of the following:\n\
                 a) stop any running HTTP servers on this machine,\n\
                 b) update the adapter manually, or\n\
                 c) skip the update check with --skip-update.\n\
                 (something answered on port {})",
                addr.port()
            )),
            Self::NoInterface => Some(
                "Make sure this computer is connected to the same network as the adapter."
                    .to_string(),
            ),
            Self::DeviceNotFound { .. } => Some(
                "Make sure the adapter is powered on and connected to this network, then try again."
                    .to_string(),
            ),
            Self::UpgradeMismatch { .. } | Self::UpgradeReconnect { .. } => Some(
                "The firmware upgrade could not be verified. Check the adapter's web page\n\
                 and investigate manually before configuring it."
                    .to_string(),
            ),
            Self::MissingVersionFile { .. } => Some(
                "Add the version file to the assets directory or run without --require-update."
                    .to_string(),
            ),
            _ => None,
        }
    }
}
