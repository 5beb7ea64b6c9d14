//! # Provisioning Workflow
//!
//! Drives one adapter from discovery to a verified configuration:
//!
//! `Discovering → Connecting → CheckingVersion → [Upgrading] → CollectingPlan
//! → Applying → VerifyingReboot → Done`, or `Failed` from any step.
//!
//! Every capability arrives as a trait object, so the same state machine runs
//! against real sockets or against in-memory fakes.

use std::net::Ipv4Addr;

use tracing::{debug, error, info, warn};

use atacfg_common::config::{Config, MAX_PASSWORD_ATTEMPTS, UpdatePolicy};
use atacfg_common::device::DeviceContext;
use atacfg_common::error::{ProvisionError, SessionError};
use atacfg_common::operator::{Operator, PlanSource};
use atacfg_common::plan::PasswordPolicy;
use atacfg_common::script::CommandScript;
use atacfg_common::version::{
    DeviceStatus, FirmwareCheckResult, FirmwareVersion, VersionComparison,
};

use crate::assets::FirmwareAssets;
use crate::discovery::DeviceDiscovery;
use crate::server::FirmwareHost;
use crate::session::{
    Credentials, ReconnectPolicy, RemoteSession, ShellConnector, establish, reconnect,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovering,
    Connecting,
    CheckingVersion,
    Upgrading,
    CollectingPlan,
    Applying,
    VerifyingReboot,
    Done,
    Failed,
}

pub struct Collaborators {
    pub discovery: Box<dyn DeviceDiscovery>,
    pub connector: Box<dyn ShellConnector>,
    pub firmware: Box<dyn FirmwareHost>,
    pub assets: Box<dyn FirmwareAssets>,
    pub operator: Box<dyn Operator>,
    pub plans: Box<dyn PlanSource>,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub device: DeviceContext,
    pub firmware: Option<FirmwareCheckResult>,
    pub upgraded_to: Option<FirmwareVersion>,
    pub reset: bool,
    /// The adapter came back with the new admin password after configuring.
    pub verified: bool,
    pub stages: Vec<Stage>,
}

impl RunReport {
    fn new(device: DeviceContext) -> Self {
        Self {
            device,
            firmware: None,
            upgraded_to: None,
            reset: false,
            verified: false,
            stages: Vec::new(),
        }
    }
}

pub struct ProvisioningWorkflow {
    config: Config,
    parts: Collaborators,
    stages: Vec<Stage>,
}

impl ProvisioningWorkflow {
    pub fn new(config: Config, parts: Collaborators) -> Self {
        Self {
            config,
            parts,
            stages: Vec::new(),
        }
    }

    /// Runs to completion or to the first fatal error. The shell session is
    /// closed on both paths.
    pub async fn run(mut self) -> Result<RunReport, ProvisionError> {
        let mut session = None;
        let result = self.drive(&mut session).await;

        if let Some(mut session) = session.take() {
            session.close().await;
        }

        match result {
            Ok(mut report) => {
                self.enter(Stage::Done);
                report.stages = self.stages;
                Ok(report)
            }
            Err(e) => {
                self.enter(Stage::Failed);
                error!("Provisioning failed: {e}");
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(?stage, "stage");
        self.stages.push(stage);
    }

    async fn drive(&mut self, slot: &mut Option<RemoteSession>) -> Result<RunReport, ProvisionError> {
        self.enter(Stage::Discovering);
        let context = self
            .parts
            .discovery
            .discover(self.parts.operator.as_ref())
            .await?;
        let addr = context.device_addr();
        info!("Adapter found at {addr}");

        self.enter(Stage::Connecting);
        let initial = Credentials::new(&self.config.username, &self.config.initial_password);
        *slot = Some(self.establish(addr, initial).await?);
        info!("Connected to {addr}");

        let mut report = RunReport::new(context.clone());

        // The running version decides the password policy, so it is read
        // even when the update is skipped.
        self.enter(Stage::CheckingVersion);
        let status = connected(slot, addr)?
            .query_status(self.config.timings.status_window)
            .await
            .map_err(|source| ProvisionError::Session { addr, source })?;
        let mut running = status.version;

        if self.config.update == UpdatePolicy::Skip {
            match running {
                Some(version) => info!("The adapter runs {version}, firmware update skipped"),
                None => info!("Firmware update skipped"),
            }
        } else {
            let check = self.check_version(status, addr)?;

            if check.outcome == VersionComparison::NeedsUpgrade && self.consents_to_upgrade(&check) {
                if let Some(target) = check.latest {
                    self.enter(Stage::Upgrading);
                    self.upgrade(slot, &context, target).await?;
                    running = Some(target);
                    report.upgraded_to = Some(target);
                }
            }
            report.firmware = Some(check);
        }

        self.enter(Stage::CollectingPlan);
        let policy = PasswordPolicy::for_version(running, self.config.strict_password_since);
        let plan = self.parts.plans.collect(&policy)?;

        let delays = self.config.timings.script_delays();

        if plan.reset() {
            self.enter(Stage::Applying);
            info!("Resetting the adapter to factory defaults");
            let previous = self.apply(slot, addr, &CommandScript::reset(&delays)).await?;

            self.enter(Stage::VerifyingReboot);
            let factory = previous.with_password(&self.config.default_password);
            *slot = self.await_reboot(addr, &factory, &previous).await;
            if slot.is_none() {
                warn!("The adapter did not come back after the reset, trying the factory password");
                *slot = Some(self.establish(addr, factory).await?);
            }
            report.reset = true;
        }

        self.enter(Stage::Applying);
        info!("Applying the configuration");
        let previous = self
            .apply(slot, addr, &CommandScript::configure(&plan, &delays))
            .await?;

        self.enter(Stage::VerifyingReboot);
        let updated = previous.with_password(plan.admin_password());
        *slot = self.await_reboot(addr, &updated, &previous).await;
        report.verified = slot
            .as_ref()
            .is_some_and(|session| session.credentials() == &updated);

        match slot {
            Some(_) if report.verified => info!("The adapter is back with its new configuration"),
            Some(_) => warn!("The adapter came back but still accepts the old admin password"),
            None => warn!("Could not reconnect after configuring; the settings were sent, check the adapter manually"),
        }

        Ok(report)
    }

    async fn establish(
        &self,
        addr: Ipv4Addr,
        credentials: Credentials,
    ) -> Result<RemoteSession, ProvisionError> {
        establish(
            self.parts.connector.as_ref(),
            self.parts.operator.as_ref(),
            addr,
            credentials,
            MAX_PASSWORD_ATTEMPTS,
        )
        .await
    }

    fn check_version(
        &self,
        status: DeviceStatus,
        addr: Ipv4Addr,
    ) -> Result<FirmwareCheckResult, ProvisionError> {
        let require = self.config.update == UpdatePolicy::Require;
        if require && status.version.is_none() {
            return Err(ProvisionError::VersionUnknown { addr });
        }

        let latest = match status.model.as_deref() {
            Some(model) => self.latest_for(model, require)?,
            None if require => return Err(ProvisionError::VersionUnknown { addr }),
            None => None,
        };

        let check = FirmwareCheckResult::evaluate(latest, status);
        match (check.outcome, check.device, check.latest) {
            (VersionComparison::NeedsUpgrade, Some(device), Some(latest)) => {
                info!("The adapter runs {device}, {latest} is available")
            }
            (VersionComparison::Unknown, ..) => {
                warn!("The adapter did not report its firmware version, skipping the update")
            }
            (_, Some(device), _) => info!("Firmware {device} is up to date"),
            _ => info!("No firmware update to offer"),
        }
        Ok(check)
    }

    fn latest_for(
        &self,
        model: &str,
        require: bool,
    ) -> Result<Option<FirmwareVersion>, ProvisionError> {
        let missing = || ProvisionError::MissingVersionFile {
            model: model.to_string(),
            dir: self.parts.assets.root().to_path_buf(),
        };

        match self.parts.assets.latest_version(model) {
            Ok(Some(version)) => Ok(Some(version)),
            Ok(None) if require => Err(missing()),
            Ok(None) => {
                info!("No firmware on file for {model}");
                Ok(None)
            }
            Err(e) if require => {
                error!("{e}");
                Err(missing())
            }
            Err(e) => {
                warn!("{e}, skipping the update");
                Ok(None)
            }
        }
    }

    fn consents_to_upgrade(&self, check: &FirmwareCheckResult) -> bool {
        match self.config.update {
            UpdatePolicy::Always | UpdatePolicy::Require => true,
            UpdatePolicy::Skip => false,
            UpdatePolicy::Ask => {
                let question = match (check.device, check.latest) {
                    (Some(device), Some(latest)) => {
                        format!("Upgrade the adapter from {device} to {latest}?")
                    }
                    _ => "Upgrade the adapter firmware?".to_string(),
                };
                self.parts.operator.confirm(&question)
            }
        }
    }

    async fn upgrade(
        &mut self,
        slot: &mut Option<RemoteSession>,
        context: &DeviceContext,
        target: FirmwareVersion,
    ) -> Result<(), ProvisionError> {
        let addr = context.device_addr();
        let server = context.server_addr(self.config.server_port);
        self.parts.firmware.ensure_available(server).await?;

        info!("Upgrading to {target} from {server}");
        let delays = self.config.timings.script_delays();
        let previous = self
            .apply(slot, addr, &CommandScript::upgrade(server, &delays))
            .await?;

        let served = self.parts.firmware.serve(server).await?;
        if served.requests == 0 {
            warn!("The adapter never contacted the update server");
        }

        self.enter(Stage::VerifyingReboot);
        *slot = self.await_reboot(addr, &previous, &previous).await;
        let status = slot
            .as_mut()
            .ok_or(ProvisionError::UpgradeReconnect { addr })?
            .query_status(self.config.timings.status_window)
            .await
            .map_err(|source| ProvisionError::Session { addr, source })?;

        if status.version != Some(target) {
            return Err(ProvisionError::UpgradeMismatch {
                expected: target,
                found: status.version,
            });
        }
        info!("The adapter now runs {target}");
        Ok(())
    }

    /// Sends `script`, then closes the session since the script ends in a
    /// reboot. Returns the credentials the session was opened with.
    async fn apply(
        &self,
        slot: &mut Option<RemoteSession>,
        addr: Ipv4Addr,
        script: &CommandScript,
    ) -> Result<Credentials, ProvisionError> {
        let session = connected(slot, addr)?;
        session
            .run_script(script)
            .await
            .map_err(|source| ProvisionError::Session { addr, source })?;

        let credentials = session.credentials().clone();
        session.close().await;
        *slot = None;
        Ok(credentials)
    }

    /// `expected` is what the last script set; `previous` is what the session
    /// used before it. The factory password is tried last.
    async fn await_reboot(
        &self,
        addr: Ipv4Addr,
        expected: &Credentials,
        previous: &Credentials,
    ) -> Option<RemoteSession> {
        let factory = previous.with_password(&self.config.default_password);
        let mut candidates: Vec<Credentials> = Vec::with_capacity(3);
        for credentials in [expected, previous, &factory] {
            if !candidates.contains(credentials) {
                candidates.push(credentials.clone());
            }
        }

        info!("Waiting for the adapter to restart");
        reconnect(
            self.parts.connector.as_ref(),
            addr,
            &candidates,
            ReconnectPolicy::from(&self.config.timings),
        )
        .await
    }
}

fn connected(
    slot: &mut Option<RemoteSession>,
    addr: Ipv4Addr,
) -> Result<&mut RemoteSession, ProvisionError> {
    slot.as_mut().ok_or(ProvisionError::Session {
        addr,
        source: SessionError::Closed,
    })
}
