//! Interactive answers for the workflow, backed by `dialoguer`.

use colored::*;
use dialoguer::{Confirm, Input, Password};
use tracing::{info, warn};

use atacfg_common::config::MAX_PASSWORD_ATTEMPTS;
use atacfg_common::error::ProvisionError;
use atacfg_common::operator::{Operator, PlanSource};
use atacfg_common::plan::{
    PASSWORD_MAX_LEN, PASSWORD_MIN_LEN, PasswordPolicy, PhoneNumber, PlanDraft, PlanError,
    ProvisioningPlan,
};

use crate::terminal::{format, print};

fn aborted(err: dialoguer::Error) -> ProvisionError {
    ProvisionError::Aborted {
        reason: err.to_string(),
    }
}

pub struct TerminalOperator {
    assume_yes: bool,
}

impl TerminalOperator {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            info!("{question} {}", "yes".green());
            return true;
        }
        Confirm::new()
            .with_prompt(question)
            .default(true)
            .interact()
            .unwrap_or(false)
    }

    fn password(&self, attempt: usize) -> Option<String> {
        Password::new()
            .with_prompt(format!(
                "Admin password ({} of {MAX_PASSWORD_ATTEMPTS})",
                attempt + 1
            ))
            .interact()
            .ok()
    }
}

/// Plan values given on the command line. Anything missing or invalid is
/// asked for.
#[derive(Debug, Clone, Default)]
pub struct PlanPrefill {
    pub phone: Option<String>,
    pub sip_password: Option<String>,
    pub primary_server: Option<String>,
    pub failover_server: Option<String>,
    pub admin_password: Option<String>,
    pub reset: bool,
}

pub struct TerminalPlanSource {
    prefill: PlanPrefill,
    assume_yes: bool,
}

impl TerminalPlanSource {
    pub fn new(prefill: PlanPrefill, assume_yes: bool) -> Self {
        Self { prefill, assume_yes }
    }

    fn draft(&self, prefill: &PlanPrefill, policy: &PasswordPolicy) -> Result<PlanDraft, ProvisionError> {
        let phone = text("Phone number", prefill.phone.as_deref(), false, |value| {
            PhoneNumber::normalize(value).map(|_| ())
        })?;
        let sip_password = secret("SIP password", prefill.sip_password.as_deref(), |value| {
            non_empty(value, "SIP password")
        })?;
        let primary_server = text("Primary SIP server", prefill.primary_server.as_deref(), false, |value| {
            non_empty(value.trim(), "primary server")
        })?;
        let failover_server = text(
            "Failover SIP server (optional)",
            prefill.failover_server.as_deref(),
            true,
            |_| Ok(()),
        )?;

        if policy.strict {
            print::print_status(format!(
                "The new admin password needs {PASSWORD_MIN_LEN} to {PASSWORD_MAX_LEN} characters \
                 including a digit, upper and lower case letters and a symbol"
            ));
        }
        let admin_password = secret("New admin password", prefill.admin_password.as_deref(), |value| {
            policy.validate(value)
        })?;

        let reset = prefill.reset
            || (!self.assume_yes
                && Confirm::new()
                    .with_prompt("Factory reset the adapter before configuring it?")
                    .default(false)
                    .interact()
                    .map_err(aborted)?);

        Ok(PlanDraft {
            phone,
            sip_password,
            primary_server,
            failover_server,
            admin_password,
            reset,
        })
    }
}

impl PlanSource for TerminalPlanSource {
    fn collect(&self, policy: &PasswordPolicy) -> Result<ProvisioningPlan, ProvisionError> {
        let mut prefill = self.prefill.clone();
        loop {
            let plan = self.draft(&prefill, policy)?.validate(policy)?;

            print::header("settings to apply");
            print::as_tree_one_level(format::plan_details(&plan));

            if self.assume_yes {
                return Ok(plan);
            }
            let accepted = Confirm::new()
                .with_prompt("Apply these settings?")
                .default(true)
                .interact()
                .map_err(aborted)?;
            if accepted {
                return Ok(plan);
            }
            prefill = PlanPrefill::default();
        }
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<(), PlanError> {
    if value.is_empty() {
        Err(PlanError::Missing(field))
    } else {
        Ok(())
    }
}

fn text<F>(prompt: &str, preset: Option<&str>, optional: bool, check: F) -> Result<String, ProvisionError>
where
    F: Fn(&str) -> Result<(), PlanError>,
{
    if let Some(value) = preset {
        match check(value) {
            Ok(()) => return Ok(value.to_string()),
            Err(e) => warn!("{prompt}: {e}"),
        }
    }

    Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(optional)
        .validate_with(|value: &String| check(value).map_err(|e| e.to_string()))
        .interact_text()
        .map_err(aborted)
}

fn secret<F>(prompt: &str, preset: Option<&str>, check: F) -> Result<String, ProvisionError>
where
    F: Fn(&str) -> Result<(), PlanError>,
{
    if let Some(value) = preset {
        match check(value) {
            Ok(()) => return Ok(value.to_string()),
            Err(e) => warn!("{prompt}: {e}"),
        }
    }

    loop {
        let value = Password::new()
            .with_prompt(prompt)
            .with_confirmation("Repeat to confirm", "The entries do not match")
            .interact()
            .map_err(aborted)?;
        match check(&value) {
            Ok(()) => return Ok(value),
            Err(e) => warn!("{e}"),
        }
    }
}
