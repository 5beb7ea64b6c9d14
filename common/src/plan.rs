//! The operator-confirmed configuration a run applies to the device.

use std::fmt;

use thiserror::Error;

use crate::version::FirmwareVersion;

/// Symbols accepted by the device's password complexity rule.
pub const PASSWORD_SYMBOLS: &str = "~!@#$%^&*()_-+={}[]|\\:;\"'<>,.?/`";
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("phone number must have 10 or 11 digits, got {digits}")]
    InvalidPhone { digits: usize },
    #[error("{0} cannot be empty")]
    Missing(&'static str),
    #[error("admin password must be {PASSWORD_MIN_LEN} to {PASSWORD_MAX_LEN} characters")]
    PasswordLength,
    #[error("admin password needs at least one {0}")]
    PasswordMissing(&'static str),
}

/// An 11-digit, country-code-prefixed number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strips everything but digits; ten digits get the `1` country code.
    pub fn normalize(raw: &str) -> Result<Self, PlanError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        match digits.len() {
            10 => Ok(Self(format!("1{digits}"))),
            11 => Ok(Self(digits)),
            n => Err(PlanError::InvalidPhone { digits: n }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Newer firmware rejects weak admin passwords; older firmware takes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub strict: bool,
}

impl PasswordPolicy {
    pub fn for_version(target: Option<FirmwareVersion>, strict_since: FirmwareVersion) -> Self {
        Self {
            strict: target.is_some_and(|version| version >= strict_since),
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), PlanError> {
        if password.is_empty() {
            return Err(PlanError::Missing("admin password"));
        }
        if !self.strict {
            return Ok(());
        }

        let len = password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(PlanError::PasswordLength);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PlanError::PasswordMissing("digit"));
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PlanError::PasswordMissing("uppercase letter"));
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PlanError::PasswordMissing("lowercase letter"));
        }
        if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
            return Err(PlanError::PasswordMissing("symbol"));
        }
        Ok(())
    }
}

/// Raw operator input, before validation.
#[derive(Debug, Clone, Default)]
pub struct PlanDraft {
    pub phone: String,
    pub sip_password: String,
    pub primary_server: String,
    pub failover_server: String,
    pub admin_password: String,
    pub reset: bool,
}

impl PlanDraft {
    pub fn validate(self, policy: &PasswordPolicy) -> Result<ProvisioningPlan, PlanError> {
        let phone = PhoneNumber::normalize(&self.phone)?;
        let sip_password = required(self.sip_password, "SIP password")?;
        let primary_server = required(self.primary_server.trim().to_string(), "primary server")?;
        policy.validate(&self.admin_password)?;

        let failover = self.failover_server.trim();
        Ok(ProvisioningPlan {
            phone,
            sip_password,
            primary_server,
            failover_server: (!failover.is_empty()).then(|| failover.to_string()),
            admin_password: self.admin_password,
            reset: self.reset,
        })
    }
}

fn required(value: String, field: &'static str) -> Result<String, PlanError> {
    if value.is_empty() {
        Err(PlanError::Missing(field))
    } else {
        Ok(value)
    }
}

/// A validated plan. Only [`PlanDraft::validate`] builds one.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    phone: PhoneNumber,
    sip_password: String,
    primary_server: String,
    failover_server: Option<String>,
    admin_password: String,
    reset: bool,
}

impl ProvisioningPlan {
    pub fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    pub fn sip_password(&self) -> &str {
        &self.sip_password
    }

    pub fn primary_server(&self) -> &str {
        &self.primary_server
    }

    pub fn failover_server(&self) -> Option<&str> {
        self.failover_server.as_deref()
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    pub fn reset(&self) -> bool {
        self.reset
    }
}

impl fmt::Debug for ProvisioningPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningPlan")
            .field("phone", &self.phone)
            .field("primary_server", &self.primary_server)
            .field("failover_server", &self.failover_server)
            .field("reset", &self.reset)
            .finish_non_exhaustive()
    }
}
