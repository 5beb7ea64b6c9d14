//! Capabilities the engine needs from whoever is running it.

use crate::error::ProvisionError;
use crate::plan::{PasswordPolicy, ProvisioningPlan};

/// Yes/no decisions and credential re-entry.
pub trait Operator: Send + Sync {
    fn confirm(&self, question: &str) -> bool;

    /// A password to try after the known one was rejected.
    ///
    /// `attempt` starts at zero. `None` gives up early.
    fn password(&self, attempt: usize) -> Option<String>;
}

/// Produces a validated, operator-confirmed plan.
pub trait PlanSource: Send + Sync {
    fn collect(&self, policy: &PasswordPolicy) -> Result<ProvisioningPlan, ProvisionError>;
}
