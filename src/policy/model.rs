//! Policy data structures and in-memory management.

use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::RwLock;

use hook_errors::{usage, ErrorCode, HookError};

static POLICY: OnceCell<RwLock<HookPolicy>> = OnceCell::new();

fn policy_cell() -> &'static RwLock<HookPolicy> {
    POLICY.get_or_init(|| RwLock::new(HookPolicy::default()))
}

/// Behaviour when the registered frame callback raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCallbackError {
    /// Log the failure and fall through to the default evaluator.
    Suppress,
    /// Log the failure, uninstall the hook, and fall through.
    Disable,
    /// Propagate the failure to the host runtime instead of evaluating
    /// the frame.
    Abort,
}

impl Default for OnCallbackError {
    fn default() -> Self {
        OnCallbackError::Suppress
    }
}

#[derive(Debug)]
pub struct PolicyParseError(pub HookError);

impl FromStr for OnCallbackError {
    type Err = PolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "suppress" => Ok(OnCallbackError::Suppress),
            "disable" => Ok(OnCallbackError::Disable),
            "abort" => Ok(OnCallbackError::Abort),
            other => Err(PolicyParseError(usage!(
                ErrorCode::InvalidPolicyValue,
                "invalid on_callback_error value '{}' (expected 'suppress', 'disable' or 'abort')",
                other
            ))),
        }
    }
}

impl OnCallbackError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnCallbackError::Suppress => "suppress",
            OnCallbackError::Disable => "disable",
            OnCallbackError::Abort => "abort",
        }
    }
}

/// Hook-wide runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HookPolicy {
    pub on_callback_error: OnCallbackError,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub json_errors: bool,
}

impl HookPolicy {
    pub(crate) fn apply_update(&mut self, update: PolicyUpdate) {
        if let Some(on_err) = update.on_callback_error {
            self.on_callback_error = on_err;
        }
        if let Some(level) = update.log_level {
            self.log_level = match level.trim() {
                "" => None,
                other => Some(other.to_string()),
            };
        }
        if let Some(path) = update.log_file {
            self.log_file = match path {
                PolicyPath::Clear => None,
                PolicyPath::Value(pb) => Some(pb),
            };
        }
        if let Some(json_errors) = update.json_errors {
            self.json_errors = json_errors;
        }
    }
}

/// Internal helper representing path updates.
#[derive(Debug, Clone)]
pub(crate) enum PolicyPath {
    Clear,
    Value(PathBuf),
}

/// Mutation record for the policy.
#[derive(Debug, Default, Clone)]
pub(crate) struct PolicyUpdate {
    pub(crate) on_callback_error: Option<OnCallbackError>,
    pub(crate) log_level: Option<String>,
    pub(crate) log_file: Option<PolicyPath>,
    pub(crate) json_errors: Option<bool>,
}

/// Snapshot the current policy.
pub fn policy_snapshot() -> HookPolicy {
    policy_cell().read().expect("policy lock poisoned").clone()
}

/// Apply the provided update to the global policy and propagate logging changes.
pub(crate) fn apply_policy_update(update: PolicyUpdate) {
    let mut guard = policy_cell().write().expect("policy lock poisoned");
    guard.apply_update(update);
    crate::logging::apply_policy(&guard);
}

#[cfg(test)]
pub(crate) fn reset_policy_for_tests() {
    let mut guard = policy_cell().write().expect("policy lock poisoned");
    *guard = HookPolicy::default();
}
