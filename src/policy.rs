//! Runtime configuration policy for the frame-evaluation hook.

mod model;

use model::{apply_policy_update, PolicyPath, PolicyUpdate};
pub use model::{policy_snapshot, HookPolicy, OnCallbackError};
#[allow(unused_imports)]
pub use model::PolicyParseError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use hook_errors::{usage, ErrorCode, HookResult};

/// Environment variable configuring how a raising frame callback is handled.
pub const ENV_ON_CALLBACK_ERROR: &str = "FRAME_HOOK_ON_CALLBACK_ERROR";
/// Environment variable controlling log level for the hook crate.
pub const ENV_LOG_LEVEL: &str = "FRAME_HOOK_LOG_LEVEL";
/// Environment variable pointing to a log destination file.
pub const ENV_LOG_FILE: &str = "FRAME_HOOK_LOG_FILE";
/// Environment variable enabling JSON error trailers on stderr.
pub const ENV_JSON_ERRORS: &str = "FRAME_HOOK_JSON_ERRORS";

/// Load policy overrides from environment variables.
pub fn configure_policy_from_env() -> HookResult<()> {
    let mut update = PolicyUpdate::default();

    if let Ok(value) = env::var(ENV_ON_CALLBACK_ERROR) {
        let on_err = OnCallbackError::from_str(&value).map_err(|err| err.0)?;
        update.on_callback_error = Some(on_err);
    }

    if let Ok(value) = env::var(ENV_LOG_LEVEL) {
        update.log_level = Some(value);
    }

    if let Ok(value) = env::var(ENV_LOG_FILE) {
        let path = if value.trim().is_empty() {
            PolicyPath::Clear
        } else {
            PolicyPath::Value(PathBuf::from(value))
        };
        update.log_file = Some(path);
    }

    if let Ok(value) = env::var(ENV_JSON_ERRORS) {
        update.json_errors = Some(parse_bool(&value)?);
    }

    apply_policy_update(update);
    Ok(())
}

fn parse_bool(value: &str) -> HookResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Ok(true),
        "0" | "false" | "f" | "no" | "n" => Ok(false),
        other => Err(usage!(
            ErrorCode::InvalidPolicyValue,
            "invalid boolean value '{}' (expected true/false)",
            other
        )),
    }
}

// === PyO3 helpers ===

use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::ffi;

#[pyfunction(name = "configure_policy")]
#[pyo3(signature = (on_callback_error=None, log_level=None, log_file=None, json_errors=None))]
pub fn configure_policy_py(
    on_callback_error: Option<&str>,
    log_level: Option<&str>,
    log_file: Option<&str>,
    json_errors: Option<bool>,
) -> PyResult<()> {
    let mut update = PolicyUpdate::default();

    if let Some(value) = on_callback_error {
        match OnCallbackError::from_str(value) {
            Ok(parsed) => update.on_callback_error = Some(parsed),
            Err(err) => return Err(ffi::map_hook_error(err.0)),
        }
    }

    if let Some(value) = log_level {
        update.log_level = Some(value.to_string());
    }

    if let Some(value) = log_file {
        let path = if value.trim().is_empty() {
            PolicyPath::Clear
        } else {
            PolicyPath::Value(PathBuf::from(value))
        };
        update.log_file = Some(path);
    }

    if let Some(value) = json_errors {
        update.json_errors = Some(value);
    }

    apply_policy_update(update);
    Ok(())
}

#[pyfunction(name = "configure_policy_from_env")]
pub fn py_configure_policy_from_env() -> PyResult<()> {
    configure_policy_from_env().map_err(ffi::map_hook_error)
}

#[pyfunction(name = "policy_snapshot")]
pub fn py_policy_snapshot(py: Python<'_>) -> PyResult<PyObject> {
    let snapshot = policy_snapshot();
    let dict = PyDict::new(py);
    dict.set_item("on_callback_error", snapshot.on_callback_error.as_str())?;
    if let Some(level) = snapshot.log_level.as_deref() {
        dict.set_item("log_level", level)?;
    } else {
        dict.set_item("log_level", py.None())?;
    }
    if let Some(path) = snapshot.log_file.as_ref() {
        dict.set_item("log_file", path.display().to_string())?;
    } else {
        dict.set_item("log_file", py.None())?;
    }
    dict.set_item("json_errors", snapshot.json_errors)?;
    Ok(dict.into())
}
