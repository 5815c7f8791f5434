//! PEP-523 frame-evaluation hook backed by PyO3.
//!
//! The crate exposes a Python extension module with one piece of state: a
//! callback slot. While the hook is installed, every frame the interpreter
//! evaluates is reported to the registered callback before the default
//! evaluator runs it. Callback results are discarded; callback failures are
//! resolved by a configurable policy that defaults to log-and-fall-through.
//!
//! The hook binds to CPython's private frame-evaluation ABI
//! (`_PyInterpreterState_SetEvalFrameFunc`), which carries no stability
//! guarantee across interpreter versions; see `hook::pep523`.

use pyo3::prelude::*;

pub mod api;
pub mod ffi;
pub mod hook;
pub mod logging;
pub mod policy;
#[cfg(test)]
pub(crate) mod test_util;

pub use crate::hook::{
    clear_callback, has_callback, install, is_installed, set_callback, uninstall,
};

/// Python module definition.
#[pymodule]
fn frame_eval_hook(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Initialize logging on import so users see logs without extra setup.
    // Respect RUST_LOG if present; otherwise default to debug for this crate.
    logging::init_rust_logging_with_default("frame_eval_hook=debug");
    // Environment overrides are best-effort at import time; a bad value is
    // reported through the logger rather than failing the import.
    if let Err(err) = policy::configure_policy_from_env() {
        logging::log_hook_error("configure_policy_from_env", &err);
    }
    ffi::register_exceptions(m)?;
    m.add_function(wrap_pyfunction!(api::set_callback, m)?)?;
    m.add_function(wrap_pyfunction!(api::clear_callback, m)?)?;
    m.add_function(wrap_pyfunction!(api::has_callback, m)?)?;
    m.add_function(wrap_pyfunction!(api::install_hook, m)?)?;
    m.add_function(wrap_pyfunction!(api::uninstall_hook, m)?)?;
    m.add_function(wrap_pyfunction!(api::is_hook_installed, m)?)?;
    m.add_function(wrap_pyfunction!(policy::configure_policy_py, m)?)?;
    m.add_function(wrap_pyfunction!(policy::py_configure_policy_from_env, m)?)?;
    m.add_function(wrap_pyfunction!(policy::py_policy_snapshot, m)?)?;
    Ok(())
}
