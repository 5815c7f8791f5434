//! PyO3 entry points for managing the callback slot and the hook itself.

use pyo3::prelude::*;

use crate::ffi;
use crate::hook;

/// Register `callback` to be invoked with every frame the interpreter
/// evaluates while the hook is installed. Replaces any previous callback.
#[pyfunction]
pub fn set_callback(callback: Bound<'_, PyAny>) -> PyResult<()> {
    ffi::wrap_pyfunction("set_callback", || hook::set_callback(&callback))
}

/// Remove the registered callback, if any.
#[pyfunction]
pub fn clear_callback() -> PyResult<()> {
    ffi::wrap_pyfunction("clear_callback", || {
        hook::clear_callback();
        Ok(())
    })
}

/// Query whether a callback is currently registered.
#[pyfunction]
pub fn has_callback() -> PyResult<bool> {
    Ok(hook::has_callback())
}

/// Swap the interpreter's frame-evaluation function for the hook trampoline.
#[pyfunction]
pub fn install_hook(py: Python<'_>) -> PyResult<()> {
    ffi::wrap_pyfunction("install_hook", || {
        hook::install(py).map_err(ffi::map_hook_error)
    })
}

/// Restore the frame-evaluation function captured at install time.
#[pyfunction]
pub fn uninstall_hook(py: Python<'_>) -> PyResult<()> {
    ffi::wrap_pyfunction("uninstall_hook", || {
        hook::uninstall(py).map_err(ffi::map_hook_error)
    })
}

/// Query whether the hook trampoline is currently installed.
#[pyfunction]
pub fn is_hook_installed() -> PyResult<bool> {
    Ok(hook::is_installed())
}
