//! The callback slot: one process-wide, lock-guarded reference to the
//! Python callable notified on every frame evaluation.

use std::sync::Mutex;

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;

/// At most one callback is registered at a time. The trampoline snapshots the
/// slot under the lock and invokes the callback outside it, so registration
/// racing a frame evaluation on another thread is well defined: the
/// evaluation sees either the old or the new callback, never a torn state.
static SLOT: Mutex<Option<Py<PyAny>>> = Mutex::new(None);

/// Store `callback` as the active callback, releasing any previous one.
///
/// Non-callable values are rejected with `TypeError` and leave the previous
/// registration untouched.
pub fn set_callback(callback: &Bound<'_, PyAny>) -> PyResult<()> {
    if !callback.is_callable() {
        return Err(PyTypeError::new_err("callback must be callable"));
    }
    let previous = SLOT
        .lock()
        .expect("callback slot lock poisoned")
        .replace(callback.clone().unbind());
    // Drop outside the critical section; the GIL is held, so releasing the
    // old reference here is safe.
    drop(previous);
    Ok(())
}

/// Empty the slot, releasing the stored callback if any.
pub fn clear_callback() {
    let previous = SLOT.lock().expect("callback slot lock poisoned").take();
    drop(previous);
}

/// Query whether a callback is currently registered.
pub fn has_callback() -> bool {
    SLOT.lock().expect("callback slot lock poisoned").is_some()
}

/// Clone the registered callback for invocation outside the slot lock.
#[cfg_attr(not(frame_eval_abi), allow(dead_code))]
pub fn snapshot(py: Python<'_>) -> Option<Py<PyAny>> {
    SLOT.lock()
        .expect("callback slot lock poisoned")
        .as_ref()
        .map(|callback| callback.clone_ref(py))
}
