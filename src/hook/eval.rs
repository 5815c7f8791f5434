//! Frame notification and the PEP-523 evaluation trampoline.
//!
//! The trampoline runs once per frame the interpreter evaluates: notify the
//! registered callback (if any), apply the callback-error policy, then hand
//! the frame to the default evaluator and return its result verbatim.

// Outside the 3.9-3.10 ABI window the trampoline is compiled out and the
// notification path is only reachable from tests.
#![cfg_attr(not(frame_eval_abi), allow(dead_code))]

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use hook_errors::ErrorCode;
use log::{error, warn};
use pyo3::prelude::*;

use crate::ffi;
use crate::logging;
use crate::policy::{self, OnCallbackError};

use super::slot;

thread_local! {
    // Invoking the Python callback evaluates the callback's own frames
    // through the installed hook; this flag keeps the trampoline from
    // re-entering the callback for those nested evaluations.
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Invoke the registered callback with `frame` as its sole argument.
///
/// The callback's return value is discarded. An error raised by the callback
/// is resolved per policy: `Ok(())` means evaluation falls through to the
/// default evaluator, `Err` means the error propagates to the host runtime
/// in place of evaluating the frame.
pub(crate) fn notify_frame(py: Python<'_>, frame: &Bound<'_, PyAny>) -> Result<(), PyErr> {
    if IN_CALLBACK.with(|flag| flag.get()) {
        return Ok(());
    }
    let Some(callback) = slot::snapshot(py) else {
        return Ok(());
    };

    IN_CALLBACK.with(|flag| flag.set(true));
    let result = catch_unwind(AssertUnwindSafe(|| callback.call1(py, (frame,))));
    IN_CALLBACK.with(|flag| flag.set(false));

    let outcome = match result {
        Ok(value) => value.map(|_| ()),
        Err(payload) => Err(ffi::panic_to_pyerr("frame_callback", payload)),
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(err) => handle_callback_error(py, err),
    }
}

fn handle_callback_error(py: Python<'_>, err: PyErr) -> Result<(), PyErr> {
    let policy = policy::policy_snapshot();
    match policy.on_callback_error {
        OnCallbackError::Abort => Err(err),
        OnCallbackError::Suppress => {
            let message = err.to_string();
            logging::record_suppressed_callback_error("policy_suppress");
            logging::with_error_code(ErrorCode::CallbackFailed, || {
                error!("frame callback raised; suppressing per policy: {}", message);
            });
            Ok(())
        }
        OnCallbackError::Disable => {
            let message = err.to_string();
            let code = logging::error_code_from_pyerr(py, &err);
            logging::record_detach("policy_disable", code.map(|code| code.as_str()));
            logging::with_error_code_opt(code, || {
                error!(
                    "frame callback raised; uninstalling hook per policy: {}",
                    message
                );
            });
            if let Err(uninstall_err) = super::install::uninstall(py) {
                warn!(
                    "failed to uninstall hook after callback error: {}",
                    uninstall_err
                );
            }
            Ok(())
        }
    }
}

#[cfg(frame_eval_abi)]
pub(super) use trampoline::eval_frame_trampoline;

#[cfg(frame_eval_abi)]
mod trampoline {
    use std::os::raw::c_int;
    use std::ptr;

    use pyo3::prelude::*;

    use crate::hook::pep523;

    /// Replacement frame-evaluation function handed to
    /// `_PyInterpreterState_SetEvalFrameFunc`.
    ///
    /// The interpreter holds the GIL whenever it evaluates a frame, so
    /// re-acquiring it here is cheap.
    pub(crate) unsafe extern "C" fn eval_frame_trampoline(
        tstate: *mut pyo3::ffi::PyThreadState,
        frame: *mut pyo3::ffi::PyFrameObject,
        throwflag: c_int,
    ) -> *mut pyo3::ffi::PyObject {
        let notified = Python::with_gil(|py| {
            let frame_obj =
                unsafe { Bound::from_borrowed_ptr(py, frame.cast::<pyo3::ffi::PyObject>()) };
            match super::notify_frame(py, &frame_obj) {
                Ok(()) => true,
                Err(err) => {
                    err.restore(py);
                    false
                }
            }
        });
        if !notified {
            return ptr::null_mut();
        }
        unsafe { pep523::_PyEval_EvalFrameDefault(tstate, frame, throwflag) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_support::set_on_callback_error;
    use crate::test_util::global_test_lock;
    use pyo3::types::{PyAnyMethods, PyDict, PyModule};
    use std::ffi::CString;

    fn load_module<'py>(py: Python<'py>, source: &str) -> Bound<'py, PyModule> {
        let code = CString::new(source).expect("source");
        PyModule::from_code(py, code.as_c_str(), c"eval_test.py", c"eval_test").expect("module")
    }

    #[test]
    fn notify_without_callback_is_a_no_op() {
        let _guard = global_test_lock();
        Python::with_gil(|py| {
            super::super::slot::clear_callback();
            let stand_in = PyDict::new(py);
            notify_frame(py, stand_in.as_any()).expect("no callback means pass-through");
        });
    }

    #[test]
    fn notify_passes_the_frame_and_discards_the_result() {
        let _guard = global_test_lock();
        Python::with_gil(|py| {
            let module = load_module(
                py,
                "seen = []\n\
                 def target(frame):\n\
                 \x20   seen.append(frame)\n\
                 \x20   return 'ignored'\n",
            );
            let cb = module.getattr("target").expect("target");
            super::super::slot::set_callback(&cb).expect("set callback");

            let stand_in = PyDict::new(py);
            notify_frame(py, stand_in.as_any()).expect("callback succeeded");

            let seen = module.getattr("seen").expect("seen");
            assert_eq!(seen.len().expect("len"), 1);
            let first = seen.get_item(0).expect("first");
            assert!(first.is(stand_in.as_any()));
            super::super::slot::clear_callback();
        });
    }

    #[test]
    fn suppress_policy_swallows_callback_errors() {
        let _guard = global_test_lock();
        let metrics = crate::logging::test_support::install();
        metrics.take();
        set_on_callback_error(OnCallbackError::Suppress);
        Python::with_gil(|py| {
            let module = load_module(
                py,
                "def target(frame):\n\
                 \x20   raise RuntimeError('boom')\n",
            );
            let cb = module.getattr("target").expect("target");
            super::super::slot::set_callback(&cb).expect("set callback");

            let stand_in = PyDict::new(py);
            notify_frame(py, stand_in.as_any()).expect("error is suppressed");
            super::super::slot::clear_callback();
        });
        let events = metrics.take();
        assert!(events.contains(
            &crate::logging::test_support::MetricEvent::Suppressed("policy_suppress")
        ));
    }

    #[test]
    fn disable_policy_swallows_and_detaches() {
        let _guard = global_test_lock();
        let metrics = crate::logging::test_support::install();
        metrics.take();
        set_on_callback_error(OnCallbackError::Disable);
        Python::with_gil(|py| {
            let module = load_module(
                py,
                "def target(frame):\n\
                 \x20   raise RuntimeError('boom')\n",
            );
            let cb = module.getattr("target").expect("target");
            super::super::slot::set_callback(&cb).expect("set callback");

            let stand_in = PyDict::new(py);
            // The hook is not installed in this test process; the detach is
            // still recorded and the failure still falls through.
            notify_frame(py, stand_in.as_any()).expect("error is swallowed");
            super::super::slot::clear_callback();
        });
        let events = metrics.take();
        assert!(events
            .iter()
            .any(|event| matches!(event, crate::logging::test_support::MetricEvent::Detach("policy_disable", _))));
        set_on_callback_error(OnCallbackError::Suppress);
    }

    #[test]
    fn abort_policy_propagates_callback_errors() {
        let _guard = global_test_lock();
        set_on_callback_error(OnCallbackError::Abort);
        Python::with_gil(|py| {
            let module = load_module(
                py,
                "def target(frame):\n\
                 \x20   raise ValueError('no')\n",
            );
            let cb = module.getattr("target").expect("target");
            super::super::slot::set_callback(&cb).expect("set callback");

            let stand_in = PyDict::new(py);
            let err = notify_frame(py, stand_in.as_any()).expect_err("abort propagates");
            assert!(err.is_instance_of::<pyo3::exceptions::PyValueError>(py));
            super::super::slot::clear_callback();
        });
        set_on_callback_error(OnCallbackError::Suppress);
    }

    #[test]
    fn nested_notification_is_suppressed() {
        let _guard = global_test_lock();
        set_on_callback_error(OnCallbackError::Suppress);
        Python::with_gil(|py| {
            let module = load_module(
                py,
                "calls = []\n\
                 def target(frame):\n\
                 \x20   calls.append(frame)\n",
            );
            let cb = module.getattr("target").expect("target");
            super::super::slot::set_callback(&cb).expect("set callback");

            let stand_in = PyDict::new(py);
            IN_CALLBACK.with(|flag| flag.set(true));
            notify_frame(py, stand_in.as_any()).expect("nested notify is a no-op");
            IN_CALLBACK.with(|flag| flag.set(false));

            let calls = module.getattr("calls").expect("calls");
            assert_eq!(calls.len().expect("len"), 0);
            super::super::slot::clear_callback();
        });
    }
}
