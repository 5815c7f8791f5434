//! FFI helpers bridging `HookError` into Python exceptions with panic containment.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use hook_errors::{ErrorCode, ErrorKind, HookError};
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::logging;

create_exception!(frame_eval_hook, PyFrameHookError, PyException);
create_exception!(frame_eval_hook, PyUsageError, PyFrameHookError);
create_exception!(frame_eval_hook, PyEnvironmentError, PyFrameHookError);
create_exception!(frame_eval_hook, PyInternalError, PyFrameHookError);

/// Register the hook exception hierarchy into the Python module.
pub fn register_exceptions(module: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = module.py();
    module.add("FrameHookError", py.get_type::<PyFrameHookError>())?;
    module.add("UsageError", py.get_type::<PyUsageError>())?;
    module.add("EnvironmentError", py.get_type::<PyEnvironmentError>())?;
    module.add("InternalError", py.get_type::<PyInternalError>())?;
    Ok(())
}

/// Convert a captured panic into a `PyInternalError` while logging the payload.
pub(crate) fn panic_to_pyerr(label: &'static str, payload: Box<dyn Any + Send>) -> PyErr {
    handle_panic(label, payload)
}

fn handle_panic(label: &'static str, payload: Box<dyn Any + Send>) -> PyErr {
    let message = panic_payload_to_string(&payload);
    logging::record_panic(label);
    map_hook_error(HookError::new(
        ErrorKind::Internal,
        ErrorCode::Unknown,
        format!("panic in {label}: {message}"),
    ))
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Map a `HookError` into the appropriate Python exception subclass.
pub fn map_hook_error(err: HookError) -> PyErr {
    logging::log_hook_error("hook_error", &err);
    logging::emit_error_trailer(&err);
    let source_desc = err.source_ref().map(|src| src.to_string());
    let kind = err.kind;
    let code = err.code;

    let mut text = format!("[{code}] {}", err.message);
    if !err.context.is_empty() {
        let mut first = true;
        text.push_str(" (");
        for (key, value) in &err.context {
            if !first {
                text.push_str(", ");
            }
            first = false;
            text.push_str(key);
            text.push('=');
            text.push_str(value);
        }
        text.push(')');
    }
    if let Some(source) = source_desc.as_ref() {
        text.push_str(": caused by ");
        text.push_str(source);
    }

    let pyerr = match kind {
        ErrorKind::Usage => PyUsageError::new_err(text.clone()),
        ErrorKind::Environment => PyEnvironmentError::new_err(text.clone()),
        ErrorKind::Internal => PyInternalError::new_err(text.clone()),
    };

    Python::with_gil(|py| {
        let instance = pyerr.value(py);
        let _ = instance.setattr("code", code.as_str());
        let _ = instance.setattr("kind", format!("{:?}", kind));
        let context_dict = PyDict::new(py);
        for (key, value) in &err.context {
            let _ = context_dict.set_item(*key, value);
        }
        let _ = instance.setattr("context", context_dict);
    });

    pyerr
}

/// Helper that guards a `#[pyfunction]` implementation, catching panics while
/// leaving existing `PyResult` usage intact.
pub fn wrap_pyfunction<T, F>(label: &'static str, operation: F) -> PyResult<T>
where
    F: FnOnce() -> PyResult<T>,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(panic_payload) => Err(handle_panic(label, panic_payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::global_test_lock;
    use hook_errors::usage;
    use pyo3::types::PyAnyMethods;

    #[test]
    fn usage_errors_map_to_the_usage_subclass() {
        let _guard = global_test_lock();
        Python::with_gil(|py| {
            let err = map_hook_error(
                usage!(ErrorCode::HookInstallConflict, "already installed")
                    .with_context("operation", "install_hook".to_string()),
            );
            assert!(err.is_instance_of::<PyUsageError>(py));
            assert!(err.is_instance_of::<PyFrameHookError>(py));

            let value = err.value(py);
            let code: String = value.getattr("code").unwrap().extract().unwrap();
            assert_eq!(code, "ERR_HOOK_INSTALL_CONFLICT");
            let text = value.to_string();
            assert!(text.contains("already installed"));
            assert!(text.contains("operation=install_hook"));
        });
    }

    #[test]
    fn panics_are_contained_as_internal_errors() {
        let _guard = global_test_lock();
        let metrics = crate::logging::test_support::install();
        metrics.take();
        Python::with_gil(|py| {
            let result: PyResult<()> =
                wrap_pyfunction("explode", || std::panic::panic_any("kaboom".to_string()));
            let err = result.expect_err("panic becomes an error");
            assert!(err.is_instance_of::<PyInternalError>(py));
            assert!(err.value(py).to_string().contains("kaboom"));
        });
        let events = metrics.take();
        assert!(events.contains(&crate::logging::test_support::MetricEvent::Panic("explode")));
    }
}
