//! Installation plumbing for the frame-evaluation hook.
//!
//! `install` captures whatever evaluation function the interpreter is
//! currently using and swaps in the trampoline; `uninstall` restores the
//! captured function. Both are guarded by a single mutex so the captured
//! pointer can never be overwritten by a second install.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag tracking whether the trampoline is installed.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Query whether the frame-evaluation hook is currently installed.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

#[cfg(frame_eval_abi)]
mod imp {
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use hook_errors::{usage, ErrorCode, HookResult};
    use pyo3::prelude::*;

    use crate::hook::{eval, pep523};

    use super::INSTALLED;

    struct HookState {
        /// Evaluation function that was active before `install`, restored on
        /// `uninstall`. Usually `_PyEval_EvalFrameDefault`, but another
        /// extension may have hooked the interpreter first.
        previous: pep523::_PyFrameEvalFunction,
    }

    static HOOK: Mutex<Option<HookState>> = Mutex::new(None);

    pub fn install(_py: Python<'_>) -> HookResult<()> {
        let mut guard = HOOK.lock().expect("hook state lock poisoned");
        if guard.is_some() {
            return Err(usage!(
                ErrorCode::HookInstallConflict,
                "frame evaluation hook already installed"
            ));
        }
        // The `Python` token witnesses that the GIL is held, which these
        // interpreter-state calls require.
        unsafe {
            let interp = pep523::PyInterpreterState_Get();
            let previous = pep523::_PyInterpreterState_GetEvalFrameFunc(interp);
            pep523::_PyInterpreterState_SetEvalFrameFunc(interp, eval::eval_frame_trampoline);
            *guard = Some(HookState { previous });
        }
        INSTALLED.store(true, Ordering::SeqCst);
        log::debug!("frame evaluation hook installed");
        Ok(())
    }

    pub fn uninstall(_py: Python<'_>) -> HookResult<()> {
        let mut guard = HOOK.lock().expect("hook state lock poisoned");
        let Some(state) = guard.take() else {
            return Err(usage!(
                ErrorCode::HookNotInstalled,
                "frame evaluation hook not installed"
            ));
        };
        unsafe {
            let interp = pep523::PyInterpreterState_Get();
            pep523::_PyInterpreterState_SetEvalFrameFunc(interp, state.previous);
        }
        INSTALLED.store(false, Ordering::SeqCst);
        log::debug!("frame evaluation hook uninstalled");
        Ok(())
    }
}

#[cfg(frame_eval_abi)]
pub use imp::{install, uninstall};

/// Fallback used where the targeted frame-evaluation ABI does not exist:
/// CPython 3.11 moved evaluation onto the private `_PyInterpreterFrame`
/// representation, and before 3.9 the hook-installation entry point is a
/// struct field rather than a function.
#[cfg(not(frame_eval_abi))]
mod imp {
    use hook_errors::{environment, usage, ErrorCode, HookResult};
    use pyo3::prelude::*;

    pub fn install(py: Python<'_>) -> HookResult<()> {
        let version = py.version_info();
        Err(environment!(
            ErrorCode::UnsupportedInterpreter,
            "CPython {}.{} is outside the frame-evaluation ABI window this \
             build targets (3.9-3.10, PyFrameObject-based eval signature)",
            version.major,
            version.minor
        ))
    }

    pub fn uninstall(_py: Python<'_>) -> HookResult<()> {
        Err(usage!(
            ErrorCode::HookNotInstalled,
            "frame evaluation hook not installed"
        ))
    }
}

#[cfg(not(frame_eval_abi))]
pub use imp::{install, uninstall};
