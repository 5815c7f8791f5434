//! Raw declarations for CPython's private frame-evaluation ABI (PEP 523).
//!
//! None of these symbols are part of the stable ABI. The
//! `PyFrameObject`-based signature declared here is the one CPython 3.9 and
//! 3.10 export; 3.11 moved frame evaluation onto the private
//! `_PyInterpreterFrame` representation, so this module is compiled only
//! inside that version window. There is no cross-version guarantee to
//! abstract over, only a point binding to document.

#![allow(non_camel_case_types)]

use std::os::raw::c_int;

use pyo3::ffi::{PyFrameObject, PyInterpreterState, PyObject, PyThreadState};

/// Signature of a frame-evaluation function: thread state, frame, and a flag
/// indicating the frame should raise instead of run.
pub type _PyFrameEvalFunction =
    unsafe extern "C" fn(*mut PyThreadState, *mut PyFrameObject, c_int) -> *mut PyObject;

extern "C" {
    /// Read the interpreter's current frame-evaluation function.
    pub fn _PyInterpreterState_GetEvalFrameFunc(
        interp: *mut PyInterpreterState,
    ) -> _PyFrameEvalFunction;

    /// Replace the interpreter's frame-evaluation function.
    pub fn _PyInterpreterState_SetEvalFrameFunc(
        interp: *mut PyInterpreterState,
        eval_frame: _PyFrameEvalFunction,
    );

    pub fn PyInterpreterState_Get() -> *mut PyInterpreterState;

    /// The interpreter's built-in bytecode evaluator.
    pub fn _PyEval_EvalFrameDefault(
        tstate: *mut PyThreadState,
        frame: *mut PyFrameObject,
        throwflag: c_int,
    ) -> *mut PyObject;
}
