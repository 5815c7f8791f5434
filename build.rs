use pyo3_build_config::PythonImplementation;

fn main() {
    // Emits the Py_3_x cfg flags alongside our own ABI-window cfg.
    pyo3_build_config::use_pyo3_cfgs();

    // The PyFrameObject-based eval-frame signature only exists on CPython
    // 3.9 and 3.10; everywhere else the hook falls back to a runtime error.
    let config = pyo3_build_config::get();
    let in_window = config.implementation == PythonImplementation::CPython
        && config.version.major == 3
        && matches!(config.version.minor, 9 | 10);
    println!("cargo:rustc-check-cfg=cfg(frame_eval_abi)");
    if in_window {
        println!("cargo:rustc-cfg=frame_eval_abi");
    }
}
