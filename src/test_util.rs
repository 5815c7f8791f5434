//! Helpers shared by unit tests that touch process-global state (the
//! callback slot, the policy cell, logger destinations).

use std::sync::{Mutex, MutexGuard, PoisonError};

static GLOBAL_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serialise tests that mutate process-global state.
pub(crate) fn global_test_lock() -> MutexGuard<'static, ()> {
    GLOBAL_TEST_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
