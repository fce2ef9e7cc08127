//! Default process-wide consistency controller
//!
//! Array handles that are not given a controller explicitly share this one,
//! so two handles to the same URI anywhere in the process see each other's
//! registrations. Tests that want isolation construct their own
//! [`ConsistencyController`] instead.

use crate::consistency::ConsistencyController;
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_CONTROLLER: Lazy<Arc<ConsistencyController>> =
    Lazy::new(|| Arc::new(ConsistencyController::new()));

/// The controller shared by every array handle in the process
pub fn global_controller() -> Arc<ConsistencyController> {
    Arc::clone(&GLOBAL_CONTROLLER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_controller_is_shared() {
        assert!(Arc::ptr_eq(&global_controller(), &global_controller()));
    }
}
