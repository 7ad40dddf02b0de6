#![forbid(unsafe_code)]

//! Error taxonomy shared by the tree model crates.
//!
//! | Kind | Representation | Handling |
//! |------|----------------|----------|
//! | Cancellation | `None` / `Cancelled` outcome | Not an error; result dropped |
//! | Domain fault | [`DomainError`](crate::domain::DomainError) | `warn`, node treated as disappeared |
//! | Consistency violation | [`consistency_violation`] | `error` with backtrace, operation is a no-op |
//! | Executor loss | [`ExecutorError`] | Caller's operation fails |

use std::backtrace::Backtrace;

/// Failure to hand work to an executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The foreground thread has shut down.
    #[error("foreground executor is shut down")]
    Shutdown,
    /// The job panicked before producing a result.
    #[error("foreground job panicked: {0}")]
    Panicked(String),
    /// No tokio runtime is reachable from the calling context.
    #[error("no tokio runtime in the calling context")]
    NoRuntime,
    /// The foreground thread could not be started.
    #[error("failed to spawn foreground thread: {0}")]
    Spawn(String),
}

/// Report a broken internal invariant.
///
/// Logs at `error` level with a captured backtrace (honoring
/// `RUST_BACKTRACE`). The caller must then leave state untouched.
#[track_caller]
pub fn consistency_violation(what: &str) {
    let location = std::panic::Location::caller();
    let backtrace = Backtrace::capture();
    tracing::error!(
        violation = what,
        location = %location,
        backtrace = %backtrace,
        "consistency violation"
    );
}

/// Render a panic payload for logging.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
