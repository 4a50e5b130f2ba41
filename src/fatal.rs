//! The single fail-fast path.
//!
//! Resource exhaustion and invariant violations are not recoverable: a
//! mis-sized staging buffer or an out-of-bounds register access would corrupt
//! every following bus transaction. Every non-`try_` API funnels such
//! conditions through [`halt`].

use core::fmt::Display;
use tracing::error;

/// Logs the condition and stops the control loop.
///
/// Release builds are configured with `panic = "abort"`, so on target this
/// never unwinds.
#[cold]
#[track_caller]
pub fn halt(reason: impl Display) -> ! {
    error!("fatal: {}", reason);
    panic!("fatal: {reason}");
}

/// Unwraps a fallible result or halts.
#[track_caller]
pub fn check<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => halt(e),
    }
}
