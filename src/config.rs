//! Process-wide configuration.
//!
//! The only setting is the maximum nesting depth any guarded traversal may reach before it
//! fails with [`ExprError::RecursionLimitExceeded`](crate::ExprError). It is read at every
//! traversal step, so changing it affects traversals that start afterwards as well as the
//! deeper steps of traversals already running.
//!
//! The initial value is [`DEFAULT_MAX_RECURSION_DEPTH`], unless the environment variable
//! [`MAX_RECURSION_DEPTH_ENV`] holds a positive integer when the setting is first read.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Default maximum traversal depth.
///
/// Expansion, substitution and evaluation keep their pending work on the heap, so this
/// limit does not depend on the stack size of the calling thread: a 2 MiB thread expands,
/// substitutes and evaluates trees right up to it.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1500;

/// Environment variable consulted once for the initial maximum depth.
pub const MAX_RECURSION_DEPTH_ENV: &str = "EXPRNEST_MAX_RECURSION_DEPTH";

static MAX_RECURSION_DEPTH: Lazy<AtomicUsize> =
    Lazy::new(|| AtomicUsize::new(initial_max_recursion_depth()));

fn initial_max_recursion_depth() -> usize {
    let Ok(raw) = std::env::var(MAX_RECURSION_DEPTH_ENV) else {
        return DEFAULT_MAX_RECURSION_DEPTH;
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => limit,
        _ => {
            warn!(
                value = %raw,
                "ignoring invalid {}; using default {}",
                MAX_RECURSION_DEPTH_ENV,
                DEFAULT_MAX_RECURSION_DEPTH
            );
            DEFAULT_MAX_RECURSION_DEPTH
        }
    }
}

/// Returns the current process-wide maximum traversal depth.
pub fn max_recursion_depth() -> usize {
    MAX_RECURSION_DEPTH.load(Ordering::Relaxed)
}

/// Sets the process-wide maximum traversal depth and returns the previous value.
pub fn set_max_recursion_depth(limit: usize) -> usize {
    MAX_RECURSION_DEPTH.swap(limit, Ordering::Relaxed)
}
