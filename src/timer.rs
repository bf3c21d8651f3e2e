//! Wall-clock timing for scoped operations

use std::future::Future;
use std::time::{Duration, Instant};

/// Await `operation` and pair its output with the elapsed wall-clock time
///
/// No retry or suspension logic of its own; errors travel through the output
/// untouched.
pub async fn time<F, T>(operation: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let output = operation.await;
    (output, start.elapsed())
}
