//! Bounded retry over transient failures.

use std::future::Future;

/// Run `op` up to `max_attempts` times, retrying only errors the classifier
/// marks as transient. The 1-based attempt index is passed to `op` so
/// per-attempt state (such as a fresh idempotency token) can be derived
/// inside each try. The final error is returned unchanged.
pub async fn retry_transient<T, E, F, Fut>(
    max_attempts: u32,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_transient(&err) => {
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
