//! Bounded retry for transient store errors.
//!
//! Mutation handlers wrap their persistence step in [`transient`] so a
//! momentary pool exhaustion or dropped connection does not surface as a
//! failed mutation. Only errors classified as transient by
//! [`ApiError::is_transient`] are retried; everything else (constraint
//! violations, not-found) returns immediately. Callers publish only after
//! this returns `Ok`, so the persist-before-publish ordering is unaffected
//! by retries.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Total attempts, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; grows linearly.
const BACKOFF: Duration = Duration::from_millis(50);

pub async fn transient<T, F, Fut>(op: F) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, code = %err.code, "transient store error, retrying");
                tokio::time::sleep(BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
