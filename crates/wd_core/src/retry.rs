use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;

/// Attempt budget shared by the summarize and deliver stages: one initial
/// try plus up to two retries, with exponential backoff between attempts.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff schedule indexed by completed attempt. The last entry is reused
/// if the attempt cap is ever raised past the schedule length.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Run `op` up to `max_attempts` times, sleeping `delays[attempt - 1]`
/// between attempts. Returns the first success or the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    delays: &[Duration],
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    debug_assert!(max_attempts >= 1);
    debug_assert!(!delays.is_empty());

    let mut last_err = None;
    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, max_attempts, error = %err, "attempt failed");
                last_err = Some(err);
                if attempt < max_attempts {
                    let delay = delays
                        .get(attempt as usize - 1)
                        .or_else(|| delays.last())
                        .copied()
                        .unwrap_or(Duration::from_secs(1));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| crate::Error::External(anyhow::anyhow!("retry budget exhausted"))))
}
