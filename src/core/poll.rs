use super::error::Error;
use std::{future::Future, time::Duration};

pub async fn timeout_future<T: Future>(future: T, secs: u64, reason: String) -> T::Output {
    let duration = Duration::from_secs(secs);
    match tokio::time::timeout(duration, future).await {
        Ok(output) => output,
        Err(_) => panic!("Future didn't finish within {duration:?}, {reason}"),
    }
}

/// Polls `check` every `interval` until it yields `true`, giving up once `timeout` has elapsed.
///
/// The check is always attempted at least once, so a zero timeout still probes the condition.
pub async fn wait_until<F, Fut>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    loop {
        if check().await {
            return Ok(());
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(Error::Timeout {
                description: description.to_string(),
                elapsed,
            });
        }
        log::trace!(target: "gaia-e2e", "still waiting for {} ({:?} elapsed)", description, elapsed);
        tokio::time::sleep(interval).await;
    }
}

/// Like [`wait_until`] but for checks that produce a value once ready.
pub async fn wait_for<T, F, Fut>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let start = tokio::time::Instant::now();
    loop {
        let err = match check().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            log::warn!(target: "gaia-e2e", "giving up on {}: last error was {}", description, err);
            return Err(Error::Timeout {
                description: description.to_string(),
                elapsed,
            });
        }
        log::trace!(target: "gaia-e2e", "{} not ready yet: {}", description, err);
        tokio::time::sleep(interval).await;
    }
}
