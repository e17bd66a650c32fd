//! Helpers for work that must not block the caller.
use std::future::Future;

use tracing::debug;

/// Spawns a future on the ambient tokio runtime.
pub fn perform_async_work<F>(f: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    debug!("Spawning async task");
    tokio::spawn(f);
}

pub async fn sleep_ms(delay_ms: u64) {
    tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
}
