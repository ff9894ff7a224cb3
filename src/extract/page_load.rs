//! Waiting for rendered pages to settle

use std::time::{Duration, Instant};

use super::scripts::{READY_STATE_SCRIPT, SCROLL_SCRIPT};
use crate::browser::PageSession;

/// Poll until `document.readyState === 'complete'` and a body exists.
///
/// Navigation only waits for the HTTP response; script-heavy pages keep
/// building their DOM afterwards. Gives up quietly after `max_wait` and lets
/// the caller extract whatever is there.
pub(super) async fn wait_for_page_load(page: &dyn PageSession, max_wait: Duration) {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        if start.elapsed() >= max_wait {
            log::warn!(
                "Timeout waiting for page load after {}s, proceeding anyway",
                max_wait.as_secs()
            );
            break;
        }

        match page.evaluate(READY_STATE_SCRIPT).await {
            Ok(value) => {
                let ready = value.get("readyState").and_then(|v| v.as_str()) == Some("complete");
                let body = value
                    .get("bodyExists")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                let images = value
                    .get("imagesLoaded")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(true);
                if ready && body {
                    if !images {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    break;
                }
            }
            Err(e) => log::debug!("Failed to check readyState: {e}, retrying"),
        }

        tokio::time::sleep(poll_interval).await;
    }

    log::debug!(
        "Page load wait complete after {:.2}s",
        start.elapsed().as_secs_f64()
    );
}

/// Scroll to the bottom `times` times, pausing for lazy content each time.
pub(super) async fn scroll_to_bottom(page: &dyn PageSession, times: usize, pause: Duration) {
    for i in 0..times {
        if let Err(e) = page.evaluate(SCROLL_SCRIPT).await {
            log::debug!("Scroll {} failed: {e}", i + 1);
        }
        tokio::time::sleep(pause).await;
    }
}
