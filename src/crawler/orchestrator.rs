//! Worker pool driving the crawl queue.
//!
//! A fixed-size pool consumes admitted items: fill up to the parallelism
//! budget, wait for one task to finish, refill. Workers push discovered
//! links back onto the shared queue, so the loop only terminates when the
//! queue is empty *and* no task is in flight. Cancellation clears the
//! queue and lets in-flight tasks abort at their next suspension point.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error};
use tokio::sync::Semaphore;

use super::CrawlerInner;
use super::page_processor::process_page;

pub(crate) async fn run(inner: Arc<CrawlerInner>) {
    let parallelism = inner.config.parallelism();
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut active = FuturesUnordered::new();

    loop {
        if inner.cancel.is_cancelled() {
            let dropped = {
                let mut queue = inner.queue.lock().await;
                let n = queue.len();
                queue.clear();
                n
            };
            if dropped > 0 {
                debug!("cancellation: dropped {dropped} queued items");
            }
        }

        // Fill up to the concurrency limit.
        while active.len() < parallelism {
            let item = {
                let mut queue = inner.queue.lock().await;
                queue.pop_front()
            };
            let Some(item) = item else { break };

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("worker semaphore closed unexpectedly");
                    return;
                }
            };

            let task_inner = Arc::clone(&inner);
            active.push(tokio::spawn(async move {
                let _permit = permit;
                process_page(task_inner, item).await;
            }));
        }

        match active.next().await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                if !e.is_cancelled() {
                    error!("worker task panicked: {e}");
                }
            }
            None => {
                // Nothing in flight; done unless a start() call enqueued
                // more work since the last fill.
                let empty = inner.queue.lock().await.is_empty();
                if empty || inner.cancel.is_cancelled() {
                    break;
                }
            }
        }
    }

    debug!(
        "crawl drained: {} results emitted, {} fingerprints visited",
        inner.stats.pages_emitted(),
        inner.visited.len()
    );
}
