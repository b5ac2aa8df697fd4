//! Pre-fetch queue for unplayed cases.
//!
//! The queue hides provider latency behind a look-ahead buffer: cases are
//! consumed FIFO from the front while a background refill tops the tail up
//! whenever the buffer runs low. At most one refill is in flight at any
//! time; a refill that completes after the session is gone just appends to
//! an orphaned queue and is dropped with it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::Case;
use crate::provider::CaseSupplier;

/// Cases requested per batch.
pub const BATCH_SIZE: usize = 10;
/// Background refill triggers when a pop leaves this many cases or fewer.
pub const LOW_WATERMARK: usize = 1;

struct QueueInner {
    queue: Mutex<VecDeque<Case>>,
    refill_in_flight: AtomicBool,
    /// Running offset of cases fetched this session, forwarded to the
    /// provider as the pagination start.
    fetched: AtomicUsize,
    /// Ids already handed to this session, excluded from every fetch so
    /// the buffer never picks up its own cases again. Played cases are
    /// retired at the supplier instead.
    seen: Mutex<HashSet<String>>,
}

impl QueueInner {
    async fn remember(&self, batch: &[Case]) {
        let mut seen = self.seen.lock().await;
        for case in batch {
            seen.insert(case.case_id.clone());
        }
    }
}

/// Owns the FIFO of pre-fetched cases for one session and the refill policy.
pub struct CaseQueueManager {
    supplier: Arc<CaseSupplier>,
    category: String,
    inner: Arc<QueueInner>,
}

impl CaseQueueManager {
    pub fn new(supplier: Arc<CaseSupplier>, category: String) -> Self {
        Self {
            supplier,
            category,
            inner: Arc::new(QueueInner {
                queue: Mutex::new(VecDeque::new()),
                refill_in_flight: AtomicBool::new(false),
                fetched: AtomicUsize::new(0),
                seen: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// First fill. The head of the batch is handed back directly (it becomes
    /// the active case without touching the queue); the rest are buffered.
    /// An empty batch is fatal: no automatic retry.
    #[instrument(level = "info", skip(self), fields(category = %self.category))]
    pub async fn initialize(&self) -> Result<Case, String> {
        let exclude = self.inner.seen.lock().await.clone();
        let mut batch = self
            .supplier
            .fetch_batch(&self.category, 0, BATCH_SIZE, &exclude)
            .await?;
        if batch.is_empty() {
            return Err(format!("no cases available for category '{}'", self.category));
        }
        self.inner.remember(&batch).await;
        self.inner.fetched.fetch_add(batch.len(), Ordering::SeqCst);

        let first = batch.remove(0);
        let buffered = batch.len();
        self.inner.queue.lock().await.extend(batch);
        info!(target: "case_queue", buffered, "Queue initialized");
        Ok(first)
    }

    /// Pop the longest-queued case. On an empty queue a fresh batch is
    /// fetched in the foreground (the transition blocks, not the server);
    /// this path ignores any pending background refill, so a slow refill
    /// can never deadlock consumption.
    #[instrument(level = "info", skip(self), fields(category = %self.category))]
    pub async fn take_next(&self) -> Result<Case, String> {
        let (popped, left) = {
            let mut q = self.inner.queue.lock().await;
            let popped = q.pop_front();
            (popped, q.len())
        };

        if let Some(case) = popped {
            debug!(target: "case_queue", left, case_id = %case.case_id, "Case popped");
            if left <= LOW_WATERMARK {
                self.spawn_refill();
            }
            return Ok(case);
        }

        let start = self.inner.fetched.load(Ordering::SeqCst);
        let exclude = self.inner.seen.lock().await.clone();
        let mut batch = self
            .supplier
            .fetch_batch(&self.category, start, BATCH_SIZE, &exclude)
            .await?;
        if batch.is_empty() {
            return Err(format!(
                "could not load a patient: case supply exhausted for '{}'",
                self.category
            ));
        }
        self.inner.remember(&batch).await;
        self.inner.fetched.fetch_add(batch.len(), Ordering::SeqCst);

        let first = batch.remove(0);
        let left = {
            let mut q = self.inner.queue.lock().await;
            q.extend(batch);
            q.len()
        };
        info!(target: "case_queue", left, case_id = %first.case_id, "Foreground batch served");
        if left <= LOW_WATERMARK {
            self.spawn_refill();
        }
        Ok(first)
    }

    /// Kick off a background refill unless one is already in flight. The
    /// task appends to the tail (never ahead of queued cases) and clears
    /// the guard whether the fetch succeeds or fails.
    fn spawn_refill(&self) {
        if self.inner.refill_in_flight.swap(true, Ordering::SeqCst) {
            debug!(target: "case_queue", "Refill already in flight; skipping");
            return;
        }
        let inner = self.inner.clone();
        let supplier = self.supplier.clone();
        let category = self.category.clone();
        tokio::spawn(async move {
            let start = inner.fetched.load(Ordering::SeqCst);
            let exclude = inner.seen.lock().await.clone();
            match supplier.fetch_batch(&category, start, BATCH_SIZE, &exclude).await {
                Ok(batch) if !batch.is_empty() => {
                    inner.remember(&batch).await;
                    inner.fetched.fetch_add(batch.len(), Ordering::SeqCst);
                    let added = batch.len();
                    let len = {
                        let mut q = inner.queue.lock().await;
                        q.extend(batch);
                        q.len()
                    };
                    info!(target: "case_queue", added, len, "Background refill appended");
                }
                Ok(_) => {
                    warn!(target: "case_queue", %category, "Background refill returned no cases");
                }
                Err(e) => {
                    warn!(target: "case_queue", %category, error = %e, "Background refill failed (non-fatal)");
                }
            }
            inner.refill_in_flight.store(false, Ordering::SeqCst);
        });
    }

    /// Retire a played case: it is marked locally before this returns, so
    /// any later fetch (a restarted shift included) skips it, while the
    /// remote "case was played" hint is fire-and-forget. Exactly one call
    /// per transition away from a case; failures never reach the player.
    pub fn retire(&self, case_id: &str) {
        self.supplier.mark_used(case_id);
        let supplier = self.supplier.clone();
        let id = case_id.to_string();
        tokio::spawn(async move {
            supplier.notify_used(&id).await;
        });
    }

    #[allow(dead_code)]
    pub async fn len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    #[cfg(test)]
    fn refill_in_flight(&self) -> bool {
        self.inner.refill_in_flight.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn force_refill_in_flight(&self, v: bool) {
        self.inner.refill_in_flight.store(v, Ordering::SeqCst);
    }
}
