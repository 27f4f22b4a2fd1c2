// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offloaded compression: a dedicated worker thread fed over a channel.
//
// Every request carries a correlation id. The worker hands each result to a
// routing table keyed by that id, so replies can never resolve the wrong
// caller even with several requests in flight. Whatever goes wrong on the
// worker side (closed channel, dropped reply, panic, timeout, or an error
// computed there) the caller re-runs the pipeline inline.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{CompressOptions, CompressedImage, RawImage};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::Compressor;
use super::compress;

/// Identifies one request/reply pair.
pub type CorrelationId = u64;

/// The work the thread performs for each request.
pub(crate) type WorkerJob = fn(&RawImage, &CompressOptions) -> Result<CompressedImage>;

type Reply = Result<CompressedImage>;

struct CompressRequest {
    id: CorrelationId,
    raw: RawImage,
    options: CompressOptions,
}

/// Pending replies, keyed by correlation id.
#[derive(Debug, Default)]
pub(crate) struct ReplyRouter {
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<Reply>>>,
}

impl ReplyRouter {
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(&self, id: CorrelationId) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        rx
    }

    /// Resolve the caller waiting on `id`. Replies nobody is waiting for are
    /// logged and dropped.
    pub(crate) fn deliver(&self, id: CorrelationId, reply: Reply) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            warn!(id, "dropping compression reply with unknown correlation id");
            return false;
        };
        if tx.send(reply).is_err() {
            debug!(id, "caller stopped waiting for compression reply");
            return false;
        }
        true
    }

    pub(crate) fn forget(&self, id: CorrelationId) {
        self.lock().remove(&id);
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

/// Compressor backed by the `bildwerk-compress` thread.
#[derive(Debug)]
pub struct OffloadedCompressor {
    requests: Option<mpsc::Sender<CompressRequest>>,
    router: Arc<ReplyRouter>,
    next_id: AtomicU64,
    reply_timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl OffloadedCompressor {
    /// Start the worker thread.
    pub fn spawn(reply_timeout: Duration) -> Result<Self> {
        Self::spawn_with(reply_timeout, compress::compress)
    }

    pub(crate) fn spawn_with(reply_timeout: Duration, job: WorkerJob) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<CompressRequest>();
        let router = Arc::new(ReplyRouter::default());
        let worker_router = Arc::clone(&router);

        let handle = std::thread::Builder::new()
            .name("bildwerk-compress".into())
            .spawn(move || run_worker(rx, worker_router, job))
            .map_err(|err| {
                BildwerkError::WorkerUnavailable(format!("failed to spawn worker thread: {err}"))
            })?;

        Ok(Self {
            requests: Some(tx),
            router,
            next_id: AtomicU64::new(1),
            reply_timeout,
            handle: Some(handle),
        })
    }

    /// One round trip through the worker. Errors here are worker-side and
    /// trigger the inline fallback.
    async fn round_trip(&self, raw: RawImage, options: CompressOptions) -> Result<CompressedImage> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reply = self.router.register(id);

        let sent = match &self.requests {
            Some(sender) => sender.send(CompressRequest { id, raw, options }).is_ok(),
            None => false,
        };
        if !sent {
            self.router.forget(id);
            return Err(BildwerkError::WorkerUnavailable(
                "request channel closed".into(),
            ));
        }

        match tokio::time::timeout(self.reply_timeout, reply).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BildwerkError::WorkerTransferFailed(format!(
                "reply {id} dropped"
            ))),
            Err(_) => {
                self.router.forget(id);
                Err(BildwerkError::WorkerTransferFailed(format!(
                    "no reply for {id} within {:?}",
                    self.reply_timeout
                )))
            }
        }
    }
}

impl Compressor for OffloadedCompressor {
    fn compress(
        &self,
        raw: RawImage,
        options: CompressOptions,
    ) -> impl std::future::Future<Output = Result<CompressedImage>> + Send {
        async move {
            match self.round_trip(raw.clone(), options).await {
                Ok(compressed) => Ok(compressed),
                Err(err) => {
                    // An error computed on the worker is re-run inline as well;
                    // the caller only ever sees the inline outcome.
                    if err.is_worker_failure() {
                        warn!(error = %err, name = raw.name(), "compression worker failed, retrying inline");
                    } else {
                        warn!(error = %err, name = raw.name(), "worker reported an error, retrying inline");
                    }
                    compress::compress(&raw, &options)
                }
            }
        }
    }

    fn label(&self) -> &'static str {
        "offloaded"
    }
}

impl Drop for OffloadedCompressor {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once queued jobs are done.
        self.requests.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Never block the caller on a job it already timed out on.
        if !handle.is_finished() {
            debug!("compression worker still busy, detaching");
            return;
        }
        if handle.join().is_err() {
            warn!("compression worker exited with a panic");
        }
    }
}

fn run_worker(requests: mpsc::Receiver<CompressRequest>, router: Arc<ReplyRouter>, job: WorkerJob) {
    debug!("compression worker running");
    for request in requests {
        let CompressRequest { id, raw, options } = request;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&raw, &options)))
            .unwrap_or_else(|_| {
                Err(BildwerkError::WorkerTransferFailed(format!(
                    "worker panicked while compressing {}",
                    raw.name()
                )))
            });
        router.deliver(id, outcome);
    }
    debug!("compression worker stopped");
}
