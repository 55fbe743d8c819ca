//! The backlog worker.

use crate::handler::{Inner, TxBacklogMsg};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

/// Sole consumer of the backlog and post-verification queues.
///
/// Each iteration drains the post-verification queue before admitting new
/// arrivals: verified items hold a reserved slot and preferring them bounds
/// the staleness of in-flight verifications and keeps the verification pool
/// from backing up on its output side. The asymmetric drain also guarantees
/// forward progress under a continuous flood of new arrivals.
pub(crate) struct BacklogWorker {
    inner: Arc<Inner>,
    backlog_rx: mpsc::Receiver<TxBacklogMsg>,
    postverify_rx: mpsc::Receiver<TxBacklogMsg>,
    cancel: CancellationToken,
}

impl BacklogWorker {
    pub(crate) fn new(
        inner: Arc<Inner>,
        backlog_rx: mpsc::Receiver<TxBacklogMsg>,
        postverify_rx: mpsc::Receiver<TxBacklogMsg>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            backlog_rx,
            postverify_rx,
            cancel,
        }
    }

    /// Run until cancelled or either queue closes.
    pub(crate) async fn run(mut self) {
        loop {
            // Prioritize the post-verification queue.
            match self.postverify_rx.try_recv() {
                Ok(msg) => {
                    self.inner.process_post_verified(msg);
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return,
            }

            // No more post-verification items; wait for whichever queue
            // produces first, or for shutdown.
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return,

                msg = self.postverify_rx.recv() => match msg {
                    Some(msg) => self.inner.process_post_verified(msg),
                    None => return,
                },

                msg = self.backlog_rx.recv() => match msg {
                    Some(mut msg) => {
                        if self.inner.check_already_committed(&mut msg) {
                            continue;
                        }
                        self.inner.dispatch_verification(msg);
                    }
                    None => return,
                },
            }
        }
    }
}
