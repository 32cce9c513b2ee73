//! In-process task dispatcher for reconciliations.
//!
//! Payloads travel as raw JSON bytes through a bounded queue, so a payload
//! that cannot be decoded is a permanent failure of that task only.

use std::sync::Arc;

use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Engine, EngineError, ResultEngine};

use super::{Reconciler, RetryPolicy, SyncReport, SyncTask};

/// Producer side of the reconciliation queue.
#[derive(Clone, Debug)]
pub struct SyncQueue {
    sender: mpsc::Sender<Vec<u8>>,
}

impl SyncQueue {
    /// Bounded queue; `enqueue` waits while it is full.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub async fn enqueue(&self, family_id: Uuid, item_id: &str) -> ResultEngine<()> {
        let payload = SyncTask::new(family_id, item_id).to_payload()?;
        self.enqueue_raw(payload).await?;
        tracing::debug!(%family_id, %item_id, "reconciliation enqueued");
        Ok(())
    }

    /// Push an already-encoded payload.
    pub async fn enqueue_raw(&self, payload: Vec<u8>) -> ResultEngine<()> {
        self.sender
            .send(payload)
            .await
            .map_err(|_| EngineError::Cancelled)
    }
}

/// Decodes one payload and runs it with retries.
#[derive(Clone)]
pub struct SyncHandler {
    reconciler: Arc<Reconciler>,
    retry: RetryPolicy,
}

impl SyncHandler {
    pub fn new(reconciler: Arc<Reconciler>, retry: RetryPolicy) -> Self {
        Self { reconciler, retry }
    }

    /// Retriable errors are attempted again with backoff until the policy
    /// gives up or `shutdown` fires; every other error ends the task.
    pub async fn handle(
        &self,
        payload: &[u8],
        shutdown: &CancellationToken,
    ) -> ResultEngine<SyncReport> {
        let task = SyncTask::from_payload(payload)?;
        self.retry
            .retry_async(
                |attempt| {
                    let task = &task;
                    async move {
                        if attempt > 0 {
                            tracing::debug!(item_id = %task.item_id, attempt, "retrying reconciliation");
                        }
                        Engine::cancellable(shutdown, self.reconciler.reconcile(task)).await
                    }
                },
                |err: &EngineError| err.is_retriable() && !shutdown.is_cancelled(),
            )
            .await
    }
}

/// Consumer side: a bounded pool of reconciliation tasks.
pub struct SyncWorker {
    handler: SyncHandler,
    receiver: mpsc::Receiver<Vec<u8>>,
    concurrency: usize,
}

impl SyncWorker {
    pub fn new(handler: SyncHandler, receiver: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            handler,
            receiver,
            concurrency: 10,
        }
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Consume payloads until `shutdown` fires or every producer is gone,
    /// then wait for the tasks in flight.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        tracing::info!(concurrency = self.concurrency, "sync worker started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                payload = self.receiver.recv() => {
                    let Some(payload) = payload else { break };
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let handler = self.handler.clone();
                    let token = shutdown.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        match handler.handle(&payload, &token).await {
                            Ok(report) => tracing::debug!(?report, "sync task done"),
                            Err(err @ EngineError::MalformedPayload(_)) => {
                                tracing::error!("dropping sync task: {err}");
                            }
                            Err(err) => tracing::error!(
                                retriable = err.is_retriable(),
                                "sync task failed: {err}"
                            ),
                        }
                    });
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("sync worker stopped");
    }
}
