//! Batch Accumulator/Executor
//!
//! Collects operations into bounded composite requests, sends one composite
//! request at a time, and routes every per-item outcome back to the operation
//! that produced it. Retryable failures wait in the [`RetryQueue`] until
//! `process_retries` re-admits them.
//!
//! Everything runs on the caller's task. The only suspension points are the
//! service call and the bounded sleep in the retry drain.

use crate::batch::cancel::CancellationSignal;
use crate::batch::retry::RetryQueue;
use crate::batch::settings::BatchSettings;
use crate::batch::stats::BatchStats;
use crate::error::{ApiError, RpcError};
use crate::fault::FaultClassifier;
use crate::operation::{Disposition, OperationContext, OperationHost, OperationKind, RetryBudget};
use crate::rpc::{ItemOutcome, OrganizationService};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub struct BatchExecutor {
    service: Arc<dyn OrganizationService>,
    host: Arc<dyn OperationHost>,
    settings: BatchSettings,
    classifier: FaultClassifier,
    cancel: CancellationSignal,
    /// Operations waiting for the next composite request, in queue order.
    pending: Vec<OperationContext>,
    retries: RetryQueue,
    stats: BatchStats,
}

impl BatchExecutor {
    pub fn new(
        service: Arc<dyn OrganizationService>,
        host: Arc<dyn OperationHost>,
        settings: BatchSettings,
        cancel: CancellationSignal,
    ) -> Result<Self, ApiError> {
        settings.validate()?;
        let classifier = FaultClassifier::new(&settings.fault_policy);
        Ok(Self {
            service,
            host,
            pending: Vec::with_capacity(settings.batch_size),
            settings,
            classifier,
            cancel,
            retries: RetryQueue::new(),
            stats: BatchStats::default(),
        })
    }

    /// Build a context carrying this executor's retry budget and pass-through flags.
    pub fn operation(&self, input: Value, kind: OperationKind) -> OperationContext {
        OperationContext::new(
            input,
            kind,
            RetryBudget::new(self.settings.retries, self.settings.initial_retry_delay),
            self.settings.pass_through.clone(),
        )
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn retry_len(&self) -> usize {
        self.retries.len()
    }

    /// Add an operation to the pending batch, executing the batch once it is
    /// full. With batching disabled the operation runs immediately.
    pub async fn queue_operation(&mut self, context: OperationContext) -> Result<(), ApiError> {
        if self.cancel.is_cancelled() {
            drop(context);
            self.stats.abandoned += 1;
            return Err(self.abandon_all());
        }
        self.stats.queued += 1;

        if !self.settings.is_batching() {
            let disposition = context
                .execute_non_batched(
                    self.service.as_ref(),
                    &self.classifier,
                    self.host.as_ref(),
                )
                .await;
            if !matches!(disposition, Disposition::Declined) {
                self.stats.single_calls += 1;
            }
            self.record(disposition);
            return Ok(());
        }

        self.pending.push(context);
        if self.pending.len() >= self.settings.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Execute whatever is pending, whatever its size.
    pub async fn flush(&mut self) -> Result<(), ApiError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(self.abandon_all());
        }
        let batch = std::mem::take(&mut self.pending);
        self.execute_batch(batch).await;
        Ok(())
    }

    /// Re-admit due retries, flush, and wait for the next deadline until the
    /// retry queue is empty. Blocks the caller while retries are outstanding.
    pub async fn process_retries(&mut self) -> Result<(), ApiError> {
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                return Err(self.abandon_all());
            }

            let mut due = self.retries.drain_due(Instant::now()).into_iter();
            if due.len() > 0 {
                debug!(count = due.len(), "Re-admitting due retries");
            }
            while let Some(context) = due.next() {
                if let Err(err) = self.queue_operation(context).await {
                    self.stats.abandoned += due.len();
                    return Err(err);
                }
            }
            self.flush().await?;

            let Some(next_due) = self.retries.next_due() else {
                return Ok(());
            };
            let now = Instant::now();
            if next_due > now {
                let wait = (next_due - now).min(self.settings.retry_poll_interval);
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    waiting = self.retries.len(),
                    "Waiting for next retry"
                );
                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }
    }

    /// Flush and drain retries, returning the final statistics.
    pub async fn finish(&mut self) -> Result<BatchStats, ApiError> {
        self.flush().await?;
        self.process_retries().await?;
        Ok(self.stats.clone())
    }

    async fn execute_batch(&mut self, batch: Vec<OperationContext>) {
        let host = Arc::clone(&self.host);
        let mut admitted = Vec::with_capacity(batch.len());
        for mut context in batch {
            if context.confirm(host.as_ref()) {
                admitted.push(context);
            } else {
                self.record(Disposition::Declined);
            }
        }
        if admitted.is_empty() {
            return;
        }

        let requests = admitted
            .iter_mut()
            .map(|context| context.create_request())
            .collect::<Vec<_>>();
        let size = requests.len();
        self.stats.composite_calls += 1;
        info!(size, "Executing batch");

        match self.service.execute_multiple(requests).await {
            Ok(outcomes) => {
                if outcomes.len() != size {
                    warn!(
                        expected = size,
                        received = outcomes.len(),
                        "Composite response size does not match batch"
                    );
                }
                let mut outcomes = outcomes.into_iter();
                for context in admitted {
                    let disposition = match outcomes.next() {
                        Some(ItemOutcome::Success(response)) => {
                            context.complete(response, host.as_ref());
                            Disposition::Completed
                        }
                        Some(ItemOutcome::Fault(fault)) => context.settle_failure(
                            RpcError::Fault(fault),
                            &self.classifier,
                            host.as_ref(),
                        ),
                        Some(ItemOutcome::Missing) | None => context.retry_or_report(
                            RpcError::Transport(
                                "no outcome returned for this item".to_string(),
                            ),
                            host.as_ref(),
                        ),
                    };
                    self.record(disposition);
                }
            }
            Err(err) => {
                warn!(size, error = %err, "Composite request failed");
                for context in admitted {
                    let disposition = context.retry_or_report(err.clone(), host.as_ref());
                    self.record(disposition);
                }
            }
        }
        debug!(
            succeeded = self.stats.succeeded,
            failed = self.stats.failed,
            waiting = self.retries.len(),
            "Batch finished"
        );
    }

    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Completed => self.stats.succeeded += 1,
            Disposition::Suppressed => self.stats.suppressed += 1,
            Disposition::Failed => self.stats.failed += 1,
            Disposition::Declined => self.stats.declined += 1,
            Disposition::RetryScheduled(context) => {
                self.stats.retries_scheduled += 1;
                self.retries.push(context);
            }
        }
    }

    /// Drop pending and retry-scheduled work after cancellation.
    fn abandon_all(&mut self) -> ApiError {
        let lost = self.pending.len() + self.retries.abandon();
        self.pending.clear();
        self.stats.abandoned += lost;
        if lost > 0 {
            warn!(abandoned = lost, "Cancelled with work outstanding");
        }
        ApiError::Cancelled
    }
}
