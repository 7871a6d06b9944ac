//! Operation context: one pending unit of work and its retry state.

use crate::error::RpcError;
use crate::fault::{Fault, FaultClass, FaultClassifier};
use crate::operation::host::{OperationFailure, OperationHost};
use crate::operation::kind::OperationKind;
use crate::rpc::{OrganizationRequest, OrganizationResponse, OrganizationService, PassThrough};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stand-in deadline when a backoff delay does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Delay before retry `attempt` (1-based): `initial * 2^(attempt - 1)`, saturating.
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    initial.saturating_mul(factor)
}

/// Retry allowance of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub total: u32,
    pub remaining: u32,
    pub initial_delay: Duration,
}

impl RetryBudget {
    pub fn new(total: u32, initial_delay: Duration) -> Self {
        Self {
            total,
            remaining: total,
            initial_delay,
        }
    }

    /// 1-based number of the retry that would be scheduled next.
    pub fn next_attempt(&self) -> u32 {
        self.total - self.remaining + 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Where an operation ended up after one execution attempt.
#[derive(Debug)]
pub enum Disposition {
    Completed,
    /// Fault accepted under policy; diagnostic only.
    Suppressed,
    Failed,
    /// Confirmation declined; nothing was sent.
    Declined,
    /// Back to the caller for the retry queue.
    RetryScheduled(OperationContext),
}

/// One pending record operation.
#[derive(Debug)]
pub struct OperationContext {
    input: Value,
    kind: OperationKind,
    request: Option<OrganizationRequest>,
    pass_through: PassThrough,
    budget: RetryBudget,
    next_retry_at: Option<Instant>,
    confirmed: bool,
    attempts: u32,
}

impl OperationContext {
    pub fn new(
        input: Value,
        kind: OperationKind,
        budget: RetryBudget,
        pass_through: PassThrough,
    ) -> Self {
        Self {
            input,
            kind,
            request: None,
            pass_through,
            budget,
            next_retry_at: None,
            confirmed: false,
            attempts: 0,
        }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Last request built by [`Self::create_request`].
    pub fn request(&self) -> Option<&OrganizationRequest> {
        self.request.as_ref()
    }

    pub fn retries_remaining(&self) -> u32 {
        self.budget.remaining
    }

    /// `None` means eligible now.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.next_retry_at
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }

    /// Calls made so far for this operation.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Build the request from current state and count the attempt.
    pub fn create_request(&mut self) -> OrganizationRequest {
        let mut request = self.kind.build_request();
        request.apply(&self.pass_through);
        self.request = Some(request.clone());
        self.attempts += 1;
        request
    }

    /// Ask the confirmation gate once; retries reuse the first answer.
    pub fn confirm(&mut self, host: &dyn OperationHost) -> bool {
        if !self.confirmed {
            self.confirmed = host.should_process(&self.kind.target(), self.kind.action());
        }
        self.confirmed
    }

    /// Handle faults this operation kind recognises locally. Returns true when
    /// the fault must not be escalated.
    pub fn handle_fault(&self, fault: &Fault, host: &dyn OperationHost) -> bool {
        if self.kind.is_idempotent_delete() && fault.is_not_found() {
            host.write_verbose(&format!(
                "{} was not present; nothing to delete",
                self.kind.target()
            ));
            return true;
        }
        false
    }

    /// Consume one retry and set the next eligible time.
    pub fn schedule_retry(&mut self, error: &RpcError, host: &dyn OperationHost) {
        let attempt = self.budget.next_attempt();
        let delay = backoff_delay(self.budget.initial_delay, attempt);
        self.budget.remaining = self.budget.remaining.saturating_sub(1);
        let now = Instant::now();
        self.next_retry_at = Some(
            now.checked_add(delay)
                .or_else(|| now.checked_add(FAR_FUTURE))
                .unwrap_or(now),
        );

        let wall_clock = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "a later time".to_string());
        debug!(
            target_record = %self.kind.target(),
            attempt,
            delay_secs = delay.as_secs(),
            retries_remaining = self.budget.remaining,
            "Retry scheduled"
        );
        host.write_verbose(&format!(
            "{} {} failed ({}); retry {} of {} in {}s at {}",
            self.kind.action(),
            self.kind.target(),
            error,
            attempt,
            self.budget.total,
            delay.as_secs(),
            wall_clock
        ));
    }

    /// Report a terminal failure against the source record.
    pub fn report_error(self, error: RpcError, host: &dyn OperationHost) {
        warn!(
            target_record = %self.kind.target(),
            attempts = self.attempts,
            error = %error,
            "Operation failed"
        );
        let failure = OperationFailure {
            action: self.kind.action(),
            target: self.kind.target(),
            attempts: self.attempts,
            error,
        };
        host.write_error(&failure, &self.input);
    }

    /// Emit the success result.
    pub fn complete(self, response: OrganizationResponse, host: &dyn OperationHost) {
        let id = self.kind.result_id(&response);
        host.write_verbose(&format!(
            "{} {} succeeded",
            self.kind.action(),
            self.kind.target()
        ));
        host.write_output(json!({
            "action": self.kind.action(),
            "target": self.kind.target(),
            "id": id,
            "results": response.results,
        }));
    }

    /// Route a failed attempt: local handling, then classification.
    pub fn settle_failure(
        self,
        error: RpcError,
        classifier: &FaultClassifier,
        host: &dyn OperationHost,
    ) -> Disposition {
        if let Some(fault) = error.fault() {
            if self.handle_fault(fault, host) {
                return Disposition::Suppressed;
            }
        }
        match classifier.classify(&error) {
            FaultClass::Suppressed => {
                host.write_verbose(&format!(
                    "{} {}: ignoring {}",
                    self.kind.action(),
                    self.kind.target(),
                    error
                ));
                Disposition::Suppressed
            }
            FaultClass::Retryable => self.retry_or_report(error, host),
            FaultClass::Permanent => {
                self.report_error(error, host);
                Disposition::Failed
            }
        }
    }

    /// Schedule a retry while budget remains, otherwise report the error.
    pub fn retry_or_report(mut self, error: RpcError, host: &dyn OperationHost) -> Disposition {
        if self.budget.is_exhausted() {
            self.report_error(error, host);
            return Disposition::Failed;
        }
        self.schedule_retry(&error, host);
        Disposition::RetryScheduled(self)
    }

    /// Single-call path used when batching is disabled.
    pub async fn execute_non_batched(
        mut self,
        service: &dyn OrganizationService,
        classifier: &FaultClassifier,
        host: &dyn OperationHost,
    ) -> Disposition {
        if !self.confirm(host) {
            return Disposition::Declined;
        }
        let request = self.create_request();
        match service.execute(request).await {
            Ok(response) => {
                self.complete(response, host);
                Disposition::Completed
            }
            Err(error) => self.settle_failure(error, classifier, host),
        }
    }
}
