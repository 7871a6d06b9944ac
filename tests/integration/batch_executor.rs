//! Integration tests for the Batch Accumulator/Executor
//!
//! Tests cover:
//! - Composite call sizing and ordering
//! - Non-batched fallback equivalence
//! - Transport failures and backoff retries on virtual time
//! - Retry exhaustion, idempotent delete, confirmation and cancellation

use crate::integration::test_utils::{
    build_executor, echo, executor_with_cancel, numbered_invoke, queue_numbered, settings,
    RecordingHost, ScriptedService,
};
use bulkop::batch::CancellationSignal;
use bulkop::error::ApiError;
use bulkop::fault::{codes, Fault};
use bulkop::operation::OperationKind;
use bulkop::record::{EntityReference, Record};
use bulkop::rpc::{BypassMode, OrganizationRequest, OrganizationResponse, PassThrough};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

fn throttled() -> Fault {
    Fault::new(codes::REQUEST_LIMIT_EXCEEDED, "Number of requests exceeded the limit")
}

fn is_ping(request: &OrganizationRequest, n: usize) -> bool {
    request.request_name == format!("Ping{}", n)
}

#[tokio::test(start_paused = true)]
async fn test_250_operations_split_100_100_50_in_order() {
    let service = ScriptedService::succeeding();
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(100, 0, 5));

    queue_numbered(&mut executor, 250).await;
    // Two full batches went out while queueing; the tail waits for finish.
    assert_eq!(service.batch_sizes(), vec![100, 100]);
    assert_eq!(executor.pending_len(), 50);

    let stats = executor.finish().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![100, 100, 50]);
    assert_eq!(stats.composite_calls, 3);
    assert_eq!(stats.succeeded, 250);

    let outputs = host.outputs.lock();
    let order: Vec<u64> = outputs
        .iter()
        .map(|output| output["results"]["n"].as_u64().unwrap())
        .collect();
    assert_eq!(order, (0..250).collect::<Vec<u64>>());

    // Requests inside each call keep queue order too.
    let calls = service.calls();
    assert!(is_ping(&calls[2].requests[0], 200));
    assert!(is_ping(&calls[2].requests[49], 249));
}

#[tokio::test(start_paused = true)]
async fn test_composite_calls_equal_ceil_n_over_b() {
    for (count, batch_size) in [(7usize, 3usize), (9, 3), (1, 1000), (0, 10)] {
        let service = ScriptedService::succeeding();
        let host = RecordingHost::new();
        let mut executor = build_executor(&service, &host, settings(batch_size, 0, 5));
        queue_numbered(&mut executor, count).await;
        let stats = executor.finish().await.unwrap();
        let expected = (count + batch_size - 1) / batch_size;
        assert_eq!(stats.composite_calls, expected, "N={} B={}", count, batch_size);
        assert_eq!(service.batch_sizes().len(), expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_flush_sends_a_batch_of_one() {
    let service = ScriptedService::succeeding();
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(100, 0, 5));

    queue_numbered(&mut executor, 1).await;
    executor.flush().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![1]);

    // Nothing pending: no call at all.
    executor.flush().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![1]);
}

/// Mixed workload: successes, a permanent fault and a missing record under if-exists.
fn mixed_responder(request: &OrganizationRequest) -> Result<OrganizationResponse, Fault> {
    match request.request_name.as_str() {
        "Delete" => Err(Fault::not_found("Entity Does Not Exist")),
        "Create" => Err(Fault::new(0x8004_0203_u32 as i32, "Required field missing")),
        _ => Ok(echo(request)),
    }
}

fn mixed_operations() -> Vec<(serde_json::Value, OperationKind)> {
    let mut ops: Vec<_> = (0..3).map(numbered_invoke).collect();
    ops.push((
        json!({"table": "account"}),
        OperationKind::Create {
            record: Record::new("account").with_attribute("name", json!("Contoso")),
        },
    ));
    ops.push((
        json!({"table": "account", "id": Uuid::nil()}),
        OperationKind::Delete {
            target: EntityReference::new("account", Uuid::nil()),
            if_exists: true,
            intersect: None,
        },
    ));
    ops
}

#[tokio::test(start_paused = true)]
async fn test_batch_size_one_matches_non_batched_path() {
    let settings_one = settings(1, 2, 1);

    // Batch size 1 through the executor.
    let service = ScriptedService::with_responder(mixed_responder);
    let host = RecordingHost::new();
    let mut exec = build_executor(&service, &host, settings_one.clone());
    for (input, kind) in mixed_operations() {
        let context = exec.operation(input, kind);
        exec.queue_operation(context).await.unwrap();
    }
    let stats = exec.finish().await.unwrap();
    assert!(service.batch_sizes().is_empty(), "no composite calls when batching is off");
    assert_eq!(service.single_call_count(), 5);
    assert_eq!(stats.single_calls, 5);

    // The same operations through the single-call path directly.
    let direct_service = ScriptedService::with_responder(mixed_responder);
    let direct_host = RecordingHost::new();
    let classifier = bulkop::fault::FaultClassifier::new(&settings_one.fault_policy);
    let reference = build_executor(&direct_service, &direct_host, settings_one);
    for (input, kind) in mixed_operations() {
        let context = reference.operation(input, kind);
        context
            .execute_non_batched(&*direct_service, &classifier, &*direct_host)
            .await;
    }

    assert_eq!(host.output_count(), direct_host.output_count());
    assert_eq!(host.error_count(), direct_host.error_count());
    assert_eq!(host.verbose_count(), direct_host.verbose_count());
    assert_eq!(*host.prompts.lock(), *direct_host.prompts.lock());
    assert_eq!(host.output_count(), 3);
    assert_eq!(host.error_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_schedules_whole_batch_then_reexecutes_it() {
    let service = ScriptedService::succeeding();
    service.fail_next_composite(1);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(10, 2, 2));

    let start = Instant::now();
    queue_numbered(&mut executor, 10).await;

    // The batch was full, so it executed and every item went to the retry queue.
    assert_eq!(service.batch_sizes(), vec![10]);
    assert_eq!(executor.retry_len(), 10);
    assert_eq!(executor.stats().retries_scheduled, 10);
    assert_eq!(host.error_count(), 0);

    executor.process_retries().await.unwrap();

    let calls = service.calls();
    assert_eq!(service.batch_sizes(), vec![10, 10]);
    assert_eq!(calls[1].at - start, Duration::from_secs(2));
    for (n, request) in calls[1].requests.iter().enumerate() {
        assert!(is_ping(request, n));
    }
    assert_eq!(host.output_count(), 10);
    assert_eq!(executor.retry_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_exactly_once() {
    let service = ScriptedService::with_responder(|_| Err(throttled()));
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(5, 2, 2));

    let start = Instant::now();
    queue_numbered(&mut executor, 1).await;
    let stats = executor.finish().await.unwrap();

    let calls = service.calls();
    assert_eq!(calls.len(), 3, "first attempt plus two retries");
    assert_eq!(calls[1].at - start, Duration::from_secs(2));
    assert_eq!(calls[2].at - start, Duration::from_secs(6));
    assert_eq!(stats.retries_scheduled, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(host.error_count(), 1);
    assert!(host.errors.lock()[0].0.contains("after 3 attempts"));
    assert_eq!(host.errors.lock()[0].1, json!({"n": 0}));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_fault_is_not_retried() {
    let service = ScriptedService::with_responder(|request| {
        if is_ping(request, 1) {
            Err(Fault::new(0x8004_0220_u32 as i32, "Principal user is missing privilege"))
        } else {
            Ok(echo(request))
        }
    });
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(10, 3, 1));

    queue_numbered(&mut executor, 3).await;
    let stats = executor.finish().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![3]);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries_scheduled, 0);
    assert_eq!(host.errors.lock()[0].1, json!({"n": 1}));
}

#[tokio::test(start_paused = true)]
async fn test_only_retryable_items_are_requeued() {
    let throttled_once = parking_lot::Mutex::new(false);
    let service = ScriptedService::with_responder(move |request| {
        let mut done = throttled_once.lock();
        if is_ping(request, 2) && !*done {
            *done = true;
            return Err(throttled());
        }
        Ok(echo(request))
    });
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(4, 1, 1));

    queue_numbered(&mut executor, 6).await;
    let stats = executor.finish().await.unwrap();

    // [0..4], then [4, 5], then the retried item alone.
    assert_eq!(service.batch_sizes(), vec![4, 2, 1]);
    assert!(is_ping(&service.calls()[2].requests[0], 2));
    assert_eq!(stats.succeeded, 6);

    // The retried item completes after items from the later batch.
    let order: Vec<u64> = host
        .outputs
        .lock()
        .iter()
        .map(|output| output["results"]["n"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![0, 1, 3, 4, 5, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_short_composite_response_retries_missing_items() {
    let service = ScriptedService::succeeding();
    service.truncate_next_composite(3);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(5, 1, 1));

    queue_numbered(&mut executor, 5).await;
    let stats = executor.finish().await.unwrap();

    assert_eq!(service.batch_sizes(), vec![5, 2]);
    assert!(is_ping(&service.calls()[1].requests[0], 3));
    assert_eq!(stats.succeeded, 5);
    assert_eq!(stats.retries_scheduled, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_position_retries_only_that_item() {
    let service = ScriptedService::succeeding();
    service.miss_next_composite(1);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(3, 1, 1));

    queue_numbered(&mut executor, 3).await;
    let stats = executor.finish().await.unwrap();

    assert_eq!(service.batch_sizes(), vec![3, 1]);
    assert!(is_ping(&service.calls()[1].requests[0], 1));
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.retries_scheduled, 1);
    assert_eq!(host.output_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_position_without_budget_fails_alone() {
    let service = ScriptedService::succeeding();
    service.miss_next_composite(1);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(3, 0, 1));

    queue_numbered(&mut executor, 3).await;
    let stats = executor.finish().await.unwrap();

    assert_eq!(service.batch_sizes(), vec![3]);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(host.errors.lock()[0].1, json!({ "n": 1 }));
}

fn delete_missing(if_exists: bool) -> (serde_json::Value, OperationKind) {
    let id = Uuid::new_v4();
    (
        json!({"table": "contact", "id": id}),
        OperationKind::Delete {
            target: EntityReference::new("contact", id),
            if_exists,
            intersect: None,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_idempotent_delete_of_missing_record() {
    let responder = |_: &OrganizationRequest| -> Result<OrganizationResponse, Fault> {
        Err(Fault::not_found("contact With Id Does Not Exist"))
    };

    let service = ScriptedService::with_responder(responder);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(10, 3, 1));
    let (input, kind) = delete_missing(true);
    let context = executor.operation(input, kind);
    executor.queue_operation(context).await.unwrap();
    let stats = executor.finish().await.unwrap();
    assert_eq!(host.error_count(), 0);
    assert_eq!(host.verbose_count(), 1);
    assert_eq!(stats.suppressed, 1);

    let service = ScriptedService::with_responder(responder);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(10, 3, 1));
    let (input, kind) = delete_missing(false);
    let context = executor.operation(input, kind);
    executor.queue_operation(context).await.unwrap();
    executor.finish().await.unwrap();
    assert_eq!(host.error_count(), 1);
    assert_eq!(service.calls().len(), 1, "not-found is permanent");
}

#[tokio::test(start_paused = true)]
async fn test_not_found_matched_by_message_when_code_is_generic() {
    let service = ScriptedService::with_responder(|_| {
        Err(Fault::new(0, "Generic failure")
            .with_inner(Fault::new(0, "contact with id 42 does not exist")))
    });
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(10, 0, 1));
    let (input, kind) = delete_missing(true);
    let context = executor.operation(input, kind);
    executor.queue_operation(context).await.unwrap();
    executor.finish().await.unwrap();
    assert_eq!(host.error_count(), 0);
    assert_eq!(host.verbose_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_declined_confirmation_makes_no_call_and_no_output() {
    let service = ScriptedService::succeeding();
    let host = RecordingHost::declining(["Ping1".to_string()]);
    let mut executor = build_executor(&service, &host, settings(10, 0, 1));

    queue_numbered(&mut executor, 3).await;
    let stats = executor.finish().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![2]);
    assert!(service.calls()[0]
        .requests
        .iter()
        .all(|request| !is_ping(request, 1)));
    assert_eq!(stats.declined, 1);
    assert_eq!(host.output_count(), 2);
    assert_eq!(host.error_count(), 0);

    // Everything declined: no call at all.
    let service = ScriptedService::succeeding();
    let host = RecordingHost::declining(["Ping0".to_string()]);
    let mut executor = build_executor(&service, &host, settings(1, 0, 1));
    queue_numbered(&mut executor, 1).await;
    executor.finish().await.unwrap();
    assert!(service.calls().is_empty());
    assert_eq!(host.output_count() + host.error_count() + host.verbose_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_do_not_prompt_again() {
    let service = ScriptedService::succeeding();
    service.fail_next_composite(1);
    let host = RecordingHost::new();
    let mut executor = build_executor(&service, &host, settings(2, 1, 1));

    queue_numbered(&mut executor, 2).await;
    executor.finish().await.unwrap();
    assert_eq!(service.batch_sizes(), vec![2, 2]);
    assert_eq!(host.prompts.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pass_through_flags_on_every_request() {
    let service = ScriptedService::succeeding();
    let host = RecordingHost::new();
    let mut batch_settings = settings(3, 0, 1);
    batch_settings.pass_through = PassThrough {
        bypass_business_logic_execution: vec![BypassMode::CustomSync, BypassMode::CustomAsync],
        bypass_step_ids: vec!["0d4a7b5c-0000-0000-0000-000000000001".to_string()],
    };
    let mut executor = build_executor(&service, &host, batch_settings);

    queue_numbered(&mut executor, 3).await;
    executor.finish().await.unwrap();
    for request in &service.calls()[0].requests {
        assert_eq!(
            request.parameters["BypassBusinessLogicExecution"],
            json!("CustomSync,CustomAsync")
        );
        assert!(request
            .parameters
            .contains_key("BypassBusinessLogicExecutionStepIds"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_queue_abandons_pending_work() {
    let service = ScriptedService::succeeding();
    let host = RecordingHost::new();
    let cancel = CancellationSignal::new();
    let mut executor = executor_with_cancel(&service, &host, settings(10, 0, 1), cancel.clone());

    queue_numbered(&mut executor, 4).await;
    cancel.cancel();

    let (input, kind) = numbered_invoke(4);
    let context = executor.operation(input, kind);
    assert!(matches!(
        executor.queue_operation(context).await,
        Err(ApiError::Cancelled)
    ));
    assert!(matches!(executor.flush().await, Ok(())));
    assert!(service.calls().is_empty());
    assert_eq!(executor.stats().abandoned, 5);
    assert_eq!(executor.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retry_wait() {
    let service = ScriptedService::with_responder(|_| Err(throttled()));
    let host = RecordingHost::new();
    let cancel = CancellationSignal::new();
    let mut executor = executor_with_cancel(&service, &host, settings(3, 3, 60), cancel.clone());

    queue_numbered(&mut executor, 3).await;
    assert_eq!(executor.retry_len(), 3);

    let start = Instant::now();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            cancel.cancel();
        })
    };
    let result = executor.process_retries().await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(ApiError::Cancelled)));
    assert!(Instant::now() - start < Duration::from_secs(60));
    assert_eq!(service.calls().len(), 1, "no retry ran before cancellation");
    assert_eq!(executor.stats().abandoned, 3);
    assert_eq!(executor.retry_len(), 0);
    assert_eq!(host.error_count(), 0);
}
