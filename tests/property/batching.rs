//! Property tests for composite call sizing

use async_trait::async_trait;
use bulkop::batch::{BatchExecutor, BatchSettings, CancellationSignal};
use bulkop::error::RpcError;
use bulkop::operation::{OperationFailure, OperationHost, OperationKind};
use bulkop::rpc::{ItemOutcome, OrganizationRequest, OrganizationResponse, OrganizationService};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
struct CountingService {
    composite_sizes: Mutex<Vec<usize>>,
    single_calls: Mutex<usize>,
}

#[async_trait]
impl OrganizationService for CountingService {
    async fn execute(&self, request: OrganizationRequest) -> Result<OrganizationResponse, RpcError> {
        *self.single_calls.lock() += 1;
        Ok(OrganizationResponse::new(request.request_name))
    }

    async fn execute_multiple(
        &self,
        requests: Vec<OrganizationRequest>,
    ) -> Result<Vec<ItemOutcome>, RpcError> {
        self.composite_sizes.lock().push(requests.len());
        Ok(requests
            .into_iter()
            .map(|request| ItemOutcome::Success(OrganizationResponse::new(request.request_name)))
            .collect())
    }
}

#[derive(Default)]
struct CountingHost {
    outputs: Mutex<usize>,
}

impl OperationHost for CountingHost {
    fn write_verbose(&self, _message: &str) {}
    fn write_error(&self, _failure: &OperationFailure, _input: &Value) {}
    fn write_output(&self, _output: Value) {
        *self.outputs.lock() += 1;
    }
    fn should_process(&self, _target: &str, _action: &str) -> bool {
        true
    }
}

/// With no failures, N operations at batch size B take ceil(N / B) composite
/// calls, every call but the last is full, and batch size 1 never batches.
#[test]
fn test_composite_call_count_property() {
    let mut runner =
        proptest::test_runner::TestRunner::new(proptest::test_runner::Config::with_cases(64));

    runner
        .run(&(0usize..400, 1usize..150), |(count, batch_size)| {
            let service = Arc::new(CountingService::default());
            let host = Arc::new(CountingHost::default());
            let settings = BatchSettings {
                batch_size,
                ..BatchSettings::default()
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let stats = runtime.block_on(async {
                let mut executor = BatchExecutor::new(
                    service.clone(),
                    host.clone(),
                    settings,
                    CancellationSignal::new(),
                )
                .unwrap();
                for n in 0..count {
                    let context = executor.operation(
                        Value::from(n),
                        OperationKind::Invoke {
                            request_name: format!("Request{}", n),
                            parameters: Default::default(),
                        },
                    );
                    executor.queue_operation(context).await.unwrap();
                }
                executor.finish().await.unwrap()
            });

            let sizes = service.composite_sizes.lock().clone();
            if batch_size == 1 {
                prop_assert!(sizes.is_empty());
                prop_assert_eq!(*service.single_calls.lock(), count);
            } else {
                prop_assert_eq!(sizes.len(), (count + batch_size - 1) / batch_size);
                if let Some((last, full)) = sizes.split_last() {
                    prop_assert!(full.iter().all(|&size| size == batch_size));
                    prop_assert!(*last >= 1 && *last <= batch_size);
                }
                prop_assert_eq!(sizes.iter().sum::<usize>(), count);
            }
            prop_assert_eq!(stats.succeeded, count);
            prop_assert_eq!(*host.outputs.lock(), count);
            Ok(())
        })
        .unwrap();
}
