//! The batch executor: chunked, concurrent execution of write operations
//! with positional result correlation.
//!
//! Operations are split into chunks of at most the server's per-request cap.
//! Chunks run concurrently under the shared concurrency limiter; a chunk
//! whose transport fails is retried as a unit, but a partial-success
//! response is final and its per-item errors are reported as-is. Outcomes
//! come back in input order regardless of chunk completion order.

use std::time::Duration;

use futures::StreamExt;
use log::debug;
use serde_json::{Value, json};
use tokio::time::Instant;

use super::operation::{BatchOutcome, Operation};
use crate::error::{Error, Result};
use crate::resilience::{ConcurrencyLimiter, RetryPolicy};

/// Wire error code reported for outcomes manufactured from a chunk-level
/// transport failure.
const CHUNK_FAILURE_CODE: i64 = 100;

/// An ordered list of operations ready for chunked execution.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    operations: Vec<Operation>,
}

impl BatchRequest {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Split into chunks of at most `cap` operations, preserving order.
    pub fn chunks(&self, cap: usize) -> Vec<&[Operation]> {
        self.operations.chunks(cap.max(1)).collect()
    }

    /// The request body for one chunk.
    pub fn chunk_body(chunk: &[Operation], mount: &str) -> Value {
        let requests: Vec<Value> = chunk.iter().map(|op| op.to_wire(mount)).collect();
        json!({ "requests": requests })
    }
}

/// Decode a chunk response into per-operation outcomes.
///
/// The server answers with one array element per sub-request, each either
/// `{"success": ...}` or `{"error": {"code": ..., "error": ...}}`.
pub fn parse_chunk_response(response: &Value, expected: usize) -> Result<Vec<BatchOutcome>> {
    let items = response
        .as_array()
        .ok_or_else(|| Error::Transport("batch response is not an array".into()))?;
    if items.len() != expected {
        return Err(Error::Transport(format!(
            "batch response has {} results for {expected} operations",
            items.len()
        )));
    }

    Ok(items
        .iter()
        .map(|item| {
            if let Some(success) = item.get("success") {
                return BatchOutcome::Success(success.clone());
            }
            match item.get("error") {
                Some(error) => BatchOutcome::Error {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                    message: error
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                },
                None => BatchOutcome::Error {
                    code: -1,
                    message: "malformed batch result entry".into(),
                },
            }
        })
        .collect())
}

/// Execute a batch through `send_chunk`, which performs one POST to the
/// batch endpoint and returns the decoded response body.
///
/// The deadline, when given, is shared by every chunk and all of their
/// retry attempts. A chunk that fails past retry contributes one error
/// outcome per operation instead of sinking the whole call.
pub async fn execute<F, Fut>(
    request: &BatchRequest,
    mount: &str,
    cap: usize,
    limiter: &ConcurrencyLimiter,
    retry: &RetryPolicy,
    deadline: Option<Duration>,
    send_chunk: F,
) -> Vec<BatchOutcome>
where
    F: Fn(usize, Value) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    if request.is_empty() {
        return Vec::new();
    }

    let started = Instant::now();
    let chunks = request.chunks(cap);
    debug!(
        "executing batch of {} operations as {} chunks",
        request.len(),
        chunks.len()
    );

    let send_chunk = &send_chunk;
    let outcomes: Vec<Vec<BatchOutcome>> = futures::stream::iter(
        chunks.into_iter().enumerate().map(|(index, chunk)| {
            let body = BatchRequest::chunk_body(chunk, mount);
            async move {
                let _permit = limiter.acquire().await;
                let remaining =
                    deadline.map(|total| total.saturating_sub(started.elapsed()));

                let result = retry
                    .execute("batch chunk", remaining, || {
                        send_chunk(index, body.clone())
                    })
                    .await
                    .and_then(|response| parse_chunk_response(&response, chunk.len()));

                match result {
                    Ok(outcomes) => outcomes,
                    Err(err) => {
                        let code = match &err {
                            Error::Api { code, .. } => *code,
                            _ => CHUNK_FAILURE_CODE,
                        };
                        let message = err.to_string();
                        chunk
                            .iter()
                            .map(|_| BatchOutcome::Error {
                                code,
                                message: message.clone(),
                            })
                            .collect()
                    }
                }
            }
        }),
    )
    // `buffered` bounds concurrency and yields in order.
    .buffered(limiter.max_concurrent_chunks())
    .collect()
    .await;

    outcomes.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ConcurrencyConfig, RetryConfig};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn limiter() -> ConcurrencyLimiter {
        ConcurrencyLimiter::new(ConcurrencyConfig::default())
    }

    fn retry() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            limit: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        })
    }

    fn numbered_ops(count: usize) -> BatchRequest {
        BatchRequest::new(
            (0..count)
                .map(|n| Operation::create("Song", json!({"n": n})))
                .collect(),
        )
    }

    /// Answer every sub-request with success over its own body.
    fn echo_response(body: &Value) -> Value {
        let requests = body["requests"].as_array().unwrap();
        Value::Array(
            requests
                .iter()
                .map(|request| json!({"success": request["body"]}))
                .collect(),
        )
    }

    #[test]
    fn test_chunking_is_ceil_of_len_over_cap() {
        let request = numbered_ops(125);
        let chunks = request.chunks(50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[2].len(), 25);

        assert_eq!(numbered_ops(50).chunks(50).len(), 1);
        assert_eq!(numbered_ops(51).chunks(50).len(), 2);
    }

    #[test]
    fn test_chunk_body_paths_carry_mount() {
        let request = numbered_ops(2);
        let body = BatchRequest::chunk_body(request.chunks(50)[0], "/1");
        for sub_request in body["requests"].as_array().unwrap() {
            assert_eq!(sub_request["path"], "/1/classes/Song");
        }
    }

    #[test]
    fn test_parse_chunk_response_mixed() {
        let response = json!([
            {"success": {"objectId": "a"}},
            {"error": {"code": 101, "error": "object not found"}},
        ]);
        let outcomes = parse_chunk_response(&response, 2).unwrap();

        assert!(outcomes[0].is_success());
        assert_eq!(
            outcomes[1],
            BatchOutcome::Error {
                code: 101,
                message: "object not found".into(),
            }
        );
    }

    #[test]
    fn test_parse_chunk_response_length_mismatch() {
        let response = json!([{"success": {}}]);
        assert!(parse_chunk_response(&response, 2).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_preserve_input_order() {
        let request = numbered_ops(120);

        let outcomes = execute(&request, "/1", 50, &limiter(), &retry(), None, |_, body| {
            let response = echo_response(&body);
            async move { Ok(response) }
        })
        .await;

        assert_eq!(outcomes.len(), 120);
        for (n, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.success_value().unwrap()["n"], n as u64);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_middle_chunk_reports_per_item_errors_in_place() {
        let request = numbered_ops(120);

        let outcomes = execute(&request, "/1", 50, &limiter(), &retry(), None, |index, body| {
            let result = if index == 1 {
                Err(Error::Api {
                    code: 119,
                    message: "operation forbidden".into(),
                })
            } else {
                Ok(echo_response(&body))
            };
            async move { result }
        })
        .await;

        assert_eq!(outcomes.len(), 120);
        // Chunk 0 (0..50) and chunk 2 (100..120) succeeded in place.
        assert_eq!(outcomes[0].success_value().unwrap()["n"], 0);
        assert_eq!(outcomes[119].success_value().unwrap()["n"], 119);
        // Chunk 1 (50..100) failed item by item.
        for outcome in &outcomes[50..100] {
            assert_eq!(outcome.error_message(), Some("server error 119: operation forbidden"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_transport_failure_is_retried_as_a_unit() {
        let request = numbered_ops(10);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let outcomes = execute(&request, "/1", 50, &limiter(), &retry(), None, move |_, body| {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            let response = echo_response(&body);
            async move {
                if first {
                    Err(Error::rate_limited("429"))
                } else {
                    Ok(response)
                }
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(outcomes.iter().all(BatchOutcome::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_success_is_not_retried() {
        let request = numbered_ops(2);
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let outcomes = execute(&request, "/1", 50, &limiter(), &retry(), None, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(json!([
                    {"success": {"objectId": "a"}},
                    {"error": {"code": 141, "error": "rejected by trigger"}},
                ]))
            }
        })
        .await;

        // One send only: per-item failures are data, not a retry trigger.
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_per_chunk_timeout_errors() {
        let request = numbered_ops(4);

        let outcomes = execute(
            &request,
            "/1",
            2,
            &limiter(),
            &retry(),
            Some(Duration::from_millis(50)),
            |_, _| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!([]))
            },
        )
        .await;

        assert_eq!(outcomes.len(), 4);
        for outcome in &outcomes {
            assert!(outcome.error_message().unwrap().contains("deadline exceeded"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_annotate_attempt_count() {
        let request = numbered_ops(1);

        let outcomes = execute(&request, "/1", 50, &limiter(), &retry(), None, |_, _| async {
            Err(Error::service_unavailable("503 service unavailable"))
        })
        .await;

        assert_eq!(outcomes.len(), 1);
        let message = outcomes[0].error_message().unwrap();
        assert!(message.contains("retries exhausted after 3 attempts"));
    }
}
