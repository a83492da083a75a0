//! Structured webhook responses.
//!
//! Handler code signals failure by returning a [`WebhookError`]; the
//! dispatch edge turns handler outcomes into the wire envelope. An
//! unexpected fault inside a handler still produces a structured error
//! body, never a bare crash of the handling process.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::error;
use serde_json::{Value, json};
use thiserror::Error;

use crate::constants::{INTERNAL_FAULT_CODE, SCRIPT_FAILED_CODE};

/// A deliberate, handler-raised failure, distinct from an internal fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("webhook error {code}: {message}")]
pub struct WebhookError {
    pub code: i64,
    pub message: String,
}

impl WebhookError {
    /// A failure with the standard script-failed code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: SCRIPT_FAILED_CODE,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// What handler code returns to the dispatch edge.
pub type HandlerResult = std::result::Result<Value, WebhookError>;

/// The HTTP answer to one webhook call.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "result": result }),
        }
    }

    pub fn failure(err: &WebhookError) -> Self {
        Self {
            status: 400,
            body: json!({ "code": err.code, "error": err.message }),
        }
    }

    /// The envelope for a fault the handler never meant to signal.
    pub fn internal_fault() -> Self {
        Self {
            status: 500,
            body: json!({ "code": INTERNAL_FAULT_CODE, "error": "internal handler fault" }),
        }
    }

    pub fn from_result(result: HandlerResult) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::failure(&err),
        }
    }

    /// Run a handler and translate its outcome, catching panics so the
    /// response is structured no matter what the handler did.
    pub fn dispatch<F>(handler: F) -> Self
    where
        F: FnOnce() -> HandlerResult,
    {
        match catch_unwind(AssertUnwindSafe(handler)) {
            Ok(result) => Self::from_result(result),
            Err(_) => {
                error!("webhook handler panicked");
                Self::internal_fault()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let response = WebhookResponse::success(json!({"tally": 3}));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"result": {"tally": 3}}));
    }

    #[test]
    fn test_signalled_failure_envelope() {
        let response =
            WebhookResponse::from_result(Err(WebhookError::new("save rejected: missing name")));

        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], SCRIPT_FAILED_CODE);
        assert_eq!(response.body["error"], "save rejected: missing name");
    }

    #[test]
    fn test_custom_error_code_passes_through() {
        let response = WebhookResponse::failure(&WebhookError::with_code(209, "invalid session"));
        assert_eq!(response.body["code"], 209);
    }

    #[test]
    fn test_panicking_handler_still_answers_structurally() {
        let response = WebhookResponse::dispatch(|| panic!("handler bug"));

        assert_eq!(response.status, 500);
        assert_eq!(response.body["code"], INTERNAL_FAULT_CODE);
        assert!(response.body["error"].is_string());
    }

    #[test]
    fn test_dispatch_passes_normal_outcomes_through() {
        let response = WebhookResponse::dispatch(|| Ok(json!("done")));
        assert_eq!(response.status, 200);

        let response = WebhookResponse::dispatch(|| Err(WebhookError::new("no")));
        assert_eq!(response.status, 400);
    }
}
