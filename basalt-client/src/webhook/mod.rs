//! Webhook payload reconstruction and response envelopes.

pub mod payload;
pub mod response;

pub use payload::{TriggerKind, WebhookPayload};
pub use response::{HandlerResult, WebhookError, WebhookResponse};
