//! An async client for document-store Backend-as-a-Service REST APIs.
//!
//! The crate maps application records onto a remote collection/record store
//! and hides the unreliable parts of that arrangement behind a stable
//! surface: a typed constraint compiler that turns filter expressions into
//! the server's wire format, a fingerprint-addressed cache middleware, a
//! sampling-back-off retry policy for transient failures, a chunked
//! concurrent batch executor, and a webhook payload reconstructor that
//! rebuilds dirty-tracked records from server-pushed trigger events.
//!
//! ```no_run
//! use basalt_client::{Client, ClientConfig};
//!
//! # async fn demo() -> basalt_client::Result<()> {
//! let config = ClientConfig::builder("https://api.example.com", "app-id")
//!     .api_key("rest-key")
//!     .build();
//! let client = Client::new(config)?;
//!
//! let query = client
//!     .query("Song")
//!     .eq("genre", "jazz")
//!     .gt("plays", 10)
//!     .order_desc("plays")
//!     .limit(25)
//!     .build();
//! let songs = client.find(&query).await?;
//! # let _ = songs;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod naming;
pub mod object;
pub mod operations;
pub mod query;
pub mod resilience;
pub mod webhook;

pub use cache::{CacheMiddleware, CacheStore, CacheableRequest, CachedResponse, MemoryCacheStore};
pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder, ServerCaps};
pub use error::{Error, Result, TransientKind};
pub use naming::{ClassRegistry, FieldFormatter};
pub use object::{
    Acl, FieldChange, GeoPoint, IntoSessionToken, PUBLIC, Permission, Pointer, Record, Session,
    User,
};
pub use operations::{BatchOutcome, BatchRequest, Operation};
pub use query::{
    CachePolicy, Constraint, Direction, Limit, Operator, Order, Query, QueryBuilder, QueryValue,
    TextSearchOptions,
};
pub use resilience::{ConcurrencyConfig, ConcurrencyLimiter, RetryConfig, RetryPolicy};
pub use webhook::{HandlerResult, TriggerKind, WebhookError, WebhookPayload, WebhookResponse};
