//! Query construction and compilation.
//!
//! Follows the split used across the crate: `Query` is the reusable value,
//! `QueryBuilder` the fluent surface. Compilation turns constraints into the
//! server's wire format through a [`CompileContext`] carrying the configured
//! field formatter, class registry, and server caps.

pub mod builder;
pub mod constraint;
pub mod format;
pub mod query;

pub use builder::QueryBuilder;
pub use constraint::{Constraint, Operator, TextSearchOptions};
pub use format::QueryValue;
pub use query::{CachePolicy, Direction, Limit, Order, Query};

use crate::config::ServerCaps;
use crate::naming::{ClassRegistry, FieldFormatter};

/// Everything query compilation needs from the client configuration.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    pub formatter: FieldFormatter,
    pub classes: ClassRegistry,
    pub caps: ServerCaps,
}
