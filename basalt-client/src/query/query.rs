//! The query type: constraints plus ordering, projection, and paging
//! options, compiled to the server's flat parameter map.

use std::time::Duration;

use serde_json::{Map, Value};

use super::CompileContext;
use super::constraint::Constraint;
use crate::constants::{FIELD_CREATED_AT, FIELD_UPDATED_AT};
use crate::error::Result;

/// Sort direction for one ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One ordering clause; descending fields compile with a `-` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// Result-set size. `Max` resolves to the configured server cap at compile
/// time; explicit values pass through unclamped, the server enforces its own
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Default,
    Max,
    Exact(u64),
}

/// Per-query cache preference, resolved against the client default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Use the client's configured TTL.
    #[default]
    Default,
    /// Bypass the cache entirely: no read, no write.
    Disabled,
    /// Cache with this TTL regardless of the client default.
    Ttl(Duration),
}

/// A compiled-on-demand query against one collection.
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    constraints: Vec<Constraint>,
    order: Vec<Order>,
    limit: Limit,
    skip: u64,
    keys: Vec<String>,
    include: Vec<String>,
    session_token: Option<String>,
    use_master_key: bool,
    cache: CachePolicy,
    is_count: bool,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            constraints: Vec::new(),
            order: Vec::new(),
            limit: Limit::Default,
            skip: 0,
            keys: Vec::new(),
            include: Vec::new(),
            session_token: None,
            use_master_key: false,
            cache: CachePolicy::Default,
            is_count: false,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn add_order(&mut self, order: Order) {
        self.order.push(order);
    }

    /// Replace any caller ordering; bulk iteration needs full control of the
    /// sort to keep its cursor stable.
    pub(crate) fn clear_order(&mut self) {
        self.order.clear();
    }

    /// Set the result-set size. Ignored once count mode is on, which freezes
    /// the limit at zero.
    pub fn set_limit(&mut self, limit: Limit) {
        if self.is_count {
            return;
        }
        self.limit = limit;
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    pub fn set_skip(&mut self, skip: u64) {
        self.skip = skip;
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn add_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
    }

    pub fn add_includes<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(fields.into_iter().map(Into::into));
    }

    /// Switch to count mode: the limit drops to zero and stays there.
    pub fn set_count(&mut self) {
        self.is_count = true;
        self.limit = Limit::Exact(0);
    }

    pub fn is_count(&self) -> bool {
        self.is_count
    }

    pub fn set_session_token(&mut self, token: String) {
        self.session_token = Some(token);
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn set_use_master_key(&mut self, use_master_key: bool) {
        self.use_master_key = use_master_key;
    }

    pub fn use_master_key(&self) -> bool {
        self.use_master_key
    }

    pub fn set_cache(&mut self, cache: CachePolicy) {
        self.cache = cache;
    }

    pub fn cache(&self) -> CachePolicy {
        self.cache
    }

    /// Whether any constraint targets the reserved timestamp fields the
    /// bulk-iteration executor uses as its cursor.
    pub fn touches_cursor_fields(&self, ctx: &CompileContext) -> bool {
        self.constraints.iter().any(|constraint| {
            let formatted = ctx.formatter.format(&constraint.field);
            formatted == FIELD_CREATED_AT || formatted == FIELD_UPDATED_AT
        })
    }

    /// Compile just the where clause.
    pub fn compile_where(&self, ctx: &CompileContext) -> Result<Value> {
        let mut out = Map::new();
        for constraint in &self.constraints {
            constraint.compile_into(&mut out, ctx)?;
        }
        Ok(Value::Object(out))
    }

    /// Compile the full parameter map in wire order. The where clause is
    /// JSON-encoded into a string so it can ride as a single GET parameter.
    pub fn compile(&self, ctx: &CompileContext) -> Result<Vec<(String, String)>> {
        let mut params = Vec::new();

        if !self.constraints.is_empty() {
            let where_clause = self.compile_where(ctx)?;
            params.push(("where".to_string(), serde_json::to_string(&where_clause)?));
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|order| {
                    let field = ctx.formatter.format(&order.field);
                    match order.direction {
                        Direction::Ascending => field,
                        Direction::Descending => format!("-{field}"),
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        match self.limit {
            Limit::Default => {}
            Limit::Max => params.push(("limit".to_string(), ctx.caps.max_limit.to_string())),
            Limit::Exact(n) => params.push(("limit".to_string(), n.to_string())),
        }

        if self.skip > 0 {
            params.push(("skip".to_string(), self.skip.to_string()));
        }

        if let Some(keys) = join_fields(&self.keys, ctx) {
            params.push(("keys".to_string(), keys));
        }
        if let Some(include) = join_fields(&self.include, ctx) {
            params.push(("include".to_string(), include));
        }

        if self.is_count {
            params.push(("count".to_string(), "1".to_string()));
        }

        Ok(params)
    }
}

/// Format, deduplicate, and comma-join a projection/include list.
fn join_fields(fields: &[String], ctx: &CompileContext) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let mut seen = Vec::new();
    for field in fields {
        let formatted = ctx.formatter.format(field);
        if !seen.contains(&formatted) {
            seen.push(formatted);
        }
    }
    Some(seen.join(","))
}
