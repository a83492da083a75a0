//! Fluent query construction.
//!
//! `Query` is the reusable value; `QueryBuilder` is the fluent surface that
//! produces one, mirroring the operation/builder split used elsewhere in
//! the crate.

use std::time::Duration;

use super::constraint::{Constraint, Operator, TextSearchOptions};
use super::format::QueryValue;
use super::query::{CachePolicy, Limit, Order, Query};
use crate::error::Result;
use crate::object::{GeoPoint, session::IntoSessionToken};

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            query: Query::new(collection),
        }
    }

    fn push(mut self, field: impl Into<String>, operator: Operator, value: impl Into<QueryValue>) -> Self {
        self.query.add_constraint(Constraint::new(field, operator, value));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::Equal, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::NotEqual, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::GreaterThan, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::GreaterThanOrEqual, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::LessThan, value)
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::LessThanOrEqual, value)
    }

    /// Alias of [`gt`](Self::gt) reading naturally for dates.
    pub fn after(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.gt(field, value)
    }

    /// Alias of [`lt`](Self::lt) reading naturally for dates.
    pub fn before(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.lt(field, value)
    }

    pub fn on_or_after(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.gte(field, value)
    }

    pub fn on_or_before(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.lte(field, value)
    }

    pub fn contained_in(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::In, value)
    }

    pub fn not_contained_in(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::NotIn, value)
    }

    pub fn contains_all(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::All, value)
    }

    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.push(field, Operator::Exists, present)
    }

    pub fn null(self, field: impl Into<String>, is_null: bool) -> Self {
        self.push(field, Operator::Null, is_null)
    }

    pub fn matches_query(self, field: impl Into<String>, inner: Query) -> Self {
        self.push(field, Operator::InQuery, inner)
    }

    pub fn excludes_query(self, field: impl Into<String>, inner: Query) -> Self {
        self.push(field, Operator::NotInQuery, inner)
    }

    /// Match a record reference by bare id or pointer; the collection is
    /// inferred from the field name unless registered explicitly.
    pub fn id(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(field, Operator::Id, value)
    }

    pub fn near(self, field: impl Into<String>, point: GeoPoint) -> Self {
        self.push(field, Operator::NearSphere, point)
    }

    pub fn within_box(self, field: impl Into<String>, southwest: GeoPoint, northeast: GeoPoint) -> Self {
        self.push(
            field,
            Operator::WithinBox,
            vec![QueryValue::Geo(southwest), QueryValue::Geo(northeast)],
        )
    }

    pub fn within_polygon(self, field: impl Into<String>, points: Vec<GeoPoint>) -> Self {
        self.push(
            field,
            Operator::WithinPolygon,
            points.into_iter().map(QueryValue::Geo).collect::<Vec<_>>(),
        )
    }

    pub fn text_search(self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.text_search_with(field, term, TextSearchOptions::default())
    }

    pub fn text_search_with(
        mut self,
        field: impl Into<String>,
        term: impl Into<String>,
        options: TextSearchOptions,
    ) -> Self {
        self.query
            .add_constraint(Constraint::text_search(field, term, options));
        self
    }

    /// Add a constraint by operator alias, for callers driving filters from
    /// data rather than code. Unknown aliases are rejected here.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        alias: &str,
        value: impl Into<QueryValue>,
    ) -> Result<Self> {
        self.query
            .add_constraint(Constraint::from_alias(field, alias, value)?);
        Ok(self)
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.query.add_order(Order::ascending(field));
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.query.add_order(Order::descending(field));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.set_limit(Limit::Exact(limit));
        self
    }

    /// Request the server's configured maximum page size.
    pub fn max_limit(mut self) -> Self {
        self.query.set_limit(Limit::Max);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.set_skip(skip);
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.add_keys(keys);
        self
    }

    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.add_includes(fields);
        self
    }

    /// Switch to count mode, freezing the limit at zero.
    pub fn count(mut self) -> Self {
        self.query.set_count();
        self
    }

    /// Scope the query to a session credential. Rejects credential values
    /// that cannot produce a token, before any request is made.
    pub fn session(mut self, credential: impl IntoSessionToken) -> Result<Self> {
        self.query
            .set_session_token(credential.into_session_token()?);
        Ok(self)
    }

    pub fn master_key(mut self) -> Self {
        self.query.set_use_master_key(true);
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.query.set_cache(policy);
        self
    }

    pub fn cache_ttl(self, ttl: Duration) -> Self {
        self.cache(CachePolicy::Ttl(ttl))
    }

    pub fn no_cache(self) -> Self {
        self.cache(CachePolicy::Disabled)
    }

    pub fn build(self) -> Query {
        self.query
    }
}
