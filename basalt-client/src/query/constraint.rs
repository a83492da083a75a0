//! The constraint compiler: typed operator nodes that serialize a
//! field/operator/value triple into the server's wire format.
//!
//! Operators form a closed set. Human-facing aliases resolve through a
//! static registry rather than dynamic dispatch, and every argument is
//! validated here, at compile time, never at request time.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};

use super::CompileContext;
use super::format::QueryValue;
use crate::error::{Error, Result};
use crate::object::{GeoPoint, Pointer};

/// The closed set of constraint operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Plain equality; compiles with no wire key.
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Set membership; scalar inputs are coerced to one-element arrays.
    In,
    NotIn,
    All,
    /// Key presence; requires a strictly boolean argument.
    Exists,
    /// Nullability; distinguishes presence-of-null from absence-of-key.
    Null,
    /// Membership in another query's results.
    InQuery,
    NotInQuery,
    /// Identifier resolution; turns a bare id into a pointer equality.
    Id,
    NearSphere,
    WithinBox,
    WithinPolygon,
    TextSearch,
}

/// Alias registry mapping every human-facing spelling to its operator.
static ALIASES: Lazy<HashMap<&'static str, Operator>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("eq", Operator::Equal);
    map.insert("not_eq", Operator::NotEqual);
    map.insert("ne", Operator::NotEqual);
    map.insert("gt", Operator::GreaterThan);
    map.insert("after", Operator::GreaterThan);
    map.insert("gte", Operator::GreaterThanOrEqual);
    map.insert("on_or_after", Operator::GreaterThanOrEqual);
    map.insert("lt", Operator::LessThan);
    map.insert("before", Operator::LessThan);
    map.insert("lte", Operator::LessThanOrEqual);
    map.insert("on_or_before", Operator::LessThanOrEqual);
    map.insert("in", Operator::In);
    map.insert("contained_in", Operator::In);
    map.insert("not_in", Operator::NotIn);
    map.insert("nin", Operator::NotIn);
    map.insert("all", Operator::All);
    map.insert("contains_all", Operator::All);
    map.insert("exists", Operator::Exists);
    map.insert("null", Operator::Null);
    map.insert("in_query", Operator::InQuery);
    map.insert("matches_query", Operator::InQuery);
    map.insert("not_in_query", Operator::NotInQuery);
    map.insert("excludes_query", Operator::NotInQuery);
    map.insert("id", Operator::Id);
    map.insert("near", Operator::NearSphere);
    map.insert("within_box", Operator::WithinBox);
    map.insert("within_polygon", Operator::WithinPolygon);
    map.insert("text_search", Operator::TextSearch);
    map.insert("search", Operator::TextSearch);
    map
});

impl Operator {
    /// Resolve a human-facing alias.
    pub fn from_alias(alias: &str) -> Option<Self> {
        ALIASES.get(alias).copied()
    }

    /// The canonical wire key, or `None` for operators that compile to a
    /// bare field assignment.
    pub fn wire_key(&self) -> Option<&'static str> {
        match self {
            Self::Equal | Self::Id => None,
            Self::NotEqual => Some("$ne"),
            Self::GreaterThan => Some("$gt"),
            Self::GreaterThanOrEqual => Some("$gte"),
            Self::LessThan => Some("$lt"),
            Self::LessThanOrEqual => Some("$lte"),
            Self::In => Some("$in"),
            Self::NotIn => Some("$nin"),
            Self::All => Some("$all"),
            Self::Exists | Self::Null => Some("$exists"),
            Self::InQuery => Some("$inQuery"),
            Self::NotInQuery => Some("$notInQuery"),
            Self::NearSphere => Some("$nearSphere"),
            Self::WithinBox | Self::WithinPolygon => Some("$geoWithin"),
            Self::TextSearch => Some("$text"),
        }
    }
}

/// Optional hints for full-text search constraints.
#[derive(Debug, Clone, Default)]
pub struct TextSearchOptions {
    pub case_sensitive: Option<bool>,
    pub language: Option<String>,
}

/// One filter node: a field, an operator, and an unformatted value.
///
/// Immutable once built; consumed when the owning query compiles.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub field: String,
    pub operator: Operator,
    pub value: QueryValue,
}

impl Constraint {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<QueryValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Build a constraint from an operator alias, rejecting unknown aliases.
    pub fn from_alias(
        field: impl Into<String>,
        alias: &str,
        value: impl Into<QueryValue>,
    ) -> Result<Self> {
        let field = field.into();
        let operator = Operator::from_alias(alias)
            .ok_or_else(|| Error::constraint(&field, format!("unknown operator `{alias}`")))?;
        Ok(Self::new(field, operator, value))
    }

    /// Build a full-text search constraint with optional hints.
    pub fn text_search(
        field: impl Into<String>,
        term: impl Into<String>,
        options: TextSearchOptions,
    ) -> Self {
        let mut spec = Map::new();
        spec.insert("term".into(), Value::String(term.into()));
        if let Some(case_sensitive) = options.case_sensitive {
            spec.insert("caseSensitive".into(), Value::Bool(case_sensitive));
        }
        if let Some(language) = options.language {
            spec.insert("language".into(), Value::String(language));
        }
        Self::new(field, Operator::TextSearch, Value::Object(spec))
    }

    /// Compile this constraint into a where clause under construction.
    ///
    /// Constraints on the same field merge under one nested object keyed by
    /// operator; re-filtering an already-present field/operator pair
    /// overwrites the prior value.
    pub fn compile_into(&self, out: &mut Map<String, Value>, ctx: &CompileContext) -> Result<()> {
        let field = ctx.formatter.format(&self.field);

        match self.operator {
            Operator::Equal => {
                out.insert(field, self.value.compile(ctx)?);
            }
            Operator::Id => {
                let pointer = self.resolve_pointer(ctx)?;
                out.insert(field, pointer.to_json());
            }
            Operator::Exists => {
                let present = self.require_bool()?;
                nest(out, field, "$exists", Value::Bool(present));
            }
            Operator::Null => {
                // null(true) asserts absence-of-key; null(false) asserts the
                // key exists and holds something other than null.
                if self.require_bool()? {
                    nest(out, field, "$exists", Value::Bool(false));
                } else {
                    nest(out, field, "$ne", Value::Null);
                }
            }
            Operator::In | Operator::NotIn | Operator::All => {
                let key = self.operator.wire_key().unwrap();
                let compiled = if self.value.is_listlike() {
                    self.value.compile(ctx)?
                } else {
                    Value::Array(vec![self.value.compile(ctx)?])
                };
                nest(out, field, key, compiled);
            }
            Operator::InQuery | Operator::NotInQuery => {
                let key = self.operator.wire_key().unwrap();
                match &self.value {
                    QueryValue::SubQuery(_) => {
                        nest(out, field, key, self.value.compile(ctx)?);
                    }
                    _ => {
                        return Err(Error::constraint(
                            &self.field,
                            "sub-query membership requires a query argument",
                        ));
                    }
                }
            }
            Operator::NearSphere => match &self.value {
                QueryValue::Geo(point) => nest(out, field, "$nearSphere", point.to_json()),
                _ => {
                    return Err(Error::constraint(
                        &self.field,
                        "near requires a geo point argument",
                    ));
                }
            },
            Operator::WithinBox => {
                let corners = self.geo_list()?;
                if corners.len() != 2 {
                    return Err(Error::constraint(
                        &self.field,
                        "within_box requires exactly a southwest and a northeast corner",
                    ));
                }
                let box_points: Vec<Value> = corners.iter().map(GeoPoint::to_json).collect();
                nest(out, field, "$geoWithin", json!({ "$box": box_points }));
            }
            Operator::WithinPolygon => {
                let points = self.geo_list()?;
                if points.len() < 3 {
                    return Err(Error::constraint(
                        &self.field,
                        "within_polygon requires at least 3 points",
                    ));
                }
                let polygon: Vec<Value> = points.iter().map(GeoPoint::to_json).collect();
                nest(out, field, "$geoWithin", json!({ "$polygon": polygon }));
            }
            Operator::TextSearch => {
                let spec = self.text_spec()?;
                nest(out, field, "$text", json!({ "$search": spec }));
            }
            _ => {
                let key = self.operator.wire_key().unwrap();
                nest(out, field, key, self.value.compile(ctx)?);
            }
        }
        Ok(())
    }

    /// Strictly boolean argument; truthy values are not coerced.
    fn require_bool(&self) -> Result<bool> {
        match &self.value {
            QueryValue::Json(Value::Bool(b)) => Ok(*b),
            _ => Err(Error::constraint(
                &self.field,
                "argument must be a boolean",
            )),
        }
    }

    fn resolve_pointer(&self, ctx: &CompileContext) -> Result<Pointer> {
        match &self.value {
            QueryValue::Pointer(pointer) => Ok(pointer.clone()),
            QueryValue::Json(Value::String(id)) => {
                Ok(Pointer::new(ctx.classes.resolve(&self.field), id.clone()))
            }
            _ => Err(Error::constraint(
                &self.field,
                "id constraint takes a record id string or a pointer",
            )),
        }
    }

    fn geo_list(&self) -> Result<Vec<GeoPoint>> {
        let items = match &self.value {
            QueryValue::List(items) => items,
            _ => {
                return Err(Error::constraint(
                    &self.field,
                    "argument must be a list of geo points",
                ));
            }
        };
        items
            .iter()
            .map(|item| match item {
                QueryValue::Geo(point) => Ok(*point),
                _ => Err(Error::constraint(
                    &self.field,
                    "argument must be a list of geo points",
                )),
            })
            .collect()
    }

    fn text_spec(&self) -> Result<Value> {
        let spec = match &self.value {
            QueryValue::Json(Value::Object(spec)) => spec,
            _ => {
                return Err(Error::constraint(
                    &self.field,
                    "text search requires a search specification",
                ));
            }
        };
        let term = spec
            .get("term")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if term.is_empty() {
            return Err(Error::constraint(
                &self.field,
                "text search requires a non-empty term",
            ));
        }

        let mut out = Map::new();
        out.insert("$term".into(), Value::String(term.to_string()));
        if let Some(case_sensitive) = spec.get("caseSensitive") {
            out.insert("$caseSensitive".into(), case_sensitive.clone());
        }
        if let Some(language) = spec.get("language") {
            out.insert("$language".into(), language.clone());
        }
        Ok(Value::Object(out))
    }
}

/// Insert an operator clause under a field, merging with any clauses already
/// present for it. A prior bare equality is displaced by the nested object.
fn nest(out: &mut Map<String, Value>, field: String, key: &str, value: Value) {
    let entry = out
        .entry(field)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry
        .as_object_mut()
        .expect("entry was just made an object")
        .insert(key.to_string(), value);
}
