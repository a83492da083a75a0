//! Field-name formatting and collection-name inference.
//!
//! The server stores camelCase field names while application code usually
//! prefers snake_case, so every field name passes through a configured
//! formatter at query-compile time. Identifier constraints also need to turn
//! a field name like `author` or `authors` into the collection `Author`,
//! with explicit registry overrides for irregular mappings.

use std::collections::HashMap;

use crate::constants::{FIELD_ACL, FIELD_CREATED_AT, FIELD_OBJECT_ID, FIELD_UPDATED_AT};

/// How local field names are rewritten into wire field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldFormatter {
    /// Pass names through untouched.
    Identity,
    /// `snake_case` to `camelCase` (the server's native convention).
    #[default]
    CamelCase,
    /// `snake_case` to `PascalCase`.
    PascalCase,
}

impl FieldFormatter {
    /// Format a single field name for the wire.
    ///
    /// Server-managed names always map to their canonical spelling no matter
    /// which formatter is configured: `id` is `objectId`, `created_at` is
    /// `createdAt`, `updated_at` is `updatedAt`, and `acl` is `ACL`.
    pub fn format(&self, field: &str) -> String {
        match field {
            "id" | FIELD_OBJECT_ID => return FIELD_OBJECT_ID.to_string(),
            "created_at" | FIELD_CREATED_AT => return FIELD_CREATED_AT.to_string(),
            "updated_at" | FIELD_UPDATED_AT => return FIELD_UPDATED_AT.to_string(),
            "acl" | FIELD_ACL => return FIELD_ACL.to_string(),
            _ => {}
        }

        match self {
            Self::Identity => field.to_string(),
            Self::CamelCase => camelize(field, false),
            Self::PascalCase => camelize(field, true),
        }
    }
}

/// Convert a snake_case name to camelCase, optionally capitalizing the head.
fn camelize(name: &str, capitalize_head: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = capitalize_head;

    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reduce a plural field name to its singular form using English rules.
///
/// The inverse of the usual pluralization rules: `companies` becomes
/// `company`, `boxes` becomes `box`, `knives` becomes `knife`, and a plain
/// trailing `s` is dropped. Names without a recognized plural ending pass
/// through unchanged.
pub fn singularize(name: &str) -> String {
    let lower = name.to_lowercase();

    if lower.ends_with("ies") && name.len() > 3 {
        return format!("{}y", &name[..name.len() - 3]);
    }
    if lower.ends_with("ves") && name.len() > 3 {
        return format!("{}fe", &name[..name.len() - 3]);
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if lower.ends_with(suffix) && name.len() > suffix.len() {
            return name[..name.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && name.len() > 1 {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

/// Infer a collection name from a field name: singularized and capitalized.
pub fn infer_collection(field: &str) -> String {
    let singular = singularize(field);
    let mut chars = singular.chars();
    match chars.next() {
        Some(head) => head.to_uppercase().collect::<String>() + chars.as_str(),
        None => singular,
    }
}

/// Explicit field-to-collection mappings that override [`infer_collection`].
///
/// Irregular names (`people` owning `Person` records, say) register here.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    overrides: HashMap<String, String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override from a field name to a collection name.
    pub fn register(&mut self, field: impl Into<String>, collection: impl Into<String>) {
        self.overrides.insert(field.into(), collection.into());
    }

    /// Resolve the collection a field refers to, preferring overrides.
    pub fn resolve(&self, field: &str) -> String {
        match self.overrides.get(field) {
            Some(collection) => collection.clone(),
            None => infer_collection(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_formatter() {
        let fmt = FieldFormatter::Identity;
        assert_eq!(fmt.format("release_date"), "release_date");
        assert_eq!(fmt.format("plain"), "plain");
    }

    #[test]
    fn test_camel_case_formatter() {
        let fmt = FieldFormatter::CamelCase;
        assert_eq!(fmt.format("release_date"), "releaseDate");
        assert_eq!(fmt.format("total_play_count"), "totalPlayCount");
        assert_eq!(fmt.format("plain"), "plain");
    }

    #[test]
    fn test_pascal_case_formatter() {
        let fmt = FieldFormatter::PascalCase;
        assert_eq!(fmt.format("release_date"), "ReleaseDate");
        assert_eq!(fmt.format("plain"), "Plain");
    }

    #[test]
    fn test_reserved_fields_bypass_formatter() {
        for fmt in [
            FieldFormatter::Identity,
            FieldFormatter::CamelCase,
            FieldFormatter::PascalCase,
        ] {
            assert_eq!(fmt.format("id"), "objectId");
            assert_eq!(fmt.format("created_at"), "createdAt");
            assert_eq!(fmt.format("updated_at"), "updatedAt");
            assert_eq!(fmt.format("acl"), "ACL");
            assert_eq!(fmt.format("createdAt"), "createdAt");
        }
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("songs"), "song");
        assert_eq!(singularize("companies"), "company");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("branches"), "branch");
        assert_eq!(singularize("knives"), "knife");
        assert_eq!(singularize("author"), "author");
    }

    #[test]
    fn test_infer_collection() {
        assert_eq!(infer_collection("songs"), "Song");
        assert_eq!(infer_collection("author"), "Author");
        assert_eq!(infer_collection("categories"), "Category");
    }

    #[test]
    fn test_registry_override_wins() {
        let mut registry = ClassRegistry::new();
        registry.register("people", "Person");

        assert_eq!(registry.resolve("people"), "Person");
        assert_eq!(registry.resolve("songs"), "Song");
    }
}
