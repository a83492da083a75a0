//! The record model: a class-scoped bag of fields with per-field dirty
//! tracking.
//!
//! A record remembers the persisted value of every field it has mutated
//! since it was last saved or decoded, so save payloads only carry what
//! actually changed and webhook handlers can see exact before/after diffs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::acl::Acl;
use super::pointer::{Pointer, decode_date};
use crate::constants::{FIELD_ACL, FIELD_CREATED_AT, FIELD_OBJECT_ID, FIELD_UPDATED_AT};
use crate::error::{Error, Result};

/// One tracked mutation: a field together with its persisted and current
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

/// A domain record bound to a collection, with field-level change tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    class_name: String,
    object_id: Option<String>,
    fields: BTreeMap<String, Value>,
    /// Persisted values of fields mutated since the last sync point.
    original: BTreeMap<String, Value>,
    /// Mutated field names in first-touch order.
    dirty: Vec<String>,
    acl: Option<Acl>,
    acl_dirty: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A fresh, unsaved record with no ACL.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_id: None,
            fields: BTreeMap::new(),
            original: BTreeMap::new(),
            dirty: Vec::new(),
            acl: None,
            acl_dirty: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// A fresh record carrying its class's configured default ACL.
    pub fn with_default_acl(class_name: impl Into<String>, default_acl: Option<&Acl>) -> Self {
        let mut record = Self::new(class_name);
        if let Some(acl) = default_acl {
            record.acl = Some(acl.clone());
            record.acl_dirty = true;
        }
        record
    }

    /// Decode a record from a server payload.
    ///
    /// Fields are applied without dirty tracking. If the payload carries an
    /// `ACL` key the decoded ACL is kept exactly as sent, explicitly empty
    /// included; only a payload with no `ACL` key at all falls back to the
    /// class default.
    pub fn from_server(
        class_name: impl Into<String>,
        payload: &Value,
        default_acl: Option<&Acl>,
    ) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidQuery("record payload is not an object".into()))?;

        let mut record = Self::new(class_name);

        for (key, value) in obj {
            match key.as_str() {
                FIELD_OBJECT_ID => record.object_id = value.as_str().map(String::from),
                FIELD_CREATED_AT => record.created_at = decode_date(value),
                FIELD_UPDATED_AT => record.updated_at = decode_date(value),
                FIELD_ACL => record.acl = Acl::from_json(value),
                "className" if value.is_string() => {}
                _ => {
                    record.fields.insert(key.clone(), value.clone());
                }
            }
        }

        if !obj.contains_key(FIELD_ACL) {
            record.acl = default_acl.cloned();
        }
        Ok(record)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn acl(&self) -> Option<&Acl> {
        self.acl.as_ref()
    }

    /// Replace the record's ACL; the change is included in the next save.
    pub fn set_acl(&mut self, acl: Acl) {
        self.acl = Some(acl);
        self.acl_dirty = true;
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a field, recording its persisted value the first time it is
    /// touched. Setting a field back to its current value is still tracked.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();

        if !self.original.contains_key(&field) {
            let before = self.fields.get(&field).cloned().unwrap_or(Value::Null);
            self.original.insert(field.clone(), before);
        }
        if !self.dirty.contains(&field) {
            self.dirty.push(field.clone());
        }
        self.fields.insert(field, value);
    }

    /// Set a field without touching the dirty state. Used when applying
    /// server-sourced values.
    pub fn set_untracked(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Remove a field, tracked like a mutation to null.
    pub fn unset(&mut self, field: &str) {
        if self.fields.contains_key(field) {
            self.set(field.to_string(), Value::Null);
            self.fields.remove(field);
        }
    }

    /// Mutated field names in first-touch order.
    pub fn dirty_fields(&self) -> &[String] {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.acl_dirty
    }

    /// Whether this record has never been persisted.
    pub fn is_new(&self) -> bool {
        self.object_id.is_none()
    }

    /// The tracked mutations as (field, before, after) triples.
    pub fn changes(&self) -> Vec<FieldChange> {
        self.dirty
            .iter()
            .map(|field| FieldChange {
                field: field.clone(),
                before: self.original.get(field).cloned().unwrap_or(Value::Null),
                after: self.fields.get(field).cloned().unwrap_or(Value::Null),
            })
            .collect()
    }

    /// Forget the tracked state, treating current values as persisted.
    pub fn clear_dirty(&mut self) {
        self.original.clear();
        self.dirty.clear();
        self.acl_dirty = false;
    }

    /// Roll every tracked mutation back to its persisted value.
    pub fn revert(&mut self) {
        for field in self.dirty.drain(..) {
            match self.original.remove(&field) {
                Some(Value::Null) => {
                    self.fields.remove(&field);
                }
                Some(before) => {
                    self.fields.insert(field, before);
                }
                None => {}
            }
        }
        self.original.clear();
        self.acl_dirty = false;
    }

    /// The pointer form of this record. Unsaved records have no pointer.
    pub fn pointer(&self) -> Result<Pointer> {
        match &self.object_id {
            Some(id) => Ok(Pointer::new(self.class_name.clone(), id.clone())),
            None => Err(Error::MissingObjectId {
                class_name: self.class_name.clone(),
            }),
        }
    }

    /// Full-field payload for a create request.
    pub fn create_payload(&self) -> Value {
        let mut out = Map::new();
        for (field, value) in &self.fields {
            out.insert(field.clone(), value.clone());
        }
        if let Some(acl) = &self.acl {
            out.insert(FIELD_ACL.into(), acl.to_json());
        }
        Value::Object(out)
    }

    /// Dirty-fields-only payload for an update request.
    pub fn update_payload(&self) -> Value {
        let mut out = Map::new();
        for field in &self.dirty {
            let value = self.fields.get(field).cloned().unwrap_or(Value::Null);
            out.insert(field.clone(), value);
        }
        if self.acl_dirty {
            if let Some(acl) = &self.acl {
                out.insert(FIELD_ACL.into(), acl.to_json());
            }
        }
        Value::Object(out)
    }

    /// Merge third-party auth data onto the record's `authData` field.
    ///
    /// Auth-linking arrives as an update delta rather than inside the object
    /// payload, so providers are merged key by key into whatever is already
    /// present.
    pub fn merge_auth_data(&mut self, auth_data: &Value) {
        let Some(incoming) = auth_data.as_object() else {
            return;
        };

        let mut merged = self
            .fields
            .get("authData")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (provider, data) in incoming {
            merged.insert(provider.clone(), data.clone());
        }
        self.set("authData", Value::Object(merged));
    }

    /// Record the server's answer to a successful save.
    pub fn mark_saved(
        &mut self,
        object_id: Option<String>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) {
        if let Some(id) = object_id {
            self.object_id = Some(id);
        }
        if let Some(created) = created_at {
            self.created_at = Some(created);
            if self.updated_at.is_none() {
                self.updated_at = Some(created);
            }
        }
        if let Some(updated) = updated_at {
            self.updated_at = Some(updated);
        }
        self.clear_dirty();
    }
}
