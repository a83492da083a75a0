//! Reconstruction of domain records from server-pushed webhook payloads.
//!
//! The server invokes functions and triggers over HTTP with a camelCase
//! JSON body. For triggers, the interesting part is rebuilding a record
//! whose dirty state reflects exactly what the pending write would change,
//! so handler code can diff the incoming object against persisted state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::constants::{
    FIELD_ACL, FIELD_CREATED_AT, FIELD_OBJECT_ID, FIELD_UPDATED_AT, KEY_CLASS_NAME, USER_CLASS,
};
use crate::error::{Error, Result};
use crate::object::{Acl, Record};

/// The six server-invoked trigger points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    BeforeFind,
    AfterFind,
}

impl TriggerKind {
    /// Whether this trigger fires before the server applies the operation.
    pub fn is_before(&self) -> bool {
        matches!(self, Self::BeforeSave | Self::BeforeDelete | Self::BeforeFind)
    }
}

/// One inbound webhook call, function or trigger.
///
/// Constructed once per call and read-only to handler code; the emitted
/// domain record is the mutable surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookPayload {
    #[serde(alias = "trigger_name")]
    pub trigger_name: Option<TriggerKind>,
    #[serde(alias = "function_name")]
    pub function_name: Option<String>,
    /// The record as the pending write would leave it (triggers only).
    pub object: Option<Value>,
    /// The persisted state the write is about to replace, when one exists.
    pub original: Option<Value>,
    /// Delta fields delivered outside the object, auth-linking included.
    pub update: Option<Value>,
    /// Function arguments (function calls only).
    pub params: Option<Value>,
    /// Whether the originating request carried the master credential.
    #[serde(alias = "master_used")]
    pub master: bool,
    pub user: Option<Value>,
    #[serde(alias = "installation_id")]
    pub installation_id: Option<String>,
}

impl WebhookPayload {
    /// Decode an inbound body, accepting the server's camelCase keys.
    pub fn from_json(body: Value) -> Result<Self> {
        Ok(serde_json::from_value(body)?)
    }

    pub fn is_function(&self) -> bool {
        self.trigger_name.is_none() && self.function_name.is_some()
    }

    pub fn is_trigger(&self) -> bool {
        self.trigger_name.is_some()
    }

    /// The class the trigger fired for, read from the payload itself.
    pub fn class_name(&self) -> Option<&str> {
        for source in [&self.object, &self.original] {
            if let Some(name) = source
                .as_ref()
                .and_then(|value| value.get(KEY_CLASS_NAME))
                .and_then(Value::as_str)
            {
                return Some(name);
            }
        }
        None
    }

    /// Rebuild the domain record this payload describes.
    ///
    /// Function invocations have no record and return `None`. With
    /// `pristine` set, the record is a plain decode of `object` with no
    /// change tracking. Otherwise, a before-trigger with persisted state
    /// yields a record built from `original` with the incoming differences
    /// applied as tracked mutations; without persisted state it is a fresh
    /// record whose every field is a tracked mutation. ACLs come only from
    /// the payload or the class's configured default, never anything wider.
    pub fn domain_object(&self, config: &ClientConfig, pristine: bool) -> Result<Option<Record>> {
        let Some(trigger) = self.trigger_name else {
            return Ok(None);
        };
        let class_name = self
            .class_name()
            .ok_or_else(|| Error::InvalidQuery("trigger payload carries no class name".into()))?
            .to_string();
        let default_acl = config.default_acl(&class_name);

        let empty = Value::Object(Default::default());
        let object = self.object.as_ref().unwrap_or(&empty);

        let mut record = if pristine {
            Record::from_server(&class_name, object, default_acl)?
        } else if trigger.is_before() {
            match &self.original {
                Some(original) => {
                    let mut record = Record::from_server(&class_name, original, default_acl)?;
                    apply_tracked(&mut record, object);
                    record
                }
                None => {
                    let mut record = Record::with_default_acl(&class_name, default_acl);
                    apply_tracked(&mut record, object);
                    record
                }
            }
        } else {
            Record::from_server(&class_name, object, default_acl)?
        };

        if record.class_name() == USER_CLASS {
            if let Some(auth_data) = self.update.as_ref().and_then(|update| update.get("authData"))
            {
                record.merge_auth_data(auth_data);
            }
        }

        Ok(Some(record))
    }
}

/// Apply the incoming object's fields as tracked mutations, skipping
/// server-managed keys and values that already match persisted state.
fn apply_tracked(record: &mut Record, object: &Value) {
    let Some(fields) = object.as_object() else {
        return;
    };
    for (key, value) in fields {
        match key.as_str() {
            FIELD_OBJECT_ID | FIELD_CREATED_AT | FIELD_UPDATED_AT | KEY_CLASS_NAME => {}
            FIELD_ACL => {
                if let Some(acl) = Acl::from_json(value) {
                    if record.acl() != Some(&acl) {
                        record.set_acl(acl);
                    }
                }
            }
            _ => {
                if record.get(key) != Some(value) {
                    record.set(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig::builder("https://api.example.com", "app-id").build()
    }

    fn before_save(object: Value, original: Option<Value>) -> WebhookPayload {
        WebhookPayload {
            trigger_name: Some(TriggerKind::BeforeSave),
            object: Some(object),
            original,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_camel_case_body() {
        let payload = WebhookPayload::from_json(json!({
            "triggerName": "beforeSave",
            "object": {"className": "Song", "name": "A"},
            "installationId": "i-123",
            "master": true,
        }))
        .unwrap();

        assert_eq!(payload.trigger_name, Some(TriggerKind::BeforeSave));
        assert_eq!(payload.installation_id.as_deref(), Some("i-123"));
        assert!(payload.master);
        assert!(payload.is_trigger());
    }

    #[test]
    fn test_function_payload_has_no_record() {
        let payload = WebhookPayload::from_json(json!({
            "functionName": "tally",
            "params": {"genre": "jazz"},
        }))
        .unwrap();

        assert!(payload.is_function());
        assert_eq!(payload.domain_object(&config(), false).unwrap(), None);
    }

    #[test]
    fn test_before_trigger_diffs_object_against_original() {
        let payload = before_save(
            json!({"className": "Song", "name": "B"}),
            Some(json!({"className": "Song", "objectId": "xKq9mT2pWc", "name": "A"})),
        );

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert_eq!(record.object_id(), Some("xKq9mT2pWc"));

        let changes = record.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "name");
        assert_eq!(changes[0].before, json!("A"));
        assert_eq!(changes[0].after, json!("B"));
    }

    #[test]
    fn test_unchanged_fields_are_not_marked_dirty() {
        let payload = before_save(
            json!({"className": "Song", "name": "A", "plays": 11}),
            Some(json!({"className": "Song", "objectId": "x", "name": "A", "plays": 10})),
        );

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert_eq!(record.dirty_fields(), &["plays".to_string()]);
    }

    #[test]
    fn test_missing_original_yields_fresh_record() {
        let payload = before_save(json!({"className": "Song", "name": "B"}), None);

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert!(record.is_new());

        let changes = record.changes();
        assert_eq!(changes[0].before, Value::Null);
        assert_eq!(changes[0].after, json!("B"));
    }

    #[test]
    fn test_pristine_record_has_no_change_tracking() {
        let payload = before_save(
            json!({"className": "Song", "objectId": "x", "name": "B"}),
            Some(json!({"className": "Song", "objectId": "x", "name": "A"})),
        );

        let record = payload.domain_object(&config(), true).unwrap().unwrap();
        assert!(!record.is_dirty());
        assert_eq!(record.get("name"), Some(&json!("B")));
    }

    #[test]
    fn test_after_trigger_decodes_object_snapshot() {
        let payload = WebhookPayload {
            trigger_name: Some(TriggerKind::AfterSave),
            object: Some(json!({"className": "Song", "objectId": "x", "name": "B"})),
            ..Default::default()
        };

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert!(!record.is_dirty());
        assert_eq!(record.get("name"), Some(&json!("B")));
    }

    #[test]
    fn test_payload_acl_is_kept_and_defaults_do_not_override() {
        let config = ClientConfig::builder("https://api.example.com", "app-id")
            .default_acl("Song", "*", true, true)
            .build();

        // Explicit (empty) ACL in the payload wins over the class default.
        let payload = before_save(
            json!({"className": "Song", "name": "B"}),
            Some(json!({"className": "Song", "objectId": "x", "ACL": {}, "name": "A"})),
        );
        let record = payload.domain_object(&config, false).unwrap().unwrap();
        assert!(record.acl().unwrap().is_empty());

        // No ACL anywhere in the payload: the class default applies.
        let payload = before_save(json!({"className": "Song", "name": "B"}), None);
        let record = payload.domain_object(&config, false).unwrap().unwrap();
        assert_eq!(record.acl().unwrap().len(), 1);
    }

    #[test]
    fn test_auth_data_delta_merges_onto_user_records() {
        let payload = WebhookPayload {
            trigger_name: Some(TriggerKind::BeforeSave),
            object: Some(json!({"className": "_User", "username": "ada"})),
            original: Some(json!({"className": "_User", "objectId": "u1", "username": "ada"})),
            update: Some(json!({"authData": {"github": {"id": "42"}}})),
            ..Default::default()
        };

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert_eq!(record.get("authData").unwrap()["github"]["id"], "42");
    }

    #[test]
    fn test_auth_data_is_ignored_for_other_classes() {
        let payload = WebhookPayload {
            trigger_name: Some(TriggerKind::BeforeSave),
            object: Some(json!({"className": "Song", "name": "B"})),
            original: Some(json!({"className": "Song", "objectId": "x", "name": "A"})),
            update: Some(json!({"authData": {"github": {"id": "42"}}})),
            ..Default::default()
        };

        let record = payload.domain_object(&config(), false).unwrap().unwrap();
        assert_eq!(record.get("authData"), None);
    }

    #[test]
    fn test_trigger_without_class_name_is_rejected() {
        let payload = before_save(json!({"name": "B"}), None);
        assert!(payload.domain_object(&config(), false).is_err());
    }
}
