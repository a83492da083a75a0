//! Write operations that can run individually or inside a batch request.

use serde_json::{Value, json};

use crate::error::Result;
use crate::object::Record;

/// One write against a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create a new record from a full field payload.
    Create { collection: String, body: Value },
    /// Update an existing record; the body carries only changed fields.
    Update {
        collection: String,
        id: String,
        body: Value,
    },
    /// Delete a record.
    Delete { collection: String, id: String },
}

impl Operation {
    pub fn create(collection: impl Into<String>, body: Value) -> Self {
        Self::Create {
            collection: collection.into(),
            body,
        }
    }

    pub fn update(collection: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self::Update {
            collection: collection.into(),
            id: id.into(),
            body,
        }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// A create carrying the record's full field payload.
    pub fn for_create(record: &Record) -> Self {
        Self::create(record.class_name(), record.create_payload())
    }

    /// An update carrying only the record's dirty fields.
    pub fn for_update(record: &Record) -> Result<Self> {
        let pointer = record.pointer()?;
        Ok(Self::update(
            pointer.class_name,
            pointer.object_id,
            record.update_payload(),
        ))
    }

    pub fn for_delete(record: &Record) -> Result<Self> {
        let pointer = record.pointer()?;
        Ok(Self::delete(pointer.class_name, pointer.object_id))
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Create { .. } => "POST",
            Self::Update { .. } => "PUT",
            Self::Delete { .. } => "DELETE",
        }
    }

    /// The operation's server-relative path. Batch sub-requests resolve
    /// against the server root, so the API mount point must be part of every
    /// path; omitting it has historically produced batches that 404 as a
    /// unit.
    pub fn path(&self, mount: &str) -> String {
        let mount = normalize_mount(mount);
        match self {
            Self::Create { collection, .. } => format!("{mount}/classes/{collection}"),
            Self::Update { collection, id, .. } | Self::Delete { collection, id } => {
                format!("{mount}/classes/{collection}/{id}")
            }
        }
    }

    /// The wire form of one batch sub-request.
    pub fn to_wire(&self, mount: &str) -> Value {
        match self {
            Self::Create { body, .. } | Self::Update { body, .. } => json!({
                "method": self.method(),
                "path": self.path(mount),
                "body": body,
            }),
            Self::Delete { .. } => json!({
                "method": self.method(),
                "path": self.path(mount),
            }),
        }
    }
}

/// The result of one operation, correlated back to its input by position.
///
/// Sub-operation failures are data, not exceptions: a batch response mixes
/// successes and errors freely and callers inspect each outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Success(Value),
    Error { code: i64, message: String },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success_value(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            Self::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message, .. } => Some(message),
        }
    }
}

fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_methods_and_paths() {
        let create = Operation::create("Song", json!({"name": "A"}));
        assert_eq!(create.method(), "POST");
        assert_eq!(create.path("/1"), "/1/classes/Song");

        let update = Operation::update("Song", "xKq9mT2pWc", json!({"plays": 1}));
        assert_eq!(update.method(), "PUT");
        assert_eq!(update.path("/1"), "/1/classes/Song/xKq9mT2pWc");

        let delete = Operation::delete("Song", "xKq9mT2pWc");
        assert_eq!(delete.method(), "DELETE");
        assert_eq!(delete.path("/1"), "/1/classes/Song/xKq9mT2pWc");
    }

    #[test]
    fn test_paths_always_carry_the_mount_prefix() {
        let op = Operation::create("Song", json!({}));

        for mount in ["/1", "1", "/1/", "/api/v2"] {
            let path = op.path(mount);
            assert!(
                path.starts_with('/') && path.contains("/classes/Song"),
                "bad path {path} for mount {mount}"
            );
            assert!(!path.contains("//"), "doubled slash in {path}");
        }
        assert_eq!(op.path("1"), "/1/classes/Song");
        assert_eq!(op.path("/1/"), "/1/classes/Song");
    }

    #[test]
    fn test_wire_form() {
        let update = Operation::update("Song", "xKq9mT2pWc", json!({"plays": 1}));
        assert_eq!(
            update.to_wire("/1"),
            json!({
                "method": "PUT",
                "path": "/1/classes/Song/xKq9mT2pWc",
                "body": {"plays": 1},
            })
        );

        let delete = Operation::delete("Song", "xKq9mT2pWc");
        assert!(delete.to_wire("/1").get("body").is_none());
    }

    #[test]
    fn test_record_backed_operations() {
        let payload = json!({"objectId": "xKq9mT2pWc", "name": "A", "plays": 10});
        let mut record = Record::from_server("Song", &payload, None).unwrap();
        record.set("plays", 11);

        let update = Operation::for_update(&record).unwrap();
        match &update {
            Operation::Update { body, .. } => assert_eq!(body, &json!({"plays": 11})),
            other => panic!("expected update, got {other:?}"),
        }

        let unsaved = Record::new("Song");
        assert!(Operation::for_update(&unsaved).is_err());
        assert!(Operation::for_delete(&unsaved).is_err());
    }
}
