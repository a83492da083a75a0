//! Access-control lists mapping subjects to read/write rights.
//!
//! A subject is the public key `"*"`, a record id, or a named role
//! (`"role:<name>"`). A subject with no entry has no access unless the
//! request carries the master credential.

use serde_json::{Map, Value, json};

/// The public subject granting rights to everyone.
pub const PUBLIC: &str = "*";

/// Read/write rights for one subject. Value-typed; compared field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permission {
    pub read: bool,
    pub write: bool,
}

impl Permission {
    pub fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    /// Whether this permission grants nothing at all.
    pub fn is_none(&self) -> bool {
        !self.read && !self.write
    }
}

/// An ordered mapping from subject to [`Permission`].
///
/// Applying a no-rights permission removes the subject instead of storing a
/// useless entry, so an `Acl` never contains a false/false row. Re-applying
/// a subject overwrites its rights in place, keeping the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acl {
    entries: Vec<(String, Permission)>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or remove a subject's rights. Both rights false removes the entry.
    pub fn apply(&mut self, subject: impl Into<String>, read: bool, write: bool) {
        let subject = subject.into();
        let permission = Permission::new(read, write);

        if permission.is_none() {
            self.entries.retain(|(existing, _)| *existing != subject);
            return;
        }

        match self.entries.iter_mut().find(|(existing, _)| *existing == subject) {
            Some(entry) => entry.1 = permission,
            None => self.entries.push((subject, permission)),
        }
    }

    /// Sugar for the `"role:<name>"` subject.
    pub fn apply_role(&mut self, name: &str, read: bool, write: bool) {
        self.apply(format!("role:{name}"), read, write);
    }

    pub fn get(&self, subject: &str) -> Option<Permission> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == subject)
            .map(|(_, permission)| *permission)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Permission)> {
        self.entries
            .iter()
            .map(|(subject, permission)| (subject.as_str(), *permission))
    }

    /// Structural equality against a plain subject-to-rights mapping.
    pub fn matches(&self, expected: &[(&str, Permission)]) -> bool {
        self.entries.len() == expected.len()
            && expected
                .iter()
                .all(|(subject, permission)| self.get(subject) == Some(*permission))
    }

    /// Serialize to the wire shape, omitting false rights per subject.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (subject, permission) in &self.entries {
            let mut rights = Map::new();
            if permission.read {
                rights.insert("read".into(), json!(true));
            }
            if permission.write {
                rights.insert("write".into(), json!(true));
            }
            out.insert(subject.clone(), Value::Object(rights));
        }
        Value::Object(out)
    }

    /// Decode a wire ACL. Unknown keys inside a rights object are ignored.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut acl = Self::new();
        for (subject, rights) in obj {
            let read = rights.get("read").and_then(Value::as_bool).unwrap_or(false);
            let write = rights.get("write").and_then(Value::as_bool).unwrap_or(false);
            // An explicit no-rights row in a server payload is dropped, which
            // matches how apply() normalizes.
            acl.apply(subject.clone(), read, write);
        }
        Some(acl)
    }
}

impl PartialEq<&[(&str, Permission)]> for Acl {
    fn eq(&self, other: &&[(&str, Permission)]) -> bool {
        self.matches(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_and_overwrites() {
        let mut acl = Acl::new();
        acl.apply(PUBLIC, true, false);
        acl.apply("xKq9mT2pWc", true, true);
        acl.apply(PUBLIC, true, true);

        assert_eq!(acl.len(), 2);
        assert_eq!(acl.get(PUBLIC), Some(Permission::new(true, true)));
        // Overwriting keeps the original position.
        assert_eq!(acl.iter().next().map(|(s, _)| s), Some(PUBLIC));
    }

    #[test]
    fn test_apply_no_rights_removes_entry() {
        let mut acl = Acl::new();
        acl.apply("xKq9mT2pWc", true, true);
        acl.apply("xKq9mT2pWc", false, false);

        assert!(acl.is_empty());
    }

    #[test]
    fn test_apply_no_rights_on_absent_subject_is_noop() {
        let mut acl = Acl::new();
        acl.apply("missing", false, false);

        assert!(acl.is_empty());
    }

    #[test]
    fn test_role_sugar() {
        let mut acl = Acl::new();
        acl.apply_role("Admin", true, true);

        assert_eq!(acl.get("role:Admin"), Some(Permission::new(true, true)));
    }

    #[test]
    fn test_structural_equality() {
        let mut acl = Acl::new();
        acl.apply(PUBLIC, true, false);
        acl.apply_role("Admin", true, true);

        let expected: &[(&str, Permission)] = &[
            ("role:Admin", Permission::new(true, true)),
            (PUBLIC, Permission::new(true, false)),
        ];
        assert_eq!(acl, expected);

        let wrong: &[(&str, Permission)] = &[(PUBLIC, Permission::new(true, true))];
        assert_ne!(acl, wrong);
    }

    #[test]
    fn test_wire_round_trip_omits_false_rights() {
        let mut acl = Acl::new();
        acl.apply(PUBLIC, true, false);

        let encoded = acl.to_json();
        assert_eq!(encoded["*"]["read"], true);
        assert!(encoded["*"].get("write").is_none());

        assert_eq!(Acl::from_json(&encoded), Some(acl));
    }

    #[test]
    fn test_explicit_empty_acl_decodes_to_empty() {
        let acl = Acl::from_json(&json!({})).unwrap();
        assert!(acl.is_empty());
    }
}
