//! Session and user record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity data returned by the profile endpoint.
///
/// The record is opaque to this layer: it is stored and replaced as a whole,
/// never merged field by field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Wrap a JSON value, which must be an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The server-side identifier (`_id` or `id`).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.str_field("_id").or_else(|| self.str_field("id"))
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Email address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    /// Role, e.g. `admin`.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.str_field("role")
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The record as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// The local record of an authenticated identity.
///
/// A session is always whole: a credential without a subject (or the reverse)
/// is never represented.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque bearer credential.
    pub credential: String,
    /// The authenticated user.
    pub subject: UserRecord,
    /// When this process established or restored the session.
    pub issued_locally: DateTime<Utc>,
}

impl Session {
    /// Create a session stamped with the current time.
    pub fn new(credential: impl Into<String>, subject: UserRecord) -> Self {
        Self {
            credential: credential.into(),
            subject,
            issued_locally: Utc::now(),
        }
    }

    /// The same credential with a freshly fetched subject.
    #[must_use]
    pub fn with_subject(&self, subject: UserRecord) -> Self {
        Self {
            credential: self.credential.clone(),
            subject,
            issued_locally: self.issued_locally,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_record_accessors() {
        let user = UserRecord::from_value(json!({
            "_id": "64f0",
            "name": "Ada",
            "email": "ada@example.com",
            "role": "admin"
        }))
        .unwrap();

        assert_eq!(user.id(), Some("64f0"));
        assert_eq!(user.name(), Some("Ada"));
        assert_eq!(user.email(), Some("ada@example.com"));
        assert_eq!(user.role(), Some("admin"));
    }

    #[test]
    fn user_record_falls_back_to_plain_id() {
        let user = UserRecord::from_value(json!({"id": 7, "name": "Bo"})).unwrap();
        assert_eq!(user.id(), None);

        let user = UserRecord::from_value(json!({"id": "u-7"})).unwrap();
        assert_eq!(user.id(), Some("u-7"));
    }

    #[test]
    fn user_record_rejects_non_objects() {
        assert!(UserRecord::from_value(json!("ada")).is_none());
        assert!(UserRecord::from_value(Value::Null).is_none());
    }

    #[test]
    fn user_record_serializes_transparently() {
        let raw = json!({"name": "Ada", "email": "ada@example.com"});
        let user = UserRecord::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);

        let back: UserRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn with_subject_keeps_credential() {
        let session = Session::new("tok", UserRecord::default());
        let subject = UserRecord::from_value(json!({"name": "New"})).unwrap();
        let refreshed = session.with_subject(subject.clone());

        assert_eq!(refreshed.credential, "tok");
        assert_eq!(refreshed.subject, subject);
        assert_eq!(refreshed.issued_locally, session.issued_locally);
    }
}
