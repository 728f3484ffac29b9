use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub broadcaster: String,
    pub channel: String,
}

/// Stored at `privilege/{uid}`. This service writes the string `"true"` or
/// `"false"`, but other writers to the same database may leave a boolean or
/// nothing at all, so any JSON value is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeRecord {
    #[serde(default)]
    pub accepted: Value,
}

impl PrivilegeRecord {
    pub fn pending() -> Self {
        Self {
            accepted: Value::from("false"),
        }
    }

    pub fn granted() -> Self {
        Self {
            accepted: Value::from("true"),
        }
    }

    /// Only the string `"true"` counts as granted.
    pub fn is_accepted(&self) -> bool {
        self.accepted.as_str() == Some("true")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn privilege(raw: Value) -> PrivilegeRecord {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn privilege_writes_string_flags() {
        assert_eq!(
            serde_json::to_value(PrivilegeRecord::pending()).unwrap(),
            json!({ "accepted": "false" })
        );
        assert_eq!(
            serde_json::to_value(PrivilegeRecord::granted()).unwrap(),
            json!({ "accepted": "true" })
        );
    }

    #[test]
    fn only_string_true_is_accepted() {
        assert!(privilege(json!({ "accepted": "true" })).is_accepted());
        assert!(!privilege(json!({ "accepted": "false" })).is_accepted());
        assert!(!privilege(json!({ "accepted": false })).is_accepted());
        assert!(!privilege(json!({ "accepted": true })).is_accepted());
        assert!(!privilege(json!({})).is_accepted());
    }

    #[test]
    fn scalar_is_not_a_privilege_record() {
        assert!(serde_json::from_value::<PrivilegeRecord>(json!("yes")).is_err());
    }
}

/// Appended under `{channel}/{push-id}`. Sender fields are copied from the
/// user record at post time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub uid: String,
    pub name: String,
    pub broadcaster: String,
    pub message: String,
}
