use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use handraise_types::models::{ChatMessage, PrivilegeRecord, UserRecord};

use crate::error::DbError;
use crate::path::DbPath;
use crate::Database;

const USERS: &str = "users";
const PRIVILEGE: &str = "privilege";

impl Database {
    // -- Users --

    pub async fn put_user(&self, uid: &str, user: &UserRecord) -> Result<()> {
        let path = collection(USERS)?.child(uid)?;
        self.set(&path, to_value(user)?).await
    }

    pub async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        let path = collection(USERS)?.child(uid)?;
        self.get_record(&path, "user").await
    }

    // -- Messages --

    /// Append a message under the channel location, which may be nested
    /// (`channels/live`). Returns the pushed key.
    pub async fn push_message(&self, channel: &str, message: &ChatMessage) -> Result<String> {
        let path = DbPath::parse_location(channel)?;
        self.push(&path, to_value(message)?).await
    }

    // -- Privilege --

    pub async fn request_privilege(&self, uid: &str) -> Result<()> {
        let path = collection(PRIVILEGE)?.child(uid)?;
        self.set(&path, to_value(&PrivilegeRecord::pending())?).await
    }

    pub async fn get_privilege(&self, uid: &str) -> Result<Option<PrivilegeRecord>> {
        let path = collection(PRIVILEGE)?.child(uid)?;
        self.get_record(&path, "privilege").await
    }

    pub async fn grant_privilege(&self, uid: &str) -> Result<()> {
        let path = collection(PRIVILEGE)?.child(uid)?;
        self.set(&path, to_value(&PrivilegeRecord::granted())?).await
    }

    pub async fn remove_privilege(&self, uid: &str) -> Result<()> {
        let path = collection(PRIVILEGE)?.child(uid)?;
        self.delete(&path).await
    }

    async fn get_record<T: DeserializeOwned>(
        &self,
        path: &DbPath,
        kind: &'static str,
    ) -> Result<Option<T>> {
        let Some(value) = self.get(path).await? else {
            return Ok(None);
        };

        let record = serde_json::from_value(value).map_err(|_| DbError::MalformedRecord {
            kind,
            path: path.to_string(),
        })?;
        Ok(Some(record))
    }
}

fn collection(name: &str) -> Result<DbPath> {
    Ok(DbPath::root().child(name)?)
}

fn to_value<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ada() -> UserRecord {
        UserRecord {
            name: "Ada".into(),
            broadcaster: "true".into(),
            channel: "live".into(),
        }
    }

    #[tokio::test]
    async fn user_round_trips_at_users_uid() {
        let db = Database::open_in_memory().unwrap();
        db.put_user("u1", &ada()).await.unwrap();

        assert_eq!(db.get_user("u1").await.unwrap(), Some(ada()));
        assert_eq!(db.get_user("u2").await.unwrap(), None);

        let raw = db.get(&DbPath::parse("users/u1").unwrap()).await.unwrap();
        assert_eq!(
            raw,
            Some(json!({ "name": "Ada", "broadcaster": "true", "channel": "live" }))
        );
    }

    #[tokio::test]
    async fn privilege_lifecycle() {
        let db = Database::open_in_memory().unwrap();

        db.request_privilege("u1").await.unwrap();
        let pending = db.get_privilege("u1").await.unwrap().unwrap();
        assert!(!pending.is_accepted());

        db.grant_privilege("u1").await.unwrap();
        assert!(db.get_privilege("u1").await.unwrap().unwrap().is_accepted());

        db.remove_privilege("u1").await.unwrap();
        assert_eq!(db.get_privilege("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn messages_land_under_channel_root() {
        let db = Database::open_in_memory().unwrap();
        let message = ChatMessage {
            uid: "u1".into(),
            name: "Ada".into(),
            broadcaster: "true".into(),
            message: "hello".into(),
        };

        let key = db.push_message("live", &message).await.unwrap();

        let stored = db
            .get(&DbPath::parse("live").unwrap().child(&key).unwrap())
            .await
            .unwrap();
        assert_eq!(stored, Some(serde_json::to_value(&message).unwrap()));
    }

    #[tokio::test]
    async fn messages_can_target_a_nested_channel() {
        let db = Database::open_in_memory().unwrap();
        let message = ChatMessage {
            uid: "u1".into(),
            name: "Ada".into(),
            broadcaster: "true".into(),
            message: "hello".into(),
        };

        let key = db.push_message("channels/live", &message).await.unwrap();

        let stored = db
            .get(&DbPath::parse("channels/live").unwrap().child(&key).unwrap())
            .await
            .unwrap();
        assert_eq!(stored, Some(serde_json::to_value(&message).unwrap()));

        let err = db.push_message("/", &message).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn boolean_flag_reads_as_pending() {
        let db = Database::open_in_memory().unwrap();
        db.set(&DbPath::parse("privilege/u1").unwrap(), json!({ "accepted": false }))
            .await
            .unwrap();

        let record = db.get_privilege("u1").await.unwrap().unwrap();
        assert!(!record.is_accepted());
    }

    #[tokio::test]
    async fn malformed_record_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.set(&DbPath::parse("privilege/u1").unwrap(), json!("yes"))
            .await
            .unwrap();

        let err = db.get_privilege("u1").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::MalformedRecord { kind: "privilege", .. })
        ));
    }

    #[tokio::test]
    async fn uid_with_slash_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.request_privilege("../users").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::InvalidKey(_))));
    }
}
