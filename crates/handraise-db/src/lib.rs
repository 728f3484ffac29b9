pub mod error;
pub mod firebase;
pub mod migrations;
pub mod path;
pub mod push_id;
pub mod records;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde_json::Value;

pub use error::DbError;
pub use firebase::{Credentials, FirebaseStore, ServiceAccount};
pub use path::DbPath;

use push_id::PushIdGenerator;
use sqlite::SqliteStore;

/// Handle to the document database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    backend: Arc<Backend>,
}

enum Backend {
    Firebase(FirebaseStore),
    Sqlite {
        store: SqliteStore,
        push_ids: PushIdGenerator,
    },
}

impl Database {
    pub fn firebase(db_url: &str, credentials: Credentials) -> Result<Self> {
        let store = FirebaseStore::new(db_url, credentials)?;
        Ok(Self {
            backend: Arc::new(Backend::Firebase(store)),
        })
    }

    pub fn open_sqlite(path: &Path) -> Result<Self> {
        Ok(Self::with_sqlite(SqliteStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_sqlite(SqliteStore::open_in_memory()?))
    }

    fn with_sqlite(store: SqliteStore) -> Self {
        Self {
            backend: Arc::new(Backend::Sqlite {
                store,
                push_ids: PushIdGenerator::new(),
            }),
        }
    }

    /// The subtree at `path`, or `None` when nothing is stored there.
    pub async fn get(&self, path: &DbPath) -> Result<Option<Value>> {
        match &*self.backend {
            Backend::Firebase(store) => store.get(path).await,
            Backend::Sqlite { store, .. } => {
                let store = store.clone();
                let path = path.clone();
                blocking(move || store.get(&path)).await
            }
        }
    }

    /// Replace the subtree at `path`. `null` or `{}` deletes it.
    pub async fn set(&self, path: &DbPath, value: Value) -> Result<()> {
        match &*self.backend {
            Backend::Firebase(store) => store.set(path, &value).await,
            Backend::Sqlite { store, .. } => {
                let store = store.clone();
                let path = path.clone();
                blocking(move || store.set(&path, &value)).await
            }
        }
    }

    /// Append `value` under a fresh chronological key and return the key.
    pub async fn push(&self, path: &DbPath, value: Value) -> Result<String> {
        match &*self.backend {
            Backend::Firebase(store) => store.push(path, &value).await,
            Backend::Sqlite { store, push_ids } => {
                let key = push_ids.next();
                let store = store.clone();
                let child = path.child(&key)?;
                blocking(move || store.set(&child, &value)).await?;
                Ok(key)
            }
        }
    }

    pub async fn delete(&self, path: &DbPath) -> Result<()> {
        match &*self.backend {
            Backend::Firebase(store) => store.delete(path).await,
            Backend::Sqlite { store, .. } => {
                let store = store.clone();
                let path = path.clone();
                blocking(move || store.delete(&path)).await
            }
        }
    }
}

/// Run blocking SQLite work off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_appends_under_fresh_keys() {
        let db = Database::open_in_memory().unwrap();
        let channel = DbPath::parse("live").unwrap();

        let first = db.push(&channel, json!({ "message": "one" })).await.unwrap();
        let second = db.push(&channel, json!({ "message": "two" })).await.unwrap();
        assert!(first < second);

        let stored = db.get(&channel).await.unwrap().unwrap();
        assert_eq!(stored[&first], json!({ "message": "one" }));
        assert_eq!(stored[&second], json!({ "message": "two" }));
    }

    #[tokio::test]
    async fn delete_then_get_is_none() {
        let db = Database::open_in_memory().unwrap();
        let path = DbPath::parse("privilege/u1").unwrap();

        db.set(&path, json!({ "accepted": "false" })).await.unwrap();
        db.delete(&path).await.unwrap();

        assert_eq!(db.get(&path).await.unwrap(), None);
    }
}
