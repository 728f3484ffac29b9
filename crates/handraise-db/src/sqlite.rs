//! Local document store: a JSON tree kept as one SQLite row per leaf.
//!
//! Objects are flattened into `(path, scalar)` rows and reassembled on read,
//! which gives the same subtree semantics as the Realtime Database REST API.
//! Arrays are stored under their indices and read back as objects.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::{Map, Value};
use tracing::info;

use crate::migrations;
use crate::path::DbPath;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }

    pub fn get(&self, path: &DbPath) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            let key = path.to_string();

            if !path.is_root() {
                let leaf: Option<String> = conn
                    .query_row("SELECT value FROM nodes WHERE path = ?1", [&key], |row| {
                        row.get(0)
                    })
                    .optional()?;

                if let Some(raw) = leaf {
                    return Ok(Some(serde_json::from_str(&raw)?));
                }
            }

            let rows = query_subtree(conn, path)?;
            if rows.is_empty() {
                return Ok(None);
            }

            let strip = if path.is_root() { 0 } else { key.len() + 1 };
            let mut tree = Value::Object(Map::new());
            for (row_path, raw) in rows {
                let leaf: Value = serde_json::from_str(&raw)?;
                insert_leaf(&mut tree, row_path[strip..].split('/'), leaf);
            }

            Ok(Some(tree))
        })
    }

    pub fn set(&self, path: &DbPath, value: &Value) -> Result<()> {
        let mut leaves = Vec::new();
        flatten(path, value, &mut leaves)?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            delete_subtree(&tx, path)?;

            // A scalar sitting on an ancestor would shadow the new subtree.
            for ancestor in path.ancestors() {
                tx.execute("DELETE FROM nodes WHERE path = ?1", [ancestor.to_string()])?;
            }

            {
                let mut stmt = tx.prepare("INSERT INTO nodes (path, value) VALUES (?1, ?2)")?;
                for (leaf_path, raw) in &leaves {
                    stmt.execute((leaf_path, raw))?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete(&self, path: &DbPath) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            delete_subtree(&tx, path)?;
            tx.commit()?;
            Ok(())
        })
    }
}

/// Descendant bounds: every path under `p/` sorts strictly between `p/` and `p0`,
/// since `0` is the byte right after `/`.
fn subtree_bounds(path: &DbPath) -> (String, String) {
    let key = path.to_string();
    (format!("{key}/"), format!("{key}0"))
}

fn query_subtree(conn: &Connection, path: &DbPath) -> Result<Vec<(String, String)>> {
    let rows = if path.is_root() {
        let mut stmt = conn.prepare("SELECT path, value FROM nodes ORDER BY path")?;
        stmt.query_map([], path_value)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        let (lo, hi) = subtree_bounds(path);
        let mut stmt = conn.prepare(
            "SELECT path, value FROM nodes WHERE path > ?1 AND path < ?2 ORDER BY path",
        )?;
        stmt.query_map((lo, hi), path_value)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    Ok(rows)
}

fn path_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn delete_subtree(tx: &Transaction<'_>, path: &DbPath) -> Result<()> {
    if path.is_root() {
        tx.execute("DELETE FROM nodes", [])?;
        return Ok(());
    }

    let (lo, hi) = subtree_bounds(path);
    tx.execute(
        "DELETE FROM nodes WHERE path = ?1 OR (path > ?2 AND path < ?3)",
        (path.to_string(), lo, hi),
    )?;
    Ok(())
}

fn flatten(path: &DbPath, value: &Value, out: &mut Vec<(String, String)>) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&path.child(key)?, child, out)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&path.child(&index.to_string())?, child, out)?;
            }
        }
        scalar => {
            if path.is_root() {
                bail!("Cannot store a scalar at the database root");
            }
            out.push((path.to_string(), scalar.to_string()));
        }
    }
    Ok(())
}

fn insert_leaf<'a>(node: &mut Value, mut parts: impl Iterator<Item = &'a str>, leaf: Value) {
    match parts.next() {
        None => *node = leaf,
        Some(part) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let child = map.entry(part.to_string()).or_insert(Value::Null);
                insert_leaf(child, parts, leaf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> DbPath {
        DbPath::parse(p).unwrap()
    }

    #[test]
    fn set_then_get_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = json!({ "name": "Ada", "broadcaster": "true", "channel": "live" });

        store.set(&path("users/u1"), &user).unwrap();

        assert_eq!(store.get(&path("users/u1")).unwrap(), Some(user));
        assert_eq!(store.get(&path("users/u1/name")).unwrap(), Some(json!("Ada")));
    }

    #[test]
    fn get_assembles_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("users/u1"), &json!({ "name": "Ada" })).unwrap();
        store.set(&path("users/u2"), &json!({ "name": "Grace" })).unwrap();

        assert_eq!(
            store.get(&path("users")).unwrap(),
            Some(json!({ "u1": { "name": "Ada" }, "u2": { "name": "Grace" } }))
        );
    }

    #[test]
    fn siblings_with_shared_prefix_are_excluded() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("users/u1"), &json!({ "name": "Ada" })).unwrap();
        store.set(&path("users-archive/u9"), &json!({ "name": "Old" })).unwrap();
        store.set(&path("users0/u9"), &json!({ "name": "Zero" })).unwrap();
        store.set(&path("usersx"), &json!(1)).unwrap();

        assert_eq!(
            store.get(&path("users")).unwrap(),
            Some(json!({ "u1": { "name": "Ada" } }))
        );
    }

    #[test]
    fn set_replaces_whole_subtree() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set(&path("privilege/u1"), &json!({ "accepted": "false", "note": "x" }))
            .unwrap();
        store
            .set(&path("privilege/u1"), &json!({ "accepted": "true" }))
            .unwrap();

        assert_eq!(
            store.get(&path("privilege/u1")).unwrap(),
            Some(json!({ "accepted": "true" }))
        );
    }

    #[test]
    fn set_below_scalar_replaces_it() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("room"), &json!("closed")).unwrap();
        store.set(&path("room/-Nabc"), &json!({ "message": "hi" })).unwrap();

        assert_eq!(
            store.get(&path("room")).unwrap(),
            Some(json!({ "-Nabc": { "message": "hi" } }))
        );
    }

    #[test]
    fn null_and_empty_object_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("a/b"), &json!({ "c": 1 })).unwrap();
        store.set(&path("a/b"), &json!({})).unwrap();
        assert_eq!(store.get(&path("a")).unwrap(), None);

        store.set(&path("a/b"), &json!(true)).unwrap();
        store.set(&path("a/b"), &Value::Null).unwrap();
        assert_eq!(store.get(&path("a/b")).unwrap(), None);
    }

    #[test]
    fn delete_removes_subtree_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("privilege/u1"), &json!({ "accepted": "false" })).unwrap();
        store.set(&path("privilege/u2"), &json!({ "accepted": "true" })).unwrap();

        store.delete(&path("privilege/u1")).unwrap();

        assert_eq!(store.get(&path("privilege/u1")).unwrap(), None);
        assert_eq!(
            store.get(&path("privilege")).unwrap(),
            Some(json!({ "u2": { "accepted": "true" } }))
        );
    }

    #[test]
    fn scalar_types_survive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let value = json!({ "n": 1.5, "b": false, "s": "1", "list": ["x", "y"] });
        store.set(&path("mixed"), &value).unwrap();

        assert_eq!(
            store.get(&path("mixed")).unwrap(),
            Some(json!({ "n": 1.5, "b": false, "s": "1", "list": { "0": "x", "1": "y" } }))
        );
    }

    #[test]
    fn nested_invalid_key_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .set(&path("users/u1"), &json!({ "bad.key": 1 }))
            .unwrap_err();
        assert!(err.downcast_ref::<crate::DbError>().is_some());
        assert_eq!(store.get(&path("users")).unwrap(), None);
    }

    #[test]
    fn root_read_returns_everything() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(&path("a"), &json!(1)).unwrap();
        store.set(&path("b/c"), &json!("d")).unwrap();

        assert_eq!(
            store.get(&DbPath::root()).unwrap(),
            Some(json!({ "a": 1, "b": { "c": "d" } }))
        );
    }
}
