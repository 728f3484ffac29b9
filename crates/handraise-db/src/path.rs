use std::fmt;

use crate::error::DbError;

/// Longest key Firebase accepts, in bytes.
const MAX_KEY_LEN: usize = 768;

/// A validated location in the document tree. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DbPath {
    segments: Vec<String>,
}

impl DbPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Leading, trailing and doubled slashes are ignored.
    pub fn parse(path: &str) -> Result<Self, DbError> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_key(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Like `parse`, but the result must name a location below the root.
    pub fn parse_location(path: &str) -> Result<Self, DbError> {
        let parsed = Self::parse(path)?;
        if parsed.is_root() {
            return Err(DbError::InvalidKey(path.to_string()));
        }
        Ok(parsed)
    }

    /// Append one key. The key must be a single valid segment.
    pub fn child(&self, key: &str) -> Result<Self, DbError> {
        validate_key(key)?;
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Every proper ancestor, root excluded, nearest last.
    pub fn ancestors(&self) -> impl Iterator<Item = DbPath> + '_ {
        (1..self.segments.len()).map(|n| DbPath {
            segments: self.segments[..n].to_vec(),
        })
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Check a single key against Firebase's key rules.
pub fn validate_key(key: &str) -> Result<(), DbError> {
    let bad = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key
            .chars()
            .any(|c| matches!(c, '.' | '$' | '#' | '[' | ']' | '/') || c.is_ascii_control());

    if bad {
        return Err(DbError::InvalidKey(key.to_string()));
    }
    Ok(())
}
