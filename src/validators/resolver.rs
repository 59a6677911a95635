//! Subtype resolution.
//!
//! The subtype catalog (device types) belongs to the backend; the gate only
//! needs to turn the identifier found in a request body into a canonical
//! subtype name. "Not found" is an ordinary answer, not an error.

use crate::config::SubtypeEntry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// How a request refers to its subtype
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubtypeKey {
    /// Numeric id (create / admin update endpoints)
    Id(i64),
    /// Subtype name (self-service update endpoint)
    Name(String),
}

impl fmt::Display for SubtypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtypeKey::Id(id) => write!(f, "{}", id),
            SubtypeKey::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Lookup infrastructure failure
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("subtype lookup unavailable: {0}")]
    Unavailable(String),
}

/// Maps a subtype reference to its canonical name.
///
/// Implementations may block on I/O; the gate calls this once per protected
/// request on the request's own thread.
pub trait SubtypeResolver: Send + Sync {
    /// `Ok(None)` when the subtype is not known
    fn resolve_name(&self, key: &SubtypeKey) -> Result<Option<String>, ResolveError>;
}

/// In-memory subtype table
#[derive(Debug, Default)]
pub struct StaticSubtypeResolver {
    by_id: RwLock<HashMap<i64, String>>,
}

impl StaticSubtypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from the `[[subtypes]]` config section
    pub fn from_entries(entries: &[SubtypeEntry]) -> Self {
        let by_id = entries
            .iter()
            .map(|entry| (entry.id, entry.name.clone()))
            .collect();
        Self {
            by_id: RwLock::new(by_id),
        }
    }

    /// Add or replace a subtype, returning the previous name for that id
    pub fn register(&self, id: i64, name: impl Into<String>) -> Option<String> {
        let name = name.into();
        debug!(id, %name, "Registering subtype");
        self.by_id.write().insert(id, name)
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

impl SubtypeResolver for StaticSubtypeResolver {
    fn resolve_name(&self, key: &SubtypeKey) -> Result<Option<String>, ResolveError> {
        let table = self.by_id.read();
        let name = match key {
            SubtypeKey::Id(id) => table.get(id).cloned(),
            SubtypeKey::Name(name) => table.values().find(|known| *known == name).cloned(),
        };
        Ok(name)
    }
}
