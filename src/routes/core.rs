use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

/// One named page: the key used by the control plane and the resource the
/// surface loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub key: String,
    pub resource: String,
}

impl RouteEntry {
    pub fn new(key: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            resource: resource.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no routes defined")]
    Empty,
    #[error("route keys must not be empty")]
    EmptyKey,
    #[error("route key `{0}` is defined more than once")]
    DuplicateKey(String),
}

/// Immutable key → resource mapping. Insertion order is preserved and the
/// first entry is the startup page.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    pub fn from_entries<I, K, R>(entries: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: Into<String>,
    {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (key, resource) in entries {
            let entry = RouteEntry::new(key, resource);
            if entry.key.is_empty() {
                return Err(RouteError::EmptyKey);
            }
            if table.index.contains_key(&entry.key) {
                return Err(RouteError::DuplicateKey(entry.key));
            }
            table.index.insert(entry.key.clone(), table.entries.len());
            table.entries.push(entry);
        }
        if table.entries.is_empty() {
            return Err(RouteError::Empty);
        }
        Ok(table)
    }

    /// A table holding a single route.
    pub fn single(key: impl Into<String>, resource: impl Into<String>) -> Result<Self, RouteError> {
        Self::from_entries([(key.into(), resource.into())])
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&idx| self.entries[idx].resource.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Owned copy of the keys in table order, for response bodies.
    pub fn key_list(&self) -> Vec<String> {
        self.keys().map(str::to_string).collect()
    }

    pub fn default_key(&self) -> &str {
        // Construction rejects empty tables.
        &self.entries[0].key
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
