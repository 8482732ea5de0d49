//! String map with ASCII case-insensitive keys.
//!
//! Template parameters, metadata properties and failure diagnostics are all
//! free-form string maps whose keys producers spell inconsistently
//! (`AutoRetry`, `autoRetry`, ...). Keys keep the spelling they were first
//! inserted with; lookups and overwrites ignore case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct CaseInsensitiveMap {
    entries: BTreeMap<String, String>,
}

impl CaseInsensitiveMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn existing_key(&self, key: &str) -> Option<&String> {
        self.entries.keys().find(|k| k.eq_ignore_ascii_case(key))
    }

    /// Insert a value, replacing any entry whose key matches ignoring case.
    ///
    /// Returns the previous value, if one existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let previous = self
            .existing_key(&key)
            .cloned()
            .and_then(|existing| self.entries.remove(&existing));
        self.entries.insert(key, value.into());
        previous
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.existing_key(key)
            .and_then(|k| self.entries.get(k))
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let existing = self.existing_key(key)?.clone();
        self.entries.remove(&existing)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.existing_key(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for CaseInsensitiveMap {
    fn from(entries: BTreeMap<String, String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<CaseInsensitiveMap> for BTreeMap<String, String> {
    fn from(map: CaseInsensitiveMap) -> Self {
        map.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaseInsensitiveMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
