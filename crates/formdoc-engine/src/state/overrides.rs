use std::collections::BTreeMap;

use thiserror::Error;

/// Rejected fragment override that would make one id both a source and a
/// target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("overrideFrag '{frag_id}' -> '{new_frag_id}' would form a chain")]
pub struct OverrideChainError {
    pub frag_id: String,
    pub new_frag_id: String,
}

/// Fragment id replacements declared by `overrideFrag` commands.
///
/// An id is either a source or a target, never both, so lookups resolve in a
/// single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    map: BTreeMap<String, String>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `frag_id -> new_frag_id`. The first mapping for a source
    /// wins; repeating it is a no-op.
    pub fn insert(&mut self, frag_id: &str, new_frag_id: &str) -> Result<(), OverrideChainError> {
        if self.map.get(frag_id).map(String::as_str) == Some(new_frag_id) {
            return Ok(());
        }
        if self.map.contains_key(new_frag_id) || self.map.values().any(|v| v == frag_id) {
            return Err(OverrideChainError {
                frag_id: frag_id.to_string(),
                new_frag_id: new_frag_id.to_string(),
            });
        }
        self.map
            .entry(frag_id.to_string())
            .or_insert_with(|| new_frag_id.to_string());
        Ok(())
    }

    /// The replacement for `frag_id`, or `frag_id` itself.
    pub fn resolve<'a>(&'a self, frag_id: &'a str) -> &'a str {
        self.map.get(frag_id).map_or(frag_id, String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
