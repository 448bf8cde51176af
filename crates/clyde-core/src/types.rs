use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of node names currently designated as seeders.
///
/// Serialized as a plain JSON array of names, sorted for stable diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeederSet(BTreeSet<String>);

impl SeederSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Returns true if the name was not already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for SeederSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for SeederSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl IntoIterator for SeederSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_sorted_array() {
        let set: SeederSet = ["node-b", "node-a"].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"["node-a","node-b"]"#
        );
    }

    #[test]
    fn deserializes_duplicates_once() {
        let set: SeederSet = serde_json::from_str(r#"["a","a","b"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }
}
