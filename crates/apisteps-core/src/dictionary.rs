//! Data dictionaries: dotted element paths mapped to fixed values
//!
//! Paths name object members from the root (`owner.address.city`). Array
//! elements share the path of the array itself, so `tags.name` addresses the
//! `name` member of every element of `tags`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataDictionary {
    entries: BTreeMap<String, Value>,
}

/// Path of member `key` under `parent` (empty parent = root).
#[must_use]
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

impl DataDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) {
        self.entries.insert(path.into(), value);
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Overwrite existing members whose path has an entry.
    ///
    /// Members absent from `value` are not created. Returns the number of
    /// replacements.
    pub fn apply(&self, value: &mut Value) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let replaced = self.apply_at(value, "");
        tracing::debug!(replaced, "applied data dictionary");
        replaced
    }

    fn apply_at(&self, value: &mut Value, path: &str) -> usize {
        match value {
            Value::Object(map) => map
                .iter_mut()
                .map(|(key, member)| {
                    let member_path = child_path(path, key);
                    match self.entries.get(&member_path) {
                        Some(fixed) => {
                            *member = fixed.clone();
                            1
                        }
                        None => self.apply_at(member, &member_path),
                    }
                })
                .sum(),
            Value::Array(items) => items.iter_mut().map(|item| self.apply_at(item, path)).sum(),
            _ => 0,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DataDictionary {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_nested_members() {
        let dict: DataDictionary = [
            ("name", json!("Rex")),
            ("owner.city", json!("Berlin")),
        ]
        .into_iter()
        .collect();
        let mut body = json!({"name": "abc", "owner": {"city": "xyz", "zip": "1"}});

        assert_eq!(dict.apply(&mut body), 2);
        assert_eq!(body, json!({"name": "Rex", "owner": {"city": "Berlin", "zip": "1"}}));
    }

    #[test]
    fn array_elements_share_the_array_path() {
        let dict: DataDictionary = [("tags.label", json!("fixed"))].into_iter().collect();
        let mut body = json!({"tags": [{"label": "a"}, {"label": "b"}]});

        assert_eq!(dict.apply(&mut body), 2);
        assert_eq!(body, json!({"tags": [{"label": "fixed"}, {"label": "fixed"}]}));
    }

    #[test]
    fn missing_members_are_not_created() {
        let dict: DataDictionary = [("age", json!(3))].into_iter().collect();
        let mut body = json!({"name": "abc"});
        assert_eq!(dict.apply(&mut body), 0);
        assert_eq!(body, json!({"name": "abc"}));
    }

    #[test]
    fn scalars_are_untouched() {
        let dict: DataDictionary = [("x", json!(1))].into_iter().collect();
        let mut body = json!("plain");
        assert_eq!(dict.apply(&mut body), 0);
    }

    #[test]
    fn deserializes_from_toml_table() {
        let toml = r#"
"pet.name" = "Rex"
"pet.age" = 3
"#;
        let dict: DataDictionary = toml::from_str(toml).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("pet.name"), Some(&json!("Rex")));
        assert_eq!(dict.get("pet.age"), Some(&json!(3)));
    }

    #[test]
    fn child_path_from_root() {
        assert_eq!(child_path("", "a"), "a");
        assert_eq!(child_path("a", "b"), "a.b");
    }
}
