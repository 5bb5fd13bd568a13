use crate::LabelSelector;
use std::{collections::BTreeMap, sync::Arc};

/// Records which preview version an object belongs to.
pub const PREVIEW_VERSION: &str = "preview.io/version";

/// Records the field manager that created an object.
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

#[derive(Clone, Debug, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// Sets `key` in an optional label map, creating the map if it is absent.
pub fn set(labels: &mut Option<Map>, key: impl ToString, value: impl ToString) {
    labels
        .get_or_insert_with(Map::new)
        .insert(key.to_string(), value.to_string());
}

/// Replaces the value of `key` only if the map already holds it.
///
/// Returns true if the value was replaced.
pub fn replace(labels: &mut Option<Map>, key: &str, value: impl ToString) -> bool {
    match labels.as_mut().and_then(|l| l.get_mut(key)) {
        Some(v) => {
            *v = value.to_string();
            true
        }
        None => false,
    }
}

/// Returns true if the selector's `matchLabels` binds `key` to `value`.
///
/// Match expressions are not considered.
pub fn selects(selector: &LabelSelector, key: &str, value: &str) -> bool {
    selector
        .match_labels
        .as_ref()
        .and_then(|l| l.get(key))
        .is_some_and(|v| v == value)
}

// === Labels ===

impl Labels {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over the labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}
