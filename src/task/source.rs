use std::collections::HashMap;

/// A string-keyed source of raw override values.
///
/// Lookups consume: once a key has been taken it is gone from the source,
/// so a second build over the same source falls back to defaults.
pub trait OverrideSource: std::fmt::Debug {
    fn take(&mut self, key: &str) -> Option<String>;
}

impl<S: OverrideSource + ?Sized> OverrideSource for &mut S {
    fn take(&mut self, key: &str) -> Option<String> {
        (**self).take(key)
    }
}

/// An in-memory override source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSource {
    entries: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OverrideSource for MapSource {
    fn take(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
