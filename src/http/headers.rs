//! Header multimap shared by requests, responses, and cached snapshots.

use std::collections::BTreeMap;

/// Ordered list of header fields with case-insensitive lookup.
///
/// A name may appear any number of times; every occurrence is kept in the
/// order it was added, which is how `Set-Cookie` and friends survive a trip
/// through the cache.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Set-Cookie", "a=1");
/// headers.insert("set-cookie", "b=2");
///
/// assert_eq!(headers.get("SET-COOKIE"), Some("a=1"));
/// assert_eq!(headers.get_all("Set-Cookie").count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Adds a field; earlier fields with the same name are left in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value stored under `name`, oldest first.
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.iter()
            .filter_map(move |(field, value)| field.eq_ignore_ascii_case(name).then_some(value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Folds the fields into a name → values map, keeping the relative order of
    /// repeated values. Names are kept exactly as inserted.
    pub fn grouped(&self) -> BTreeMap<String, Vec<String>> {
        self.fields
            .iter()
            .fold(BTreeMap::new(), |mut map: BTreeMap<String, Vec<String>>, (name, value)| {
                map.entry(name.clone()).or_default().push(value.clone());
                map
            })
    }
}
