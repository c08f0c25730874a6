//! Identifier hashing for emitted code and reflection.

use std::collections::BTreeMap;

use glslt_ast::HashFunction;

/// Prefix of every hashed identifier.
pub const HASHED_NAME_PREFIX: &str = "webgl_";

/// Original identifier to hashed identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameMap {
    entries: BTreeMap<String, String>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: impl Into<String>, hashed: impl Into<String>) {
        self.entries.insert(original.into(), hashed.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps user identifiers to `webgl_<16 hex digits>` when a hash function
/// is configured, recording every mapping it hands out.
#[derive(Clone, Debug, Default)]
pub struct NameHasher {
    function: Option<HashFunction>,
    map: NameMap,
}

impl NameHasher {
    pub fn new(function: Option<HashFunction>) -> Self {
        Self {
            function,
            map: NameMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.function.is_some()
    }

    /// The emitted name of `name`. Built-ins, empty names and everything
    /// when hashing is off come back unchanged.
    pub fn hash(&mut self, name: &str) -> String {
        let Some(function) = self.function else {
            return name.to_string();
        };
        if name.is_empty() || name.starts_with("gl_") {
            return name.to_string();
        }
        if let Some(hashed) = self.map.get(name) {
            return hashed.to_string();
        }
        let hashed = format!("{HASHED_NAME_PREFIX}{:016x}", function(name));
        self.map.insert(name, hashed.clone());
        hashed
    }

    pub fn map(&self) -> &NameMap {
        &self.map
    }

    pub fn into_map(self) -> NameMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fnv1a(name: &str) -> u64 {
        name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    #[test]
    fn disabled_hasher_is_identity() {
        let mut hasher = NameHasher::new(None);
        assert_eq!(hasher.hash("color"), "color");
        assert!(hasher.map().is_empty());
    }

    #[test]
    fn hashed_names_have_fixed_width() {
        let mut hasher = NameHasher::new(Some(|_| 0xab));
        assert_eq!(hasher.hash("color"), "webgl_00000000000000ab");
        assert_eq!(hasher.hash("gl_Position"), "gl_Position");
        assert_eq!(hasher.map().get("color"), Some("webgl_00000000000000ab"));
        assert_eq!(hasher.map().len(), 1);
    }

    #[test]
    fn hashing_is_stable() {
        let mut hasher = NameHasher::new(Some(fnv1a));
        let first = hasher.hash("u_mvp");
        assert_eq!(hasher.hash("u_mvp"), first);
        assert_eq!(first.len(), HASHED_NAME_PREFIX.len() + 16);
    }
}
