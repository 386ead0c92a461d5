//! Cookie entries and the ordered session store.
//!
//! The server authenticates web API calls through cookies on `music.163.com`;
//! the important one is `MUSIC_U`, issued after login. Other cookies
//! (`__csrf`, `os`, `appver`, ...) steer the request encryption and the
//! server's client detection.
//!
//! A [`CookieStore`] keeps insertion order and tolerates duplicate names.
//! Lookups and the `Cookie` header resolve duplicates last-write-wins.

use serde::{Deserialize, Serialize};

/// A single cookie entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parse a `Set-Cookie` header value.
    ///
    /// Only `Domain` and `Path` attributes are kept; expiry and flags are
    /// dropped. Returns `None` when the leading `name=value` pair is missing.
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Self::new(name, value.trim());
        for attr in parts {
            let Some((key, val)) = attr.split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim().eq_ignore_ascii_case("domain") {
                cookie.domain = Some(val.to_owned());
            } else if key.trim().eq_ignore_ascii_case("path") {
                cookie.path = Some(val.to_owned());
            }
        }
        Some(cookie)
    }

    /// Parse a `NAME=VALUE` pair as typed on a command line.
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| Self::new(name, value.trim()))
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Ordered collection of cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieStore {
    entries: Vec<Cookie>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.entries.iter()
    }

    /// Append without any deduplication.
    pub fn push(&mut self, cookie: Cookie) {
        self.entries.push(cookie);
    }

    /// Replace the entry with the same name, domain and path, or append.
    pub fn upsert(&mut self, cookie: Cookie) {
        match self.entries.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(slot) => slot.value = cookie.value,
            None => self.entries.push(cookie),
        }
    }

    /// Remove every entry named `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|c| c.name != name);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Value of the last entry named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Build the `Cookie` HTTP header value.
    ///
    /// Each name appears once, at the position of its first occurrence,
    /// carrying the value of its last occurrence. Returns `None` for an
    /// empty store.
    pub fn header(&self) -> Option<String> {
        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(self.entries.len());
        for cookie in &self.entries {
            match pairs.iter_mut().find(|(name, _)| *name == cookie.name) {
                Some(pair) => pair.1 = &cookie.value,
                None => pairs.push((&cookie.name, &cookie.value)),
            }
        }
        if pairs.is_empty() {
            return None;
        }
        let header = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

impl Extend<Cookie> for CookieStore {
    fn extend<I: IntoIterator<Item = Cookie>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl FromIterator<Cookie> for CookieStore {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<Cookie> for CookieStore {
    fn from(cookie: Cookie) -> Self {
        Self {
            entries: vec![cookie],
        }
    }
}

impl IntoIterator for CookieStore {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a CookieStore {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
