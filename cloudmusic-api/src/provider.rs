//! Provider descriptors.
//!
//! A [`Provider`] describes one remote capability: how to turn a caller's
//! [`Query`] into a URL and a payload, and which [`ProviderOptions`] the
//! endpoint needs. Providers are plain `'static` data; the concrete set lives
//! in [`catalog`](crate::catalog).

use serde_json::{Map, Value};

use crate::options::ProviderOptions;

/// Caller-supplied parameters, keyed by name.
pub type Query = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
        }
    }
}

/// Identity of every provider in the catalog.
///
/// The dispatcher branches on this value, never on the shape of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    CheckMusic,
    Login,
    LoginCellphone,
    LoginStatus,
    Logout,
    RelatedPlaylist,
    Search,
    SongDetail,
    SongUrl,
    Lyric,
    PlaylistDetail,
    UserAccount,
    UserPlaylist,
}

/// Static description of one remote endpoint.
pub struct Provider {
    pub id: ProviderId,
    /// Route name, used in diagnostics and for lookup by the CLI.
    pub route: &'static str,
    pub method: HttpMethod,
    pub url: fn(&Query) -> String,
    pub data: fn(&Query) -> Query,
    pub options: ProviderOptions,
}

impl Provider {
    pub fn build_url(&self, query: &Query) -> String {
        (self.url)(query)
    }

    pub fn build_data(&self, query: &Query) -> Query {
        (self.data)(query)
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("route", &self.route)
            .field("method", &self.method)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Read a query value as text.
///
/// Strings are returned as is, numbers and booleans in their JSON form.
/// `null` and missing keys yield `None`.
pub fn arg(query: &Query, key: &str) -> Option<String> {
    match query.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Like [`arg`], with a fallback.
pub fn arg_or(query: &Query, key: &str, default: &str) -> String {
    arg(query, key).unwrap_or_else(|| default.to_owned())
}

/// Build a [`Query`] from `(key, value)` pairs.
pub fn query<K, V, I>(pairs: I) -> Query
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
