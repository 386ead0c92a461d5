//! Error types for the Cloud Music API client.

use thiserror::Error;

/// Errors that can occur while dispatching a provider call.
#[derive(Debug, Error)]
pub enum CloudMusicError {
    /// HTTP transport error (connection refused, timeout, TLS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure reported by a non-`reqwest` [`Transport`](crate::Transport)
    /// implementation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response tree has no integer `code` field, so it cannot be
    /// classified.
    #[error("malformed response: missing or non-integer `code` field")]
    MalformedResponse,

    /// The classifier marked the response as failed and the caller asked
    /// for failures to be raised.
    ///
    /// Common codes seen in the tree:
    /// - `301`: not logged in / cookie expired
    /// - `502`: wrong account or password
    /// - `-460`: cheating detected (request too frequent)
    #[error("call to '{route}' failed")]
    OperationFailed {
        /// Route of the provider that failed, e.g. `/song/detail`.
        route: &'static str,
    },

    /// Failed to serialize a payload or parse a JSON body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured proxy URL was rejected.
    #[error("invalid proxy '{url}': {source}")]
    Proxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Convenience alias for `Result<T, CloudMusicError>`.
pub type Result<T> = std::result::Result<T, CloudMusicError>;

/// Failure to pull structured data out of a scraped page.
///
/// Returned by the functions in [`scrape`](crate::scrape); the dispatcher
/// handlers convert it into a status-coded tree and never propagate it.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A JavaScript assignment marker (e.g. `GUser=`) is not in the page.
    #[error("marker `{0}` not found")]
    MissingMarker(&'static str),

    /// The literal after a marker has no closing `};` / `];`.
    #[error("literal after `{0}` is not terminated")]
    Unterminated(&'static str),

    /// The embedded literal is not valid JSON even after key repair.
    #[error("embedded literal is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
