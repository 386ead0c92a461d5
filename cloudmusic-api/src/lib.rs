//! Netease Cloud Music API client library.
//!
//! Calls are described by static [`Provider`] values (see [`catalog`]) and
//! dispatched through [`CloudMusicApi::request`], which returns the response
//! as a [`serde_json::Value`] tree carrying an integer `code`.
//!
//! ```no_run
//! # async fn run() -> cloudmusic_api::Result<()> {
//! use cloudmusic_api::{CloudMusicApi, Cookie, catalog, provider::query};
//!
//! let api = CloudMusicApi::with_cookies([Cookie::new("MUSIC_U", "YOUR_MUSIC_U")])?;
//! let songs = api
//!     .request(&catalog::SONG_DETAIL, &query([("ids", "347230")]), true)
//!     .await?;
//! println!("{}", songs["songs"][0]["name"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Dispatch
//!
//! | Provider                      | Strategy                                   |
//! |-------------------------------|--------------------------------------------|
//! | [`catalog::CHECK_MUSIC`]      | track URL lookup reduced to `{success, message}` |
//! | [`catalog::LOGIN`]            | `502` replaced by a fixed error tree       |
//! | [`catalog::LOGIN_STATUS`]     | home page scraped for `GUser` / `GBinds`   |
//! | [`catalog::RELATED_PLAYLIST`] | playlist page scraped for related cards    |
//! | everything else               | passthrough, `301` message localized       |
//!
//! # Encryption
//!
//! Payloads use the weapi, linuxapi or eapi scheme selected per provider.
//! See [`crypto`](crate::crypto) (internal).

pub mod catalog;
pub mod client;
pub mod cookie;
mod crypto;
pub mod error;
pub mod handlers;
pub mod options;
pub mod provider;
pub mod response;
pub mod scrape;
#[cfg(test)]
mod testing;
pub mod transport;

pub use client::CloudMusicApi;
pub use cookie::{Cookie, CookieStore};
pub use error::{CloudMusicError, Result, ScrapeError};
pub use handlers::SessionProbe;
pub use options::{ClientSettings, Crypto, EffectiveOptions, UserAgent};
pub use provider::{HttpMethod, Provider, ProviderId, Query};
pub use response::is_success;
pub use transport::{HttpTransport, Transport, TransportResponse};
