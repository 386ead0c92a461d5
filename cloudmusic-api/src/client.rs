//! Dispatching client for Netease Cloud Music.
//!
//! [`CloudMusicApi::request`] takes a [`Provider`] from the
//! [`catalog`](crate::catalog) and a [`Query`], and returns the response tree.
//! Four providers are answered by dedicated handlers (see
//! [`handlers`](crate::handlers)); all others take the passthrough path:
//!
//! 1. Build URL and payload from the query
//! 2. [`merge`] provider options, client settings and session cookies
//! 3. Send through the [`Transport`]
//! 4. Store cookies the server set
//! 5. Replace the message of a `301` response with [`NOT_LOGGED_IN`]
//!
//! # Response format
//!
//! Every tree carries an integer `code` (200–299 = success):
//!
//! ```json
//! {
//!   "code": 200,
//!   ...endpoint-specific fields...
//! }
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;

use crate::cookie::{Cookie, CookieStore};
use crate::error::{CloudMusicError, Result};
use crate::handlers::{NOT_LOGGED_IN, SESSION_EXPIRED_CODE};
use crate::options::{ClientSettings, EffectiveOptions, merge};
use crate::provider::{Provider, ProviderId, Query};
use crate::response::{is_success, status_code};
use crate::transport::{HttpTransport, Transport};

/// Async client for the Netease Cloud Music API.
///
/// Owns the session cookie store for its whole lifetime. The client is
/// `Send + Sync`; share it behind an [`Arc`] to issue concurrent calls.
pub struct CloudMusicApi {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
    cookies: RwLock<CookieStore>,
}

impl CloudMusicApi {
    /// Create a client with an empty session and the default
    /// [`HttpTransport`].
    pub fn new() -> Result<Self> {
        Self::with_cookies(CookieStore::new())
    }

    /// Create a client whose session starts with `cookies`.
    ///
    /// Accepts zero, one, or many cookies: an array, a `Vec`, an
    /// `Option<Cookie>`, or a [`CookieStore`].
    pub fn with_cookies(cookies: impl IntoIterator<Item = Cookie>) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new()?), cookies))
    }

    /// Create a client on top of a custom [`Transport`].
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        cookies: impl IntoIterator<Item = Cookie>,
    ) -> Self {
        Self {
            transport,
            settings: ClientSettings::default(),
            cookies: RwLock::new(cookies.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ClientSettings {
        &mut self.settings
    }

    /// Snapshot of the session cookies.
    pub fn cookies(&self) -> CookieStore {
        self.session().clone()
    }

    /// Insert or replace a session cookie.
    pub fn set_cookie(&self, cookie: Cookie) {
        self.session_mut().upsert(cookie);
    }

    /// Remove every session cookie named `name`.
    pub fn remove_cookie(&self, name: &str) -> usize {
        self.session_mut().remove(name)
    }

    /// Call `provider` with `query`.
    ///
    /// With `fail_on_error`, a response whose `code` is outside 200–299
    /// yields [`CloudMusicError::OperationFailed`]; without it the tree is
    /// returned as is and the caller inspects `code` itself.
    ///
    /// # Errors
    ///
    /// - [`CloudMusicError::Http`]: network failure on the passthrough path
    /// - [`CloudMusicError::OperationFailed`]: classified failure
    /// - [`CloudMusicError::MalformedResponse`]: no `code` to classify
    pub async fn request(
        &self,
        provider: &Provider,
        query: &Query,
        fail_on_error: bool,
    ) -> Result<Value> {
        debug!(route = provider.route, id = ?provider.id, "dispatching");
        let json = match provider.id {
            ProviderId::CheckMusic => self.check_music(provider, query).await?,
            ProviderId::Login => self.login(provider, query).await?,
            ProviderId::LoginStatus => self.login_status(provider, query).await,
            ProviderId::RelatedPlaylist => self.related_playlist(provider, query).await,
            _ => self.passthrough(provider, query).await?,
        };
        if fail_on_error && !is_success(&json)? {
            return Err(CloudMusicError::OperationFailed {
                route: provider.route,
            });
        }
        Ok(json)
    }

    /// Options for one call to `provider`, built from a copy of the session.
    pub fn effective_options(&self, provider: &Provider) -> EffectiveOptions {
        merge(&self.settings, &self.session(), &provider.options)
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Send `provider` through the transport without any post-processing.
    pub(crate) async fn call(&self, provider: &Provider, query: &Query) -> Result<Value> {
        let url = provider.build_url(query);
        let data = provider.build_data(query);
        let options = self.effective_options(provider);
        let resp = self
            .transport
            .send(provider.method, &url, data, &options)
            .await?;
        self.store_cookies(resp.cookies);
        Ok(resp.body)
    }

    async fn passthrough(&self, provider: &Provider, query: &Query) -> Result<Value> {
        let mut json = self.call(provider, query).await?;
        if status_code(&json).ok() == Some(SESSION_EXPIRED_CODE) {
            json["msg"] = NOT_LOGGED_IN.into();
        }
        Ok(json)
    }

    fn store_cookies(&self, cookies: Vec<Cookie>) {
        if cookies.is_empty() {
            return;
        }
        debug!(count = cookies.len(), "storing response cookies");
        let mut session = self.session_mut();
        for cookie in cookies {
            session.upsert(cookie);
        }
    }

    pub(crate) fn session(&self) -> RwLockReadGuard<'_, CookieStore> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, CookieStore> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LOGIN, SONG_DETAIL, USER_ACCOUNT};
    use crate::provider::{HttpMethod, query};
    use crate::testing::MockTransport;
    use serde_json::json;

    fn client(mock: &Arc<MockTransport>, cookies: Vec<Cookie>) -> CloudMusicApi {
        CloudMusicApi::with_transport(mock.clone(), cookies)
    }

    #[tokio::test]
    async fn passthrough_returns_transport_tree() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(json!({ "code": 200, "songs": [{ "id": 347_230 }] }));
        let api = client(&mock, vec![]);

        let q = query([("ids", "347230")]);
        let tree = api.request(&SONG_DETAIL, &q, true).await.unwrap();
        assert_eq!(tree["songs"][0]["id"], 347_230);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Post);
        assert_eq!(calls[0].url, "https://music.163.com/weapi/v3/song/detail");
        assert_eq!(calls[0].data["ids"], "[347230]");
    }

    #[tokio::test]
    async fn passthrough_remaps_301_message() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(json!({ "code": 301, "msg": "需要登录" }));
        let api = client(&mock, vec![]);

        let tree = api.request(&USER_ACCOUNT, &Query::new(), false).await.unwrap();
        assert_eq!(tree, json!({ "code": 301, "msg": NOT_LOGGED_IN }));
    }

    #[tokio::test]
    async fn fail_on_error_raises_with_route() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(json!({ "code": 301 }));
        let api = client(&mock, vec![]);

        let err = api.request(&USER_ACCOUNT, &Query::new(), true).await.unwrap_err();
        assert!(matches!(
            err,
            CloudMusicError::OperationFailed { route: "/user/account" }
        ));
    }

    #[tokio::test]
    async fn missing_code_is_malformed_only_when_classifying() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(json!({ "songs": [] }));
        mock.reply(json!({ "songs": [] }));
        let api = client(&mock, vec![]);

        let err = api.request(&SONG_DETAIL, &Query::new(), true).await.unwrap_err();
        assert!(matches!(err, CloudMusicError::MalformedResponse));

        let tree = api.request(&SONG_DETAIL, &Query::new(), false).await.unwrap();
        assert_eq!(tree, json!({ "songs": [] }));
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("connection reset");
        let api = client(&mock, vec![]);

        let err = api.request(&SONG_DETAIL, &Query::new(), false).await.unwrap_err();
        assert!(matches!(err, CloudMusicError::Transport(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn options_merge_provider_then_session_cookies() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(json!({ "code": 200 }));
        let api = client(&mock, vec![Cookie::new("MUSIC_U", "u1")])
            .with_settings(ClientSettings::default().with_real_ip("116.25.146.177"));

        api.request(&crate::catalog::LOGIN_CELLPHONE, &Query::new(), true)
            .await
            .unwrap();

        let options = &mock.calls()[0].options;
        let names: Vec<&str> = options.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["os", "MUSIC_U"]);
        assert_eq!(options.real_ip.as_deref(), Some("116.25.146.177"));
    }

    #[tokio::test]
    async fn response_cookies_update_session() {
        let mock = Arc::new(MockTransport::new());
        mock.reply_with_cookies(
            json!({ "code": 200 }),
            vec![Cookie::new("MUSIC_U", "fresh").with_path("/")],
        );
        mock.reply(json!({ "code": 200 }));
        let api = client(&mock, vec![Cookie::new("MUSIC_U", "stale").with_path("/")]);

        api.request(&LOGIN, &Query::new(), true).await.unwrap();
        assert_eq!(api.cookies().get("MUSIC_U"), Some("fresh"));
        assert_eq!(api.cookies().len(), 1);

        api.request(&USER_ACCOUNT, &Query::new(), true).await.unwrap();
        assert_eq!(mock.calls()[1].options.cookies.get("MUSIC_U"), Some("fresh"));
    }

    #[test]
    fn effective_options_are_detached_from_session() {
        let mock = Arc::new(MockTransport::new());
        let api = client(&mock, vec![Cookie::new("MUSIC_U", "u1")]);
        let before = api.effective_options(&USER_ACCOUNT);
        api.set_cookie(Cookie::new("MUSIC_U", "u2"));
        api.remove_cookie("MUSIC_U");
        assert_eq!(before.cookies.get("MUSIC_U"), Some("u1"));
        assert!(api.cookies().is_empty());
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CloudMusicApi>();
    }
}
