//! Handlers for providers that need more than the passthrough path.
//!
//! | Provider                                          | Strategy |
//! |---------------------------------------------------|----------|
//! | [`CHECK_MUSIC`](crate::catalog::CHECK_MUSIC)      | track URL lookup → `{success, message}` |
//! | [`LOGIN`](crate::catalog::LOGIN)                  | `502` → fixed wrong-credentials tree |
//! | [`LOGIN_STATUS`](crate::catalog::LOGIN_STATUS)    | scrape `GUser` / `GBinds` from the home page |
//! | [`RELATED_PLAYLIST`](crate::catalog::RELATED_PLAYLIST) | scrape the related-playlists panel |
//!
//! The two scraping handlers never fail: session status degrades to
//! `{code: 301}`, related playlists to `{code: 500, message}`.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::catalog::LOGIN_STATUS;
use crate::client::CloudMusicApi;
use crate::error::{Result, ScrapeError};
use crate::options::UserAgent;
use crate::provider::{HttpMethod, Provider, Query, arg};
use crate::response::status_code;
use crate::scrape::{LoginStatus, extract_login_status, extract_related_playlists};

/// `msg` of a passthrough response with code [`SESSION_EXPIRED_CODE`].
pub const NOT_LOGGED_IN: &str = "未登录";
/// `message` of an unplayable track.
pub const NO_COPYRIGHT: &str = "亲爱的,暂无版权";
/// `message` of a login rejected with code [`BAD_CREDENTIALS_CODE`].
pub const BAD_CREDENTIALS: &str = "账号或密码错误";

pub const SESSION_EXPIRED_CODE: i64 = 301;
pub const BAD_CREDENTIALS_CODE: i64 = 502;

/// Outcome of reading the login state from the home page.
#[derive(Debug)]
pub enum SessionProbe {
    /// The page carried a logged-in user.
    Active(LoginStatus),
    /// The page was served to an anonymous visitor.
    Anonymous,
    /// The page could not be fetched or its embedded data could not be
    /// parsed.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl SessionProbe {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Response tree: `{code: 200, profile, bindings}` or `{code: 301}`.
    pub fn into_tree(self) -> Value {
        match self {
            Self::Active(status) => json!({
                "code": 200,
                "profile": status.profile,
                "bindings": status.bindings,
            }),
            Self::Anonymous | Self::Failed(_) => json!({ "code": SESSION_EXPIRED_CODE }),
        }
    }
}

impl CloudMusicApi {
    /// Read the login state of the current session from the home page.
    pub async fn probe_session(&self) -> SessionProbe {
        self.probe_session_at(&LOGIN_STATUS.build_url(&Query::new()))
            .await
    }

    async fn probe_session_at(&self, url: &str) -> SessionProbe {
        let cookie = self.session().header().unwrap_or_default();
        let bytes = match self
            .transport()
            .send_raw(url, HttpMethod::Get, &[("Cookie", cookie)], self.settings())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => return SessionProbe::Failed(e.into()),
        };
        match extract_login_status(&String::from_utf8_lossy(&bytes)) {
            Ok(status) => SessionProbe::Active(status),
            Err(ScrapeError::MissingMarker(marker)) => {
                debug!(marker, "home page has no session data");
                SessionProbe::Anonymous
            }
            Err(e) => SessionProbe::Failed(e.into()),
        }
    }

    pub(crate) async fn check_music(&self, provider: &Provider, query: &Query) -> Result<Value> {
        let json = self.call(provider, query).await?;
        let playable =
            status_code(&json)? == 200 && json["data"][0]["code"].as_i64() == Some(200);
        Ok(json!({
            "code": 200,
            "success": playable,
            "message": if playable { "ok" } else { NO_COPYRIGHT },
        }))
    }

    pub(crate) async fn login(&self, provider: &Provider, query: &Query) -> Result<Value> {
        let json = self.call(provider, query).await?;
        if status_code(&json).ok() == Some(BAD_CREDENTIALS_CODE) {
            return Ok(json!({
                "code": BAD_CREDENTIALS_CODE,
                "message": BAD_CREDENTIALS,
            }));
        }
        Ok(json)
    }

    pub(crate) async fn login_status(&self, provider: &Provider, query: &Query) -> Value {
        let probe = self.probe_session_at(&provider.build_url(query)).await;
        if let SessionProbe::Failed(e) = &probe {
            warn!(error = %e, "session probe failed, reporting not logged in");
        }
        probe.into_tree()
    }

    pub(crate) async fn related_playlist(&self, provider: &Provider, query: &Query) -> Value {
        if arg(query, "id").is_none() {
            warn!(route = provider.route, "related playlist call without an id");
            return json!({ "code": 500, "message": "missing query parameter `id`" });
        }
        let url = provider.build_url(query);
        match self.fetch_related_playlists(&url).await {
            Ok(playlists) => json!({ "code": 200, "playlists": playlists }),
            Err(e) => {
                warn!(%url, error = %e, "related playlist scrape failed");
                json!({ "code": 500, "message": e.to_string() })
            }
        }
    }

    async fn fetch_related_playlists(&self, url: &str) -> Result<Value> {
        let headers = [("User-Agent", UserAgent::Pc.choose().to_owned())];
        let bytes = self
            .transport()
            .send_raw(url, HttpMethod::Get, &headers, self.settings())
            .await?;
        let cards = extract_related_playlists(&String::from_utf8_lossy(&bytes));
        debug!(url, count = cards.len(), "scraped related playlists");
        Ok(serde_json::to_value(cards)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{CHECK_MUSIC, LOGIN, RELATED_PLAYLIST};
    use crate::cookie::Cookie;
    use crate::error::CloudMusicError;
    use crate::options::ClientSettings;
    use crate::provider::query;
    use crate::testing::MockTransport;

    const HOME_LOGGED_IN: &str = include_str!("../tests/fixtures/home_logged_in.html");
    const HOME_ANONYMOUS: &str = include_str!("../tests/fixtures/home_anonymous.html");
    const PLAYLIST_PAGE: &str = include_str!("../tests/fixtures/playlist_related.html");

    fn setup(cookies: Vec<Cookie>) -> (Arc<MockTransport>, CloudMusicApi) {
        let mock = Arc::new(MockTransport::new());
        let api = CloudMusicApi::with_transport(mock.clone(), cookies);
        (mock, api)
    }

    #[tokio::test]
    async fn check_music_playable() {
        let (mock, api) = setup(vec![]);
        mock.reply(json!({ "code": 200, "data": [{ "id": 33_894_312, "code": 200, "url": "http://m7.music.126.net/a.mp3" }] }));

        let q = query([("id", json!(33_894_312))]);
        let tree = api.request(&CHECK_MUSIC, &q, true).await.unwrap();
        assert_eq!(tree, json!({ "code": 200, "success": true, "message": "ok" }));
        assert_eq!(mock.calls()[0].data["ids"], "[33894312]");
    }

    #[tokio::test]
    async fn check_music_without_license() {
        let (mock, api) = setup(vec![]);
        mock.reply(json!({ "code": 200, "data": [{ "id": 1, "code": 404, "url": null }] }));

        let tree = api.request(&CHECK_MUSIC, &query([("id", "1")]), true).await.unwrap();
        assert_eq!(tree["success"], false);
        assert_eq!(tree["message"], NO_COPYRIGHT);
    }

    #[tokio::test]
    async fn check_music_top_level_failure_is_not_playable() {
        let (mock, api) = setup(vec![]);
        mock.reply(json!({ "code": 301 }));

        let tree = api.request(&CHECK_MUSIC, &query([("id", "1")]), false).await.unwrap();
        assert_eq!(tree["success"], false);
        // no passthrough remap
        assert!(tree.get("msg").is_none());
    }

    #[tokio::test]
    async fn login_bad_credentials_is_replaced() {
        let (mock, api) = setup(vec![]);
        mock.reply(json!({ "code": 502, "msg": "密码错误", "extra": { "x": 1 } }));

        let q = query([("email", "a@163.com"), ("password", "wrong")]);
        let tree = api.request(&LOGIN, &q, false).await.unwrap();
        assert_eq!(tree, json!({ "code": 502, "message": BAD_CREDENTIALS }));

        mock.reply(json!({ "code": 502 }));
        let err = api.request(&LOGIN, &q, true).await.unwrap_err();
        assert!(matches!(err, CloudMusicError::OperationFailed { route: "/login" }));
    }

    #[tokio::test]
    async fn login_success_passes_through() {
        let (mock, api) = setup(vec![]);
        let body = json!({ "code": 200, "account": { "id": 32_953_014 }, "profile": { "nickname": "binaryify" } });
        mock.reply(body.clone());

        let tree = api.request(&LOGIN, &query([("email", "a@163.com")]), true).await.unwrap();
        assert_eq!(tree, body);
        assert_eq!(mock.calls()[0].options.cookies.get("os"), Some("pc"));
    }

    #[tokio::test]
    async fn login_301_is_not_remapped() {
        let (mock, api) = setup(vec![]);
        mock.reply(json!({ "code": 301 }));
        let tree = api.request(&LOGIN, &Query::new(), false).await.unwrap();
        assert_eq!(tree, json!({ "code": 301 }));
    }

    #[tokio::test]
    async fn login_status_parses_home_page() {
        let (mock, api) = setup(vec![Cookie::new("MUSIC_U", "u1"), Cookie::new("__csrf", "t")]);
        mock.page(HOME_LOGGED_IN);

        let tree = api.request(&LOGIN_STATUS, &Query::new(), true).await.unwrap();
        assert_eq!(tree["code"], 200);
        assert_eq!(tree["profile"]["userId"], 32_953_014);
        assert_eq!(tree["profile"]["nickname"], "binaryify");
        assert_eq!(tree["bindings"][1]["type"], 10);

        let raw = mock.raw_calls();
        assert_eq!(raw[0].method, HttpMethod::Get);
        assert_eq!(raw[0].url, "https://music.163.com");
        assert_eq!(
            raw[0].headers,
            [("Cookie".to_owned(), "MUSIC_U=u1; __csrf=t".to_owned())]
        );
    }

    #[tokio::test]
    async fn login_status_anonymous_is_exactly_301() {
        let (mock, api) = setup(vec![]);
        mock.page(HOME_ANONYMOUS);

        let tree = api.request(&LOGIN_STATUS, &Query::new(), false).await.unwrap();
        assert_eq!(tree, json!({ "code": 301 }));
    }

    #[tokio::test]
    async fn login_status_fetch_failure_is_301() {
        let (mock, api) = setup(vec![]);
        mock.page_error("timed out");

        let tree = api.request(&LOGIN_STATUS, &Query::new(), false).await.unwrap();
        assert_eq!(tree, json!({ "code": 301 }));
    }

    #[tokio::test]
    async fn probe_distinguishes_anonymous_from_broken() {
        let (mock, api) = setup(vec![]);
        mock.page(HOME_ANONYMOUS);
        mock.page("var GUser={userId:1,vipType:11};var GBinds=[];");
        mock.page(HOME_LOGGED_IN);

        assert!(matches!(api.probe_session().await, SessionProbe::Anonymous));
        assert!(matches!(api.probe_session().await, SessionProbe::Failed(_)));
        assert!(api.probe_session().await.is_active());
    }

    #[tokio::test]
    async fn related_playlists_from_page() {
        let (mock, api) = setup(vec![Cookie::new("MUSIC_U", "u1")]);
        mock.page(PLAYLIST_PAGE);

        let q = query([("id", json!(2_829_883_282_u64))]);
        let tree = api.request(&RELATED_PLAYLIST, &q, true).await.unwrap();
        assert_eq!(tree["code"], 200);
        let playlists = tree["playlists"].as_array().unwrap();
        assert_eq!(playlists.len(), 3);
        assert_eq!(playlists[1]["id"], "2064474520");
        assert_eq!(playlists[1]["name"], "夜晚 | 温柔的电子");
        assert_eq!(playlists[1]["creator"]["userId"], "339024");
        assert_eq!(playlists[1]["creator"]["nickname"], "Mr_小卷");
        assert_eq!(
            playlists[1]["coverImgUrl"],
            "http://p1.music.126.net/0I2JUqu3m3bv_ukWUxjT2Q==/109951163071258546.jpg"
        );

        let raw = mock.raw_calls();
        assert_eq!(raw[0].method, HttpMethod::Get);
        assert_eq!(raw[0].url, "https://music.163.com/playlist?id=2829883282");
        assert_eq!(raw[0].headers.len(), 1);
        assert_eq!(raw[0].headers[0].0, "User-Agent");
    }

    #[tokio::test]
    async fn related_playlists_without_id_is_500() {
        let (mock, api) = setup(vec![]);
        mock.page("<html><body>no cards</body></html>");

        let tree = api.request(&RELATED_PLAYLIST, &Query::new(), false).await.unwrap();
        assert_eq!(
            tree,
            json!({ "code": 500, "message": "missing query parameter `id`" })
        );
        assert!(mock.raw_calls().is_empty());

        let q = query([("id", Value::Null)]);
        let err = api.request(&RELATED_PLAYLIST, &q, true).await.unwrap_err();
        assert!(matches!(
            err,
            CloudMusicError::OperationFailed { route: "/related/playlist" }
        ));
    }

    #[tokio::test]
    async fn page_fetches_carry_client_proxy_settings() {
        let (mock, api) = setup(vec![]);
        let api = api.with_settings(
            ClientSettings::default()
                .with_use_proxy(false)
                .with_proxy("http://127.0.0.1:8888"),
        );
        mock.page(HOME_ANONYMOUS);
        mock.page(PLAYLIST_PAGE);

        api.request(&LOGIN_STATUS, &Query::new(), false).await.unwrap();
        api.request(&RELATED_PLAYLIST, &query([("id", "1")]), false)
            .await
            .unwrap();

        let raw = mock.raw_calls();
        assert_eq!(raw.len(), 2);
        for call in &raw {
            assert!(!call.settings.use_proxy);
            assert_eq!(call.settings.proxy.as_deref(), Some("http://127.0.0.1:8888"));
        }
    }

    #[tokio::test]
    async fn related_playlists_failure_is_500_with_message() {
        let (mock, api) = setup(vec![]);
        mock.page_error("dns error");

        let q = query([("id", "1")]);
        let tree = api.request(&RELATED_PLAYLIST, &q, false).await.unwrap();
        assert_eq!(tree, json!({ "code": 500, "message": "transport error: dns error" }));

        mock.page_error("dns error");
        let err = api.request(&RELATED_PLAYLIST, &q, true).await.unwrap_err();
        assert!(matches!(
            err,
            CloudMusicError::OperationFailed { route: "/related/playlist" }
        ));
    }
}
