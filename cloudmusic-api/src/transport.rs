//! HTTP transport.
//!
//! [`Transport`] is the seam between the dispatcher and the network. The
//! bundled [`HttpTransport`] talks to `music.163.com` with `reqwest`:
//!
//! 1. Encrypt the payload according to [`Crypto`]:
//!    - weapi: add `csrf_token`, POST `params` + `encSecKey` to `/weapi/...`
//!    - linuxapi: wrap `{method, url, params}`, POST `eparams` to
//!      `/api/linux/forward`
//!    - eapi: add a `header` object, sign with the canonical URL, POST
//!      `params` to `/eapi/...`
//! 2. Attach `User-Agent`, `Referer`, `X-Real-IP`, and `Cookie` headers.
//! 3. Normalize the body into a tree with an integer `code`.
//!
//! `Set-Cookie` headers of the response are handed back to the caller so
//! the client can update its session store.

use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, COOKIE, REFERER, SET_COOKIE, USER_AGENT};
use reqwest::{Client, Proxy};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::cookie::Cookie;
use crate::crypto::{eapi_encrypt, linuxapi_encrypt, weapi_encrypt};
use crate::error::{CloudMusicError, Result};
use crate::options::{ClientSettings, Crypto, EffectiveOptions, UserAgent};
use crate::provider::{HttpMethod, Query};

const REFERER_URL: &str = "https://music.163.com";
const LINUX_FORWARD_URL: &str = "https://music.163.com/api/linux/forward";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static API_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w*api").expect("api segment pattern is a valid regex"));

/// Result of one JSON API call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// Response tree, always an object with an integer `code`.
    pub body: Value,
    /// Cookies set by the server.
    pub cookies: Vec<Cookie>,
}

/// Executes HTTP calls on behalf of the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one encrypted API call.
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        data: Query,
        options: &EffectiveOptions,
    ) -> Result<TransportResponse>;

    /// Fetch a page as raw bytes, with only the given extra headers.
    ///
    /// Only the proxy fields of `settings` apply to page fetches.
    async fn send_raw(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &[(&str, String)],
        settings: &ClientSettings,
    ) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by an async [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Honors proxies from the environment.
    default: Client,
    /// Bypasses every proxy.
    direct: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with a 30 s request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let default = Client::builder().timeout(timeout).build()?;
        let direct = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self {
            default,
            direct,
            timeout,
        })
    }

    fn client_for(&self, use_proxy: bool, proxy: Option<&str>) -> Result<Client> {
        if !use_proxy {
            return Ok(self.direct.clone());
        }
        let Some(url) = proxy else {
            return Ok(self.default.clone());
        };
        let proxy = Proxy::all(url).map_err(|source| CloudMusicError::Proxy {
            url: url.to_owned(),
            source,
        })?;
        Ok(Client::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        data: Query,
        options: &EffectiveOptions,
    ) -> Result<TransportResponse> {
        let prepared = prepare(method, url, data, options)?;
        debug!(
            url = %prepared.url,
            crypto = ?options.crypto,
            method = method.as_str(),
            "sending API request"
        );

        let mut req = self
            .client_for(options.use_proxy, options.proxy.as_deref())?
            .request(method.into(), &prepared.url)
            .header(USER_AGENT, prepared.user_agent);

        if prepared.url.contains("music.163.com") {
            req = req.header(REFERER, REFERER_URL);
        }
        if let Some(ip) = &options.real_ip {
            req = req.header("X-Real-IP", ip).header("X-Forwarded-For", ip);
        }
        if let Some(cookie) = prepared.cookie {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = prepared.body {
            req = req
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(Cookie::parse_set_cookie)
            .collect();
        let bytes = resp.bytes().await?;
        let body = normalize_body(status, &bytes);
        debug!(status, code = ?body.get("code"), "API response");

        Ok(TransportResponse { body, cookies })
    }

    async fn send_raw(
        &self,
        url: &str,
        method: HttpMethod,
        headers: &[(&str, String)],
        settings: &ClientSettings,
    ) -> Result<Vec<u8>> {
        debug!(url, method = method.as_str(), "fetching page");
        let mut req = self
            .client_for(settings.use_proxy, settings.proxy.as_deref())?
            .request(method.into(), url);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// A request after encryption, ready to hand to `reqwest`.
#[derive(Debug)]
struct PreparedRequest {
    url: String,
    body: Option<String>,
    user_agent: &'static str,
    cookie: Option<String>,
}

fn prepare(
    method: HttpMethod,
    url: &str,
    mut data: Query,
    options: &EffectiveOptions,
) -> Result<PreparedRequest> {
    let cookies = &options.cookies;
    let mut user_agent = options.user_agent.choose();
    let mut cookie = cookies.header();

    let (url, body) = match options.crypto {
        Crypto::Weapi => {
            let csrf = cookies.get("__csrf").unwrap_or_default();
            data.insert("csrf_token".into(), csrf.into());
            let payload = weapi_encrypt(&serde_json::to_string(&data)?);
            let body = format!(
                "params={}&encSecKey={}",
                urlencoding::encode(&payload.params),
                payload.enc_sec_key,
            );
            (API_SEGMENT.replace(url, "weapi").into_owned(), body)
        }
        Crypto::Linuxapi => {
            let forward = json!({
                "method": method.as_str(),
                "url": API_SEGMENT.replace(url, "api"),
                "params": data,
            });
            user_agent = UserAgent::Linux.choose();
            let body = format!("eparams={}", linuxapi_encrypt(&forward.to_string()));
            (LINUX_FORWARD_URL.to_owned(), body)
        }
        Crypto::Eapi => {
            let header = eapi_header(options);
            cookie = Some(
                header
                    .iter()
                    .map(|(k, v)| {
                        let v = v.as_str().unwrap_or_default();
                        format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            );
            data.insert("header".into(), Value::Object(header));
            let canonical = options.url.as_deref().unwrap_or(url);
            let body = format!(
                "params={}",
                eapi_encrypt(canonical, &serde_json::to_string(&data)?)
            );
            (API_SEGMENT.replace(url, "eapi").into_owned(), body)
        }
    };

    let body = match method {
        HttpMethod::Post => Some(body),
        HttpMethod::Get => None,
    };
    Ok(PreparedRequest {
        url,
        body,
        user_agent,
        cookie,
    })
}

/// Device header sent with eapi calls, doubling as the `Cookie` header.
fn eapi_header(options: &EffectiveOptions) -> Map<String, Value> {
    let cookies = &options.cookies;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let request_id = format!(
        "{}_{:04}",
        now.as_millis(),
        rand::rng().random_range(0..1000)
    );

    let mut header = Map::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            header.insert(key.to_owned(), Value::String(value));
        }
    };
    let cookie = |name: &str| cookies.get(name).map(str::to_owned);

    put("osver", cookie("osver"));
    put("deviceId", cookie("deviceId"));
    put("appver", cookie("appver").or_else(|| Some("8.7.01".into())));
    put("versioncode", cookie("versioncode").or_else(|| Some("140".into())));
    put("mobilename", cookie("mobilename"));
    put("buildver", cookie("buildver").or_else(|| Some(now.as_secs().to_string())));
    put("resolution", cookie("resolution").or_else(|| Some("1920x1080".into())));
    put("__csrf", Some(cookie("__csrf").unwrap_or_default()));
    put("os", cookie("os").or_else(|| Some("android".into())));
    put("channel", cookie("channel"));
    put("requestId", Some(request_id));
    put("MUSIC_U", cookie("MUSIC_U"));
    put("MUSIC_A", cookie("MUSIC_A"));
    header
}

/// Turn any response body into an object carrying an integer `code`.
///
/// A JSON object keeps its own `code`, or receives the HTTP status when it
/// has none. Other JSON values are wrapped under `data`; non-JSON bodies end
/// up as text under `msg`.
fn normalize_body(status: u16, bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(mut map)) => {
            map.entry("code").or_insert_with(|| status.into());
            Value::Object(map)
        }
        Ok(other) => json!({ "code": status, "data": other }),
        Err(_) => json!({ "code": status, "msg": String::from_utf8_lossy(bytes) }),
    }
}
