//! Per-call transport options and the options merger.
//!
//! Three sources feed every call:
//!
//! 1. [`ProviderOptions`]: static defaults declared by the provider
//!    (crypto mode, default cookies, user-agent class, canonical URL);
//! 2. [`ClientSettings`]: client-wide knobs (real IP, proxy);
//! 3. the client's session [`CookieStore`].
//!
//! [`merge`] folds them into a fresh [`EffectiveOptions`] that the transport
//! consumes and then drops.

use rand::Rng;

use crate::cookie::{Cookie, CookieStore};

/// Request encryption scheme expected by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Crypto {
    /// Browser scheme: double AES-128-CBC + RSA.
    #[default]
    Weapi,
    /// Linux desktop client scheme: AES-128-ECB forwarded through
    /// `/api/linux/forward`.
    Linuxapi,
    /// Mobile client scheme: AES-128-ECB with an MD5 digest, requires the
    /// canonical `/api/...` URL.
    Eapi,
}

/// User-agent class. A concrete string is picked per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserAgent {
    #[default]
    Any,
    Mobile,
    Pc,
    Linux,
}

const MOBILE_AGENTS: &[&str] = &[
    "Mozilla/5.0 (iPhone; CPU iPhone OS 13_5_1 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Mobile/15E148 CloudMusic/0.1.1 NeteaseMusic/7.2.20",
    "Mozilla/5.0 (Linux; Android 9; PCT-AL10) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/70.0.3538.64 HuaweiBrowser/10.0.3.311 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; U; Android 9; zh-cn; Redmi Note 8 Build/PKQ1.190616.001) \
     AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/71.0.3578.141 \
     Mobile Safari/537.36 XiaoMi/MiuiBrowser/12.5.22",
];

const PC_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const LINUX_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/60.0.3112.90 Safari/537.36";

impl UserAgent {
    /// Pick a concrete user-agent string from this class.
    pub fn choose(self) -> &'static str {
        let pool: Vec<&'static str> = match self {
            Self::Mobile => MOBILE_AGENTS.to_vec(),
            Self::Pc => PC_AGENTS.to_vec(),
            Self::Linux => return LINUX_AGENT,
            Self::Any => MOBILE_AGENTS.iter().chain(PC_AGENTS).copied().collect(),
        };
        pool[rand::rng().random_range(0..pool.len())]
    }
}

/// Default options declared statically by a provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderOptions {
    pub crypto: Crypto,
    /// Cookies the endpoint always expects, e.g. `os=pc` for login.
    pub cookies: &'static [(&'static str, &'static str)],
    pub user_agent: UserAgent,
    /// Canonical `/api/...` URL used when signing eapi payloads.
    pub url: Option<&'static str>,
}

impl ProviderOptions {
    pub const fn new(crypto: Crypto) -> Self {
        Self {
            crypto,
            cookies: &[],
            user_agent: UserAgent::Any,
            url: None,
        }
    }

    pub const fn cookies(mut self, cookies: &'static [(&'static str, &'static str)]) -> Self {
        self.cookies = cookies;
        self
    }

    pub const fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub const fn url(mut self, url: &'static str) -> Self {
        self.url = Some(url);
        self
    }
}

/// Client-wide transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Sent as `X-Real-IP` / `X-Forwarded-For` when set.
    pub real_ip: Option<String>,
    /// When `false`, every proxy (including environment proxies) is bypassed.
    pub use_proxy: bool,
    /// Explicit proxy URL, e.g. `http://127.0.0.1:8888`.
    pub proxy: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            real_ip: None,
            use_proxy: true,
            proxy: None,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub fn with_real_ip(mut self, ip: impl Into<String>) -> Self {
        self.real_ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }
}

/// Fully merged configuration for exactly one transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    pub crypto: Crypto,
    /// Provider cookies followed by session cookies; duplicates are kept.
    pub cookies: CookieStore,
    pub user_agent: UserAgent,
    pub url: Option<String>,
    pub real_ip: Option<String>,
    pub use_proxy: bool,
    pub proxy: Option<String>,
}

/// Merge provider defaults, client settings and session cookies.
///
/// The result owns copies of everything it holds, so later changes to the
/// session store never reach an options value already handed to a transport.
pub fn merge(
    settings: &ClientSettings,
    session: &CookieStore,
    options: &ProviderOptions,
) -> EffectiveOptions {
    let mut cookies: CookieStore = options
        .cookies
        .iter()
        .map(|(name, value)| Cookie::new(*name, *value))
        .collect();
    cookies.extend(session.iter().cloned());

    EffectiveOptions {
        crypto: options.crypto,
        cookies,
        user_agent: options.user_agent,
        url: options.url.map(str::to_owned),
        real_ip: settings.real_ip.clone(),
        use_proxy: settings.use_proxy,
        proxy: settings.proxy.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_OPTIONS: ProviderOptions = ProviderOptions::new(Crypto::Weapi)
        .cookies(&[("os", "pc")])
        .user_agent(UserAgent::Pc)
        .url("/api/login");

    fn session() -> CookieStore {
        [Cookie::new("MUSIC_U", "u1"), Cookie::new("os", "android")]
            .into_iter()
            .collect()
    }

    #[test]
    fn merge_orders_provider_cookies_first() {
        let settings = ClientSettings::default().with_real_ip("116.25.146.177");
        let merged = merge(&settings, &session(), &LOGIN_OPTIONS);

        let names: Vec<&str> = merged.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["os", "MUSIC_U", "os"]);
        // session cookie overrides the provider default in the header
        assert_eq!(merged.cookies.header().as_deref(), Some("os=android; MUSIC_U=u1"));

        assert_eq!(merged.crypto, Crypto::Weapi);
        assert_eq!(merged.user_agent, UserAgent::Pc);
        assert_eq!(merged.url.as_deref(), Some("/api/login"));
        assert_eq!(merged.real_ip.as_deref(), Some("116.25.146.177"));
        assert!(merged.use_proxy);
        assert_eq!(merged.proxy, None);
    }

    #[test]
    fn merge_is_pure() {
        let settings = ClientSettings::default()
            .with_proxy("http://127.0.0.1:8888")
            .with_use_proxy(false);
        let mut store = session();
        let first = merge(&settings, &store, &LOGIN_OPTIONS);
        let second = merge(&settings, &store, &LOGIN_OPTIONS);
        assert_eq!(first, second);

        store.push(Cookie::new("__csrf", "t"));
        store.remove("MUSIC_U");
        assert_eq!(first, second);
        assert_eq!(first.cookies.get("MUSIC_U"), Some("u1"));
        assert_eq!(first.cookies.get("__csrf"), None);
        assert!(!first.use_proxy);
        assert_eq!(first.proxy.as_deref(), Some("http://127.0.0.1:8888"));
    }

    #[test]
    fn choose_stays_within_class() {
        for _ in 0..16 {
            assert!(PC_AGENTS.contains(&UserAgent::Pc.choose()));
            assert!(MOBILE_AGENTS.contains(&UserAgent::Mobile.choose()));
        }
        assert_eq!(UserAgent::Linux.choose(), LINUX_AGENT);
    }
}
