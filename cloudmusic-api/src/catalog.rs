//! Provider catalog.
//!
//! | Provider             | Endpoint                                   | Crypto   |
//! |----------------------|--------------------------------------------|----------|
//! | [`CHECK_MUSIC`]      | `/weapi/song/enhance/player/url`           | weapi    |
//! | [`LOGIN`]            | `/weapi/login`                             | weapi    |
//! | [`LOGIN_CELLPHONE`]  | `/weapi/login/cellphone`                   | weapi    |
//! | [`LOGIN_STATUS`]     | `https://music.163.com` (HTML)             |:        |
//! | [`LOGOUT`]           | `/weapi/logout`                            | weapi    |
//! | [`RELATED_PLAYLIST`] | `/playlist?id=` (HTML)                     |:        |
//! | [`SEARCH`]           | `/weapi/cloudsearch/get/web`               | weapi    |
//! | [`SONG_DETAIL`]      | `/weapi/v3/song/detail`                    | weapi    |
//! | [`SONG_URL`]         | `/eapi/song/enhance/player/url`            | eapi     |
//! | [`LYRIC`]            | `/api/song/lyric`                          | linuxapi |
//! | [`PLAYLIST_DETAIL`]  | `/weapi/v6/playlist/detail`                | weapi    |
//! | [`USER_ACCOUNT`]     | `/api/nuser/account/get`                   | weapi    |
//! | [`USER_PLAYLIST`]    | `/weapi/user/playlist`                     | weapi    |
//!
//! The two HTML providers are never sent through the JSON transport; the
//! dispatcher routes them to the scraping handlers.

use serde_json::{Value, json};

use crate::crypto::md5_hex;
use crate::options::{Crypto, ProviderOptions, UserAgent};
use crate::provider::{HttpMethod, Provider, ProviderId, Query, arg, arg_or};

const BASE_URL: &str = "https://music.163.com";

const WEAPI: ProviderOptions = ProviderOptions::new(Crypto::Weapi);
const PC_LOGIN: ProviderOptions = ProviderOptions::new(Crypto::Weapi)
    .cookies(&[("os", "pc")])
    .user_agent(UserAgent::Pc);

/// Track playability probe. Query: `id`, optional `br`.
pub static CHECK_MUSIC: Provider = Provider {
    id: ProviderId::CheckMusic,
    route: "/check/music",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/song/enhance/player/url"),
    data: |q| {
        object(json!({
            "ids": format!("[{}]", arg_or(q, "id", "")),
            "br": arg_or(q, "br", "999000"),
        }))
    },
    options: WEAPI,
};

/// E-mail login. Query: `email`, `password` or `md5_password`.
pub static LOGIN: Provider = Provider {
    id: ProviderId::Login,
    route: "/login",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/login"),
    data: |q| {
        object(json!({
            "username": arg_or(q, "email", ""),
            "password": password(q),
            "rememberLogin": "true",
        }))
    },
    options: PC_LOGIN,
};

/// Phone login. Query: `phone`, optional `countrycode`, `password` or
/// `md5_password`.
pub static LOGIN_CELLPHONE: Provider = Provider {
    id: ProviderId::LoginCellphone,
    route: "/login/cellphone",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/login/cellphone"),
    data: |q| {
        object(json!({
            "phone": arg_or(q, "phone", ""),
            "countrycode": arg_or(q, "countrycode", "86"),
            "password": password(q),
            "rememberLogin": "true",
        }))
    },
    options: PC_LOGIN,
};

/// Session status, scraped from the home page.
pub static LOGIN_STATUS: Provider = Provider {
    id: ProviderId::LoginStatus,
    route: "/login/status",
    method: HttpMethod::Get,
    url: |_| BASE_URL.to_owned(),
    data: |_| Query::new(),
    options: WEAPI,
};

pub static LOGOUT: Provider = Provider {
    id: ProviderId::Logout,
    route: "/logout",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/logout"),
    data: |_| Query::new(),
    options: ProviderOptions::new(Crypto::Weapi).user_agent(UserAgent::Pc),
};

/// Playlists related to a playlist, scraped from its page. Query: `id`.
pub static RELATED_PLAYLIST: Provider = Provider {
    id: ProviderId::RelatedPlaylist,
    route: "/related/playlist",
    method: HttpMethod::Get,
    url: |q| format!("{BASE_URL}/playlist?id={}", arg_or(q, "id", "")),
    data: |_| Query::new(),
    options: ProviderOptions::new(Crypto::Weapi).user_agent(UserAgent::Pc),
};

/// Query: `keywords`, optional `type` (1 track, 10 album, 100 artist,
/// 1000 playlist), `limit`, `offset`.
pub static SEARCH: Provider = Provider {
    id: ProviderId::Search,
    route: "/search",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/cloudsearch/get/web"),
    data: |q| {
        object(json!({
            "s": arg_or(q, "keywords", ""),
            "type": arg_or(q, "type", "1"),
            "limit": arg_or(q, "limit", "30"),
            "offset": arg_or(q, "offset", "0"),
        }))
    },
    options: WEAPI,
};

/// Query: `ids`, comma separated.
pub static SONG_DETAIL: Provider = Provider {
    id: ProviderId::SongDetail,
    route: "/song/detail",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/v3/song/detail"),
    data: |q| {
        let ids = id_list(q);
        let c = ids
            .iter()
            .map(|id| format!("{{\"id\":{id}}}"))
            .collect::<Vec<_>>()
            .join(",");
        object(json!({
            "c": format!("[{c}]"),
            "ids": format!("[{}]", ids.join(",")),
        }))
    },
    options: WEAPI,
};

/// Query: `id` (comma separated ids accepted), optional `br`.
pub static SONG_URL: Provider = Provider {
    id: ProviderId::SongUrl,
    route: "/song/url",
    method: HttpMethod::Post,
    url: |_| "https://interface3.music.163.com/eapi/song/enhance/player/url".to_owned(),
    data: |q| {
        object(json!({
            "ids": format!("[{}]", arg_or(q, "id", "")),
            "br": arg_or(q, "br", "999000"),
        }))
    },
    options: ProviderOptions::new(Crypto::Eapi)
        .cookies(&[("os", "pc")])
        .url("/api/song/enhance/player/url"),
};

/// Query: `id`.
pub static LYRIC: Provider = Provider {
    id: ProviderId::Lyric,
    route: "/lyric",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/api/song/lyric?lv=-1&kv=-1&tv=-1"),
    data: |q| object(json!({ "id": arg_or(q, "id", "") })),
    options: ProviderOptions::new(Crypto::Linuxapi),
};

/// Query: `id`, optional `s` (number of recent subscribers).
pub static PLAYLIST_DETAIL: Provider = Provider {
    id: ProviderId::PlaylistDetail,
    route: "/playlist/detail",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/v6/playlist/detail"),
    data: |q| {
        object(json!({
            "id": arg_or(q, "id", ""),
            "n": 100_000,
            "s": arg_or(q, "s", "8"),
        }))
    },
    options: WEAPI,
};

pub static USER_ACCOUNT: Provider = Provider {
    id: ProviderId::UserAccount,
    route: "/user/account",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/api/nuser/account/get"),
    data: |_| Query::new(),
    options: WEAPI,
};

/// Query: `uid`, optional `limit`, `offset`.
pub static USER_PLAYLIST: Provider = Provider {
    id: ProviderId::UserPlaylist,
    route: "/user/playlist",
    method: HttpMethod::Post,
    url: |_| format!("{BASE_URL}/weapi/user/playlist"),
    data: |q| {
        object(json!({
            "uid": arg_or(q, "uid", ""),
            "limit": arg_or(q, "limit", "30"),
            "offset": arg_or(q, "offset", "0"),
            "includeVideo": true,
        }))
    },
    options: WEAPI,
};

/// Every provider, in table order.
pub static ALL: &[&Provider] = &[
    &CHECK_MUSIC,
    &LOGIN,
    &LOGIN_CELLPHONE,
    &LOGIN_STATUS,
    &LOGOUT,
    &RELATED_PLAYLIST,
    &SEARCH,
    &SONG_DETAIL,
    &SONG_URL,
    &LYRIC,
    &PLAYLIST_DETAIL,
    &USER_ACCOUNT,
    &USER_PLAYLIST,
];

/// Look a provider up by route, e.g. `"/song/detail"`.
pub fn find(route: &str) -> Option<&'static Provider> {
    ALL.iter().copied().find(|p| p.route == route)
}

fn object(value: Value) -> Query {
    match value {
        Value::Object(map) => map,
        _ => Query::new(),
    }
}

fn password(q: &Query) -> String {
    arg(q, "md5_password").unwrap_or_else(|| md5_hex(arg_or(q, "password", "").as_bytes()))
}

fn id_list(q: &Query) -> Vec<String> {
    arg_or(q, "ids", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
