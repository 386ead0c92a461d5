//! Extraction of structured data from `music.163.com` HTML.
//!
//! Two pieces of information are only available in server-rendered pages:
//!
//! - the login state, embedded in the home page as JavaScript assignments:
//!
//!   ```text
//!   var GUser={userId:32953014,nickname:"...",avatarUrl:"...",birthday:-2209017600000,userType:0,djStatus:0};
//!   var GBinds=[{"expiresIn":2147483647,"userId":32953014,"type":1}];
//!   ```
//!
//!   `GUser` is an object literal with bare keys, `GBinds` is valid JSON.
//!
//! - the "related playlists" side panel of a playlist page, a list of cards:
//!
//!   ```html
//!   <div class="cver u-cover u-cover-3">
//!     <a href="/playlist?id=..."><img src="http://p1.music.126.net/...jpg?param=50y50"></a>
//!   </div>
//!   <p class="f-thide"><a class="sname f-fs1 s-fc0" href="/playlist?id=2829883282">name</a></p>
//!   <p><span class="by s-fc4">by</span> <a class="nm nm f-thide s-fc3" href="/user/home?id=97526496">nickname</a></p>
//!   ```
//!
//! Both parsers work on text only and are pinned by the fixtures in
//! `tests/fixtures/`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::ScrapeError;

pub const GUSER_MARKER: &str = "GUser=";
pub const GBINDS_MARKER: &str = "GBinds=";

/// Bare keys of the `GUser` literal that get quoted before parsing.
pub const PROFILE_KEYS: [&str; 6] = [
    "userId",
    "nickname",
    "avatarUrl",
    "birthday",
    "userType",
    "djStatus",
];

const USER_LINK_PREFIX: &str = "/user/home?id=";
const PLAYLIST_LINK_PREFIX: &str = "/playlist?id=";
const COVER_SIZE_SUFFIX: &str = "?param=50y50";

// captures: 1 cover, 2 playlist link, 3 playlist name, 4 creator link, 5 nickname
static CARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"<div class="cver u-cover u-cover-3">[\s\S]*?<img src="([^"]+)">"#,
        r#"[\s\S]*?<a class="sname f-fs1 s-fc0" href="([^"]+)"[^>]*>([^<]+?)</a>"#,
        r#"[\s\S]*?<a class="nm nm f-thide s-fc3" href="([^"]+)"[^>]*>([^<]+?)</a>"#,
    ))
    .expect("card pattern is a valid regex")
});

/// Login state read from the home page.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginStatus {
    pub profile: Value,
    pub bindings: Value,
}

/// Extract `GUser` and `GBinds` from the home page.
///
/// Both markers must be present; their absence means the page was served
/// to an anonymous visitor.
pub fn extract_login_status(html: &str) -> Result<LoginStatus, ScrapeError> {
    let user = after_marker(html, GUSER_MARKER)?;
    let binds = after_marker(html, GBINDS_MARKER)?;

    let profile_text = take_through(user, "};", GUSER_MARKER)?;
    let profile = serde_json::from_str(&quote_known_keys(profile_text))?;

    let bindings_text = take_through(binds, "];", GBINDS_MARKER)?;
    let bindings = serde_json::from_str(bindings_text)?;

    Ok(LoginStatus { profile, bindings })
}

/// Quote the [`PROFILE_KEYS`] where they appear as bare object keys.
///
/// Only identifiers in key position (after `{` or `,`, followed by `:`) and
/// outside string literals are touched, so a nickname that happens to
/// contain `userId` survives intact.
pub fn quote_known_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2 * PROFILE_KEYS.len());
    let mut chars = text.char_indices().peekable();
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut key_position = false;

    while let Some((start, c)) = chars.next() {
        if let Some(quote) = in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                in_string = Some(c);
                key_position = false;
                out.push(c);
            }
            '{' | ',' => {
                key_position = true;
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            c if key_position && is_ident_start(c) => {
                let end = text[start..]
                    .find(|ch: char| !is_ident_char(ch))
                    .map_or(text.len(), |n| start + n);
                while chars.peek().is_some_and(|&(i, _)| i < end) {
                    chars.next();
                }
                let ident = &text[start..end];
                let is_key = text[end..].trim_start().starts_with(':');
                if is_key && PROFILE_KEYS.contains(&ident) {
                    out.push('"');
                    out.push_str(ident);
                    out.push('"');
                } else {
                    out.push_str(ident);
                }
                key_position = false;
            }
            _ => {
                key_position = false;
                out.push(c);
            }
        }
    }
    out
}

/// One card of the related-playlists panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPlaylist {
    pub creator: Creator,
    pub cover_img_url: String,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub user_id: String,
    pub nickname: String,
}

/// Extract every related-playlist card, in document order.
pub fn extract_related_playlists(html: &str) -> Vec<RelatedPlaylist> {
    CARD_PATTERN
        .captures_iter(html)
        .map(|caps| RelatedPlaylist {
            creator: Creator {
                user_id: strip_prefix(&caps[4], USER_LINK_PREFIX).to_owned(),
                nickname: caps[5].to_owned(),
            },
            cover_img_url: caps[1]
                .strip_suffix(COVER_SIZE_SUFFIX)
                .unwrap_or(&caps[1])
                .to_owned(),
            name: caps[3].to_owned(),
            id: strip_prefix(&caps[2], PLAYLIST_LINK_PREFIX).to_owned(),
        })
        .collect()
}

fn after_marker<'a>(html: &'a str, marker: &'static str) -> Result<&'a str, ScrapeError> {
    html.find(marker)
        .map(|i| &html[i + marker.len()..])
        .ok_or(ScrapeError::MissingMarker(marker))
}

/// Text up to the first `terminator`, keeping its closing bracket and
/// dropping the trailing `;`.
fn take_through<'a>(
    text: &'a str,
    terminator: &str,
    marker: &'static str,
) -> Result<&'a str, ScrapeError> {
    text.find(terminator)
        .map(|i| &text[..=i])
        .ok_or(ScrapeError::Unterminated(marker))
}

fn strip_prefix<'a>(text: &'a str, prefix: &str) -> &'a str {
    text.strip_prefix(prefix).unwrap_or(text)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
