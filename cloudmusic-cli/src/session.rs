//! Cookie file persisted between CLI runs.
//!
//! Stored at `<config_dir>/cloudmusic/cookies.json` as a JSON array:
//!
//! ```json
//! [
//!   { "name": "MUSIC_U", "value": "00AABBCC...", "domain": ".music.163.com", "path": "/" },
//!   { "name": "__csrf", "value": "6f1e..." }
//! ]
//! ```
//!
//! The library keeps cookies in memory only; this file is how the CLI
//! carries a login from one invocation to the next.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cloudmusic_api::CookieStore;
use tracing::debug;

/// Load the cookie file. A missing file is an empty store.
pub fn load() -> Result<CookieStore> {
    let path = path()?;
    if !path.exists() {
        return Ok(CookieStore::new());
    }
    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cookies: CookieStore = serde_json::from_str(&data)
        .with_context(|| format!("invalid cookie file {}", path.display()))?;
    debug!(path = %path.display(), count = cookies.len(), "loaded saved cookies");
    Ok(cookies)
}

/// Save the cookie file, creating parent directories if needed.
pub fn save(cookies: &CookieStore) -> Result<PathBuf> {
    let path = path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(cookies)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Delete the cookie file.
pub fn clear() -> Result<()> {
    let path = path()?;
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn path() -> Result<PathBuf> {
    let config = dirs::config_dir().context("cannot determine config directory")?;
    Ok(config.join("cloudmusic").join("cookies.json"))
}
