//! Construction options and environment/file-based config resolution.
//!
//! All environment and filesystem reads happen once, here, at
//! construction time — components downstream receive an already-resolved
//! [`CookieJar`], never a raw env var name to look up themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cookie::{Cookie, CookieJar};
use crate::error::{Error, Result};

const SESSION_COOKIE_ENV: &str = "XACTIONS_SESSION_COOKIE";

/// Caller-supplied construction options. Precedence when resolving the
/// initial jar: explicit `cookies` > `cookie_string` > `file_path` >
/// `auth_token` > the env var > the default session file > an empty jar.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub cookies: Option<HashMap<String, String>>,
    pub cookie_string: Option<String>,
    pub file_path: Option<PathBuf>,
    pub auth_token: Option<String>,
}

impl SessionOptions {
    pub fn resolve(&self) -> Result<CookieJar> {
        if let Some(cookies) = &self.cookies {
            return cookies_from_map(cookies);
        }
        if let Some(raw) = &self.cookie_string {
            return Ok(jar_from_cookie_header(raw));
        }
        if let Some(path) = &self.file_path {
            return CookieJar::load(path);
        }
        if let Some(token) = &self.auth_token {
            return jar_from_auth_token(token);
        }
        if let Ok(token) = std::env::var(SESSION_COOKIE_ENV) {
            if !token.is_empty() {
                return jar_from_auth_token(&token);
            }
        }
        let default_path = default_session_path()?;
        if default_path.exists() {
            return CookieJar::load(&default_path);
        }
        Ok(CookieJar::new())
    }
}

fn cookies_from_map(cookies: &HashMap<String, String>) -> Result<CookieJar> {
    let mut jar = CookieJar::new();
    for (name, value) in cookies {
        jar.set(Cookie::new(name.clone(), value.clone())?);
    }
    Ok(jar)
}

fn jar_from_cookie_header(raw: &str) -> CookieJar {
    let mut jar = CookieJar::new();
    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        if let Some((name, value)) = pair.split_once('=') {
            if let Ok(cookie) = Cookie::new(name.trim(), value.trim()) {
                jar.set(cookie);
            }
        }
    }
    jar
}

fn jar_from_auth_token(token: &str) -> Result<CookieJar> {
    let mut jar = CookieJar::new();
    jar.set(Cookie::new("auth_token", token)?);
    Ok(jar)
}

/// `~/.xactions/cookies.json`, the default single-session file.
pub fn default_session_path() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".xactions").join("cookies.json"))
}

/// `~/.xactions/config.json`, the multi-session file.
pub fn default_multi_session_path() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".xactions").join("config.json"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::corrupted("could not resolve home directory"))
}

/// A named session entry inside the multi-session config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub cookies: HashMap<String, CookieRecord>,
    pub created: String,
    #[serde(rename = "lastUsed")]
    pub last_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
}

/// `~/.xactions/config.json`: a set of named sessions plus which one is
/// active. Distinct from the single-session cookie file — this is how a
/// caller manages several logged-in accounts side by side.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MultiSessionConfig {
    #[serde(default)]
    pub sessions: HashMap<String, SessionEntry>,
    #[serde(rename = "activeSession")]
    pub active_session: Option<String>,
}

impl MultiSessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::corrupted(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| Error::corrupted(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::corrupted(format!("creating {}: {e}", parent.display())))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| Error::corrupted(format!("writing {}: {e}", path.display())))
    }

    pub fn active(&self) -> Option<&SessionEntry> {
        self.active_session.as_ref().and_then(|name| self.sessions.get(name))
    }

    /// Resolves the active session entry directly into a usable jar,
    /// bypassing `CookieRecord`'s richer attribute fields (the jar only
    /// needs name/value for header composition; attributes here are for
    /// roundtripping the file, not for replaying full cookie semantics).
    pub fn active_jar(&self) -> Option<Result<CookieJar>> {
        self.active().map(|entry| {
            let mut jar = CookieJar::new();
            for (name, record) in &entry.cookies {
                jar.set(Cookie::new(name.clone(), record.value.clone())?);
            }
            Ok(jar)
        })
    }
}
