//! Typed cookie store with Set-Cookie parsing and JSON persistence.
//!
//! Parsing of individual `Set-Cookie` lines is delegated to the `cookie`
//! crate (RFC 6265 semantics, `Max-Age` overriding `Expires` is handled by
//! the crate itself); this module only owns the jar shape, the
//! comma-coalescing pre-split that real Set-Cookie headers sometimes need,
//! and the session-file JSON schema.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<SameSite>,
}

fn default_domain() -> String {
    ".x.com".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// A bare name/value cookie with default domain/path, as produced when
    /// constructing one programmatically (e.g. from a `cookieString` option).
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("cookie name must not be empty".into()));
        }
        Ok(Self {
            name,
            value: value.into(),
            domain: default_domain(),
            path: default_path(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|exp| exp < now).unwrap_or(false)
    }
}

/// Splits a concatenated Set-Cookie blob on commas, but only where the text
/// immediately following the comma looks like the start of a new
/// `name=value` pair (`^<token>=`). This preserves commas embedded in
/// `Expires=Thu, 01 Jan 2026 ...` attribute values.
///
/// A "token" here is any run of non-separator cookie-name characters
/// (letters, digits, and `!#$%&'*+-.^_`|~`), matching RFC 6265's `token`
/// grammar closely enough for the inputs this client observes.
pub fn split_coalesced_set_cookie(input: &str) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }

    fn is_token_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
    }

    let bytes: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == ',' {
            // Look ahead: skip whitespace, then require token chars followed by '='.
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] == ' ' {
                j += 1;
            }
            let token_start = j;
            while j < bytes.len() && is_token_char(bytes[j]) {
                j += 1;
            }
            if j > token_start && j < bytes.len() && bytes[j] == '=' {
                parts.push(bytes[start..i].iter().collect::<String>());
                start = i + 1;
            }
        }
        i += 1;
    }
    parts.push(bytes[start..].iter().collect::<String>());
    parts.into_iter().map(|s| s.trim().to_string()).collect()
}

fn same_site_from_crate(s: Option<cookie_crate::SameSite>) -> Option<SameSite> {
    s.map(|s| match s {
        cookie_crate::SameSite::Strict => SameSite::Strict,
        cookie_crate::SameSite::Lax => SameSite::Lax,
        cookie_crate::SameSite::None => SameSite::None,
    })
}

/// Parse a single `Set-Cookie` header value (one cookie, semicolon-delimited
/// attributes). Returns `None` for an empty input; parse failures of
/// individual lines are the caller's responsibility to log and skip.
pub fn parse_set_cookie_line(line: &str) -> Option<Cookie> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let parsed = cookie_crate::Cookie::parse(line.to_string()).ok()?;

    let expires = match parsed.expires() {
        Some(cookie_crate::Expiration::DateTime(offset)) => {
            Some(DateTime::<Utc>::from(std::time::SystemTime::from(offset)))
        }
        _ => None,
    };

    Some(Cookie {
        name: parsed.name().to_string(),
        value: parsed.value().to_string(),
        domain: parsed
            .domain()
            .map(|d| d.to_string())
            .unwrap_or_else(default_domain),
        path: parsed
            .path()
            .map(|p| p.to_string())
            .unwrap_or_else(default_path),
        expires,
        http_only: parsed.http_only().unwrap_or(false),
        secure: parsed.secure().unwrap_or(false),
        same_site: same_site_from_crate(parsed.same_site()),
    })
}

/// Parse every cookie out of a raw (possibly coalesced) Set-Cookie header
/// value. Individual malformed lines are skipped with a warning; other
/// cookies in the same header still apply.
pub fn parse_set_cookie(raw: &str) -> Vec<Cookie> {
    split_coalesced_set_cookie(raw)
        .into_iter()
        .filter_map(|line| {
            let parsed = parse_set_cookie_line(&line);
            if parsed.is_none() && !line.trim().is_empty() {
                warn!("cookie: failed to parse Set-Cookie line: {line:?}");
            }
            parsed
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JarDocument {
    cookies: HashMap<String, Cookie>,
    created: DateTime<Utc>,
    username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CookieJar {
    cookies: HashMap<String, Cookie>,
    created: DateTime<Utc>,
    username: Option<String>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    pub fn new() -> Self {
        Self {
            cookies: HashMap::new(),
            created: Utc::now(),
            username: None,
        }
    }

    pub fn set(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Cookie> {
        self.cookies.remove(name)
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn to_cookie_header(&self) -> String {
        self.cookies
            .values()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Apply every cookie found in a raw (possibly coalesced) Set-Cookie
    /// header value.
    pub fn apply_set_cookie(&mut self, raw: &str) {
        for cookie in parse_set_cookie(raw) {
            self.set(cookie);
        }
    }

    pub fn remove_expired(&mut self, now: DateTime<Utc>) {
        self.cookies.retain(|_, c| !c.is_expired(now));
    }

    pub fn is_authenticated(&self) -> bool {
        let auth_token = self.value("auth_token").unwrap_or("");
        let ct0 = self.value("ct0").unwrap_or("");
        !auth_token.is_empty() && !ct0.is_empty()
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.value("ct0").filter(|v| !v.is_empty())
    }

    /// Decode the viewer's user id from the `twid` cookie (`u%3D<id>`).
    pub fn viewer_id(&self) -> Option<String> {
        let raw = self.value("twid")?;
        let decoded = percent_encoding::percent_decode_str(raw)
            .decode_utf8()
            .ok()?;
        decoded.strip_prefix("u=").map(|s| s.to_string())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let doc = JarDocument {
            cookies: self.cookies.clone(),
            created: self.created,
            username: self.username.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::corrupted(format!("{}: {e}", path.display())))?;
        }
        std::fs::write(path, json).map_err(|e| Error::corrupted(format!("{}: {e}", path.display())))
    }

    /// Loads a jar from `path`. A missing file yields an empty jar (not an
    /// error); malformed JSON fails with `Error::Corrupted`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(e) => return Err(Error::corrupted(format!("{}: {e}", path.display()))),
        };
        let doc: JarDocument = serde_json::from_str(&contents)
            .map_err(|_| Error::corrupted(path.display().to_string()))?;
        Ok(Self {
            cookies: doc.cookies,
            created: doc.created,
            username: doc.username,
        })
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_by_name() {
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("a", "1").unwrap());
        jar.set(Cookie::new("a", "2").unwrap());
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.value("a"), Some("2"));
    }

    #[test]
    fn empty_cookie_string_is_empty_jar() {
        assert!(parse_set_cookie("").is_empty());
    }

    #[test]
    fn to_cookie_header_round_trips_names_and_values() {
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("ct0", "abc").unwrap());
        let header = jar.to_cookie_header();
        assert!(header.contains("ct0=abc"));

        let mut reparsed = CookieJar::new();
        for piece in header.split("; ") {
            let (name, value) = piece.split_once('=').unwrap();
            reparsed.set(Cookie::new(name, value).unwrap());
        }
        assert_eq!(reparsed.value("ct0"), jar.value("ct0"));
    }

    #[test]
    fn is_authenticated_requires_both_cookies() {
        let mut jar = CookieJar::new();
        assert!(!jar.is_authenticated());
        jar.set(Cookie::new("auth_token", "T").unwrap());
        assert!(!jar.is_authenticated());
        jar.set(Cookie::new("ct0", "C").unwrap());
        assert!(jar.is_authenticated());
    }

    #[test]
    fn max_age_overrides_expires() {
        let line = "a=1; Expires=Thu, 01 Jan 2026 00:00:00 GMT; Max-Age=60";
        let cookie = parse_set_cookie_line(line).expect("parses");
        // Max-Age=60 means ~60s from now, which will not equal the 2026 date.
        let expires = cookie.expires.expect("has expiry");
        let now = Utc::now();
        assert!(expires < now + chrono::Duration::seconds(120));
    }

    #[test]
    fn comma_in_expires_is_preserved() {
        let input = "a=1; Expires=Thu, 01 Jan 2026 00:00:00 GMT, b=2; Path=/";
        let parts = split_coalesced_set_cookie(input);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("a=1"));
        assert!(parts[0].contains("Thu, 01 Jan 2026"));
        assert!(parts[1].starts_with("b=2"));

        let cookies = parse_set_cookie(input);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1].path, "/");
        assert!(cookies[0].expires.is_some());
    }

    #[test]
    fn remove_expired_drops_stale_entries() {
        let mut jar = CookieJar::new();
        let mut stale = Cookie::new("old", "v").unwrap();
        stale.expires = Some(Utc::now() - chrono::Duration::days(1));
        jar.set(stale);
        jar.set(Cookie::new("fresh", "v").unwrap());
        jar.remove_expired(Utc::now());
        assert!(!jar.has("old"));
        assert!(jar.has("fresh"));
    }

    #[test]
    fn save_then_load_preserves_authenticated_status() {
        let dir = std::env::temp_dir().join(format!("xactions-core-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookies.json");

        let mut jar = CookieJar::new();
        jar.set(Cookie::new("auth_token", "T").unwrap());
        jar.set(Cookie::new("ct0", "C").unwrap());
        jar.save(&path).unwrap();

        let loaded = CookieJar::load(&path).unwrap();
        assert_eq!(loaded.is_authenticated(), jar.is_authenticated());
        assert_eq!(loaded.value("ct0"), jar.value("ct0"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_missing_file_is_empty_not_error() {
        let jar = CookieJar::load("/nonexistent/path/does-not-exist.json").unwrap();
        assert!(jar.is_empty());
    }

    #[test]
    fn load_malformed_json_is_corrupted() {
        let dir = std::env::temp_dir().join(format!("xactions-core-test-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookies.json");
        std::fs::write(&path, "not json").unwrap();

        let result = CookieJar::load(&path);
        assert!(matches!(result, Err(Error::Corrupted { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn viewer_id_decodes_twid() {
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("twid", "u%3D123456").unwrap());
        assert_eq!(jar.viewer_id(), Some("123456".to_string()));
    }
}
