//! Session cookie handling for the feed API.
//!
//! The feed needs a signed-in browser session. Cookies are exported from
//! the browser as a JSON array of `{name, value, domain, path}` objects
//! and loaded into the HTTP client's jar here.

use std::fs;
use std::path::Path;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie file not found at {0}; export session cookies first")]
    Missing(String),

    #[error("cookie file is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("cookie entry is missing required fields (name, value, domain)")]
    MissingFields,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One browser-exported cookie. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

fn read_cookies(path: &Path) -> Result<Vec<BrowserCookie>, CookieError> {
    if !path.exists() {
        return Err(CookieError::Missing(path.display().to_string()));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Load the cookie file into a reqwest jar.
pub fn load_cookie_jar(path: &Path) -> Result<Jar, CookieError> {
    let cookies = read_cookies(path)?;

    let jar = Jar::default();
    for cookie in &cookies {
        if let Some(origin) = cookie_origin(&cookie.domain) {
            jar.add_cookie_str(
                &format!(
                    "{}={}; Domain={}; Path={}",
                    cookie.name, cookie.value, cookie.domain, cookie.path
                ),
                &origin,
            );
        }
    }
    Ok(jar)
}

/// URL a cookie's domain attribute applies to.
fn cookie_origin(domain: &str) -> Option<Url> {
    format!("https://{}/", domain.trim_start_matches('.'))
        .parse()
        .ok()
}

/// Count the cookies in the file, verifying it parses.
pub fn cookie_count(path: &Path) -> Result<usize, CookieError> {
    Ok(read_cookies(path)?.len())
}

/// Validate and write a replacement cookie export.
pub fn save_cookies(path: &Path, cookies: &[serde_json::Value]) -> Result<usize, CookieError> {
    let valid = cookies.iter().all(|entry| {
        ["name", "value", "domain"]
            .iter()
            .all(|field| entry.get(*field).map(Value::is_string).unwrap_or(false))
    });
    if cookies.is_empty() || !valid {
        return Err(CookieError::MissingFields);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(cookies)?)?;
    Ok(cookies.len())
}
