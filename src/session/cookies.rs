//! Mirrored session cookies.
//!
//! The value format matches what the provider's browser SDK writes
//! (`base64-` + base64url JSON, split into `.N` chunks when large), so pages
//! using the SDK and this service can read each other's cookies.

use crate::identity::IdentitySession;
use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use url::{Host, Url};

pub const DEFAULT_MAX_AGE_SECONDS: i64 = 7 * 24 * 60 * 60;
/// Largest value written into a single cookie before chunking.
pub const CHUNK_SIZE: usize = 3180;
pub const CLIENT_SUFFIX: &str = "-client";
const BASE64_PREFIX: &str = "base64-";
const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Clone, Debug)]
pub struct CookieBridge {
    name: String,
    domain: Option<String>,
    secure: bool,
    max_age_seconds: i64,
}

impl CookieBridge {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            secure: true,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain
            .map(|domain| domain.trim().to_string())
            .filter(|domain| !domain.is_empty());
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_max_age_seconds(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// `Set-Cookie` values writing `session` into both mirrors.
    ///
    /// `cookie_header` is the request's `Cookie` header; chunks it carries
    /// beyond the new chunk count are expired so they cannot be joined onto
    /// the new value.
    ///
    /// # Errors
    /// Returns an error if the session cannot be serialized.
    pub fn session_cookies(
        &self,
        cookie_header: Option<&str>,
        session: &IdentitySession,
    ) -> Result<Vec<HeaderValue>> {
        let chunks = self.chunks(&encode(session)?);
        let mut cookies = Vec::with_capacity(chunks.len() * 2 + 2);

        // A stale unchunked cookie would win over the chunks on the next read.
        if chunks.len() > 1 {
            cookies.push(self.expire(&self.name, true)?);
            cookies.push(self.expire(&client_name(&self.name), false)?);
        }

        let kept = if chunks.len() > 1 { chunks.len() } else { 0 };
        if let Some(header) = cookie_header {
            for (name, _) in parse_cookie_header(header) {
                if self.chunk_index(name).is_some_and(|index| index >= kept) {
                    cookies.push(self.expire(name, !name.ends_with(CLIENT_SUFFIX))?);
                }
            }
        }

        for (name, value) in &chunks {
            cookies.push(self.set(name, value, true)?);
            cookies.push(self.set(&client_name(name), value, false)?);
        }
        Ok(cookies)
    }

    /// Read the session from a `Cookie` header, preferring the `HttpOnly` mirror.
    #[must_use]
    pub fn read_session(&self, cookie_header: Option<&str>) -> Option<IdentitySession> {
        let pairs = parse_cookie_header(cookie_header?);
        self.read_family(&pairs, "")
            .or_else(|| self.read_family(&pairs, CLIENT_SUFFIX))
    }

    /// Expiring `Set-Cookie` values for every session cookie the browser sent,
    /// plus both base names.
    #[must_use]
    pub fn clear_cookies(&self, cookie_header: Option<&str>) -> Vec<HeaderValue> {
        let mut names = vec![self.name.clone(), client_name(&self.name)];
        if let Some(header) = cookie_header {
            for (name, _) in parse_cookie_header(header) {
                if self.owns(name) && !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
            }
        }

        names
            .iter()
            .filter_map(|name| self.expire(name, !name.ends_with(CLIENT_SUFFIX)).ok())
            .collect()
    }

    /// Rebuild a request `Cookie` header so it carries `session` instead of
    /// whatever session cookies it had.
    ///
    /// # Errors
    /// Returns an error if the session cannot be serialized.
    pub fn replace_in_cookie_header(
        &self,
        cookie_header: Option<&str>,
        session: &IdentitySession,
    ) -> Result<HeaderValue> {
        let mut pairs: Vec<String> = cookie_header
            .map(parse_cookie_header)
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, _)| !self.owns(name))
            .map(|(name, value)| format!("{name}={value}"))
            .collect();

        for (name, value) in self.chunks(&encode(session)?) {
            pairs.push(format!("{name}={value}"));
        }

        HeaderValue::from_str(&pairs.join("; ")).context("Failed to build Cookie header")
    }

    fn read_family(&self, pairs: &[(&str, &str)], suffix: &str) -> Option<IdentitySession> {
        let whole = format!("{}{suffix}", self.name);
        if let Some(session) = lookup(pairs, &whole).and_then(decode) {
            return Some(session);
        }

        let joined: String = (0..)
            .map_while(|index| lookup(pairs, &format!("{}.{index}{suffix}", self.name)))
            .collect();
        if joined.is_empty() {
            None
        } else {
            decode(&joined)
        }
    }

    /// Whether `name` is one of the session cookies (either mirror, any chunk).
    fn owns(&self, name: &str) -> bool {
        let base = name.strip_suffix(CLIENT_SUFFIX).unwrap_or(name);
        base == self.name || self.chunk_index(name).is_some()
    }

    /// Index of a `<name>.N` or `<name>.N-client` chunk cookie.
    fn chunk_index(&self, name: &str) -> Option<usize> {
        let name = name.strip_suffix(CLIENT_SUFFIX).unwrap_or(name);
        name.strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|index| index.parse().ok())
    }

    fn chunks(&self, value: &str) -> Vec<(String, String)> {
        if value.len() <= CHUNK_SIZE {
            return vec![(self.name.clone(), value.to_string())];
        }
        // Encoded values are ASCII, so byte boundaries are char boundaries.
        value
            .as_bytes()
            .chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(index, chunk)| {
                (
                    format!("{}.{index}", self.name),
                    String::from_utf8_lossy(chunk).into_owned(),
                )
            })
            .collect()
    }

    fn attributes(&self, http_only: bool) -> String {
        let mut attributes = String::from("; Path=/; SameSite=Lax");
        if http_only {
            attributes.push_str("; HttpOnly");
        }
        if self.secure {
            attributes.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            attributes.push_str("; Domain=");
            attributes.push_str(domain);
        }
        attributes
    }

    fn set(&self, name: &str, value: &str, http_only: bool) -> Result<HeaderValue> {
        let cookie = format!(
            "{name}={value}; Max-Age={}{}",
            self.max_age_seconds,
            self.attributes(http_only)
        );
        HeaderValue::from_str(&cookie).with_context(|| format!("Invalid cookie value for {name}"))
    }

    fn expire(&self, name: &str, http_only: bool) -> Result<HeaderValue> {
        let cookie = format!(
            "{name}=; Max-Age=0; Expires={EPOCH}{}",
            self.attributes(http_only)
        );
        HeaderValue::from_str(&cookie).with_context(|| format!("Invalid cookie name {name}"))
    }
}

/// All `Cookie` request headers joined into one (HTTP/2 clients may split them).
#[must_use]
pub fn request_cookie_header(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() { None } else { Some(joined) }
}

fn client_name(name: &str) -> String {
    format!("{name}{CLIENT_SUFFIX}")
}

fn encode(session: &IdentitySession) -> Result<String> {
    let json = serde_json::to_vec(session).context("Failed to serialize session")?;
    Ok(format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

fn decode(value: &str) -> Option<IdentitySession> {
    match value.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
            serde_json::from_slice(&bytes).ok()
        }
        None => serde_json::from_str(value).ok(),
    }
}

fn parse_cookie_header(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn lookup<'a>(pairs: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| *value)
}

/// `sb-<project-ref>-auth-token`, where the project ref is the first DNS label
/// of the provider host.
#[must_use]
pub fn cookie_name_for_identity_url(identity_url: &str) -> String {
    let project_ref = Url::parse(identity_url).ok().and_then(|url| {
        url.host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
    });
    match project_ref {
        Some(project_ref) => format!("sb-{project_ref}-auth-token"),
        None => "sb-auth-token".to_string(),
    }
}

/// Parent-domain cookie scope for the site, e.g. `https://www.example.com` →
/// `.example.com`. Local and IP hosts get host-only cookies.
#[must_use]
pub fn cookie_domain_for_site(site_url: &str) -> Option<String> {
    let url = Url::parse(site_url).ok()?;
    let Some(Host::Domain(host)) = url.host() else {
        return None;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return None;
    }
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if !host.contains('.') {
        return None;
    }
    Some(format!(".{host}"))
}
