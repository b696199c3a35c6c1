use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::tracker::error::TrackerError;
use crate::tracker::storage::StorageBackend;

// Everything a cookie-octet may not contain (RFC 6265), worth the encode.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes applied to every cookie this store sets. `SameSite=Lax` keeps
/// the cookie on top-level navigations from a partner referral; the domain
/// is widened to the registrable domain so subdomain hops keep it too.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub domain: Option<String>,
    pub max_age_secs: i64,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieAttributes {
    pub fn first_party(host: &str, max_age_secs: i64) -> Self {
        Self {
            domain: Some(registrable_domain(host)),
            max_age_secs,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Registrable domain of a host, approximated as its last two labels.
/// IP literals, `localhost` and bare hosts are used as-is.
pub fn registrable_domain(host: &str) -> String {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

#[derive(Debug, Clone)]
struct Cookie {
    value: String,
    attributes: CookieAttributes,
    expires_at: i64,
}

/// An in-process first-party cookie jar. The embedding host owns the jar
/// and syncs it with its HTTP layer: `format_set_cookie` renders the header
/// to send, `ingest` accepts a value read back from a Cookie header.
#[derive(Default)]
pub struct CookieJar {
    cookies: HashMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str, attributes: CookieAttributes) {
        let expires_at =
            chrono::Utc::now().timestamp_millis() + attributes.max_age_secs * 1000;
        self.cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                attributes,
                expires_at,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let cookie = self.cookies.get(name)?;
        if chrono::Utc::now().timestamp_millis() > cookie.expires_at {
            return None;
        }
        Some(&cookie.value)
    }

    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    /// Seed a cookie received from the transport layer. No attributes are
    /// carried on the wire, so it inherits whatever the caller supplies.
    pub fn ingest(&mut self, name: &str, raw_value: &str, attributes: CookieAttributes) {
        let value = percent_decode_str(raw_value)
            .decode_utf8()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw_value.to_string());
        self.set(name, &value, attributes);
    }

    /// Render the `Set-Cookie` header line for one cookie.
    pub fn format_set_cookie(&self, name: &str) -> Option<String> {
        let cookie = self.cookies.get(name)?;
        let mut header = format!(
            "{}={}; Max-Age={}; Path=/",
            name,
            utf8_percent_encode(&cookie.value, COOKIE_VALUE),
            cookie.attributes.max_age_secs
        );
        if let Some(domain) = &cookie.attributes.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        if cookie.attributes.secure {
            header.push_str("; Secure");
        }
        header.push_str("; SameSite=");
        header.push_str(cookie.attributes.same_site.as_str());
        Some(header)
    }
}

/// Cookie-tier storage backend over a shared jar.
pub struct CookieStore {
    jar: Arc<Mutex<CookieJar>>,
    attributes: CookieAttributes,
}

impl CookieStore {
    pub fn new(jar: Arc<Mutex<CookieJar>>, attributes: CookieAttributes) -> Self {
        Self { jar, attributes }
    }
}

impl StorageBackend for CookieStore {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn write(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let mut jar = self
            .jar
            .lock()
            .map_err(|_| TrackerError::unavailable("cookie", "poisoned lock"))?;
        jar.set(key, value, self.attributes.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let jar = self
            .jar
            .lock()
            .map_err(|_| TrackerError::unavailable("cookie", "poisoned lock"))?;
        Ok(jar.get(key).map(String::from))
    }

    fn clear(&self, key: &str) -> Result<(), TrackerError> {
        let mut jar = self
            .jar
            .lock()
            .map_err(|_| TrackerError::unavailable("cookie", "poisoned lock"))?;
        jar.remove(key);
        Ok(())
    }
}
