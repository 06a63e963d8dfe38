use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cookie as the server set it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: String,
    pub secure: bool,
    pub http_only: bool,
}

impl StoredCookie {
    /// Parse a `Set-Cookie` header value. Returns `None` without a `name=`.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = StoredCookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            ..Default::default()
        };
        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = val.trim_start_matches('.').to_string(),
                "path" => cookie.path = val.to_string(),
                "expires" => cookie.expires = val.to_string(),
                "max-age" if val.parse::<i64>().is_ok_and(|age| age <= 0) => {
                    cookie.value.clear();
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }
        Some(cookie)
    }

    /// Rebuild a `Set-Cookie` line for re-seeding a jar.
    pub fn to_set_cookie(&self) -> String {
        let mut line = format!("{}={}", self.name, self.value);
        if !self.domain.is_empty() {
            line.push_str("; Domain=");
            line.push_str(&self.domain);
        }
        line.push_str("; Path=");
        line.push_str(if self.path.is_empty() { "/" } else { &self.path });
        if !self.expires.is_empty() {
            line.push_str("; Expires=");
            line.push_str(&self.expires);
        }
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        line
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Cookies grouped by the origin (`scheme://host/`) that set them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieMap(BTreeMap<String, Vec<StoredCookie>>);

impl CookieMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_empty())
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn get(&self, origin: &str) -> Option<&[StoredCookie]> {
        self.0.get(origin).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[StoredCookie])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Record `cookie` under `origin`, replacing the same name/domain/path.
    /// An emptied value removes it.
    pub fn insert(&mut self, origin: impl Into<String>, cookie: StoredCookie) {
        let list = self.0.entry(origin.into()).or_default();
        list.retain(|c| !c.same_slot(&cookie));
        if !cookie.value.is_empty() {
            list.push(cookie);
        }
    }

    /// First non-empty value named `name` across all origins.
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.0
            .values()
            .flatten()
            .find(|c| c.name == name && !c.value.is_empty())
            .map(|c| c.value.as_str())
    }
}

/// `scheme://host/` of a URL.
pub fn origin_of(url: &Url) -> String {
    format!("{}://{}/", url.scheme(), url.host_str().unwrap_or_default())
}

/// Cookie store that delegates to [`Jar`] and keeps a copy of every
/// `Set-Cookie` by origin so the session can be dumped.
#[derive(Debug, Default)]
pub struct RecordingJar {
    inner: Jar,
    recorded: RwLock<CookieMap>,
}

impl RecordingJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CookieMap {
        self.recorded.read().clone()
    }

    /// Seed the jar with a dumped map, one origin at a time.
    pub fn load(&self, cookies: &CookieMap) -> crate::Result<()> {
        for (origin, list) in cookies.iter() {
            let url = Url::parse(origin)
                .map_err(|e| crate::Error::Decode(format!("bad cookie origin {}: {}", origin, e)))?;
            let mut recorded = self.recorded.write();
            for cookie in list {
                self.inner.add_cookie_str(&cookie.to_set_cookie(), &url);
                recorded.insert(origin, cookie.clone());
            }
        }
        Ok(())
    }
}

impl CookieStore for RecordingJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<&HeaderValue> = cookie_headers.collect();
        let origin = origin_of(url);
        {
            let mut recorded = self.recorded.write();
            for header in &headers {
                if let Some(cookie) = header.to_str().ok().and_then(StoredCookie::parse) {
                    tracing::trace!(origin = %origin, name = %cookie.name, "cookie set");
                    recorded.insert(origin.clone(), cookie);
                }
            }
        }
        self.inner.set_cookies(&mut headers.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_cookie_attributes() {
        let cookie = StoredCookie::parse(
            "webwx_data_ticket=gSd2; Domain=.qq.com; Path=/; Expires=Mon, 02-Jan-2034 00:00:00 GMT; Secure; HttpOnly",
        )
        .unwrap();
        assert_eq!(cookie.name, "webwx_data_ticket");
        assert_eq!(cookie.value, "gSd2");
        assert_eq!(cookie.domain, "qq.com");
        assert_eq!(cookie.path, "/");
        assert!(cookie.secure && cookie.http_only);
        assert!(StoredCookie::parse("garbage").is_none());
    }

    #[test]
    fn map_replaces_and_removes() {
        let mut map = CookieMap::new();
        map.insert("https://wx.qq.com/", StoredCookie::parse("a=1; Path=/").unwrap());
        map.insert("https://wx.qq.com/", StoredCookie::parse("a=2; Path=/").unwrap());
        assert_eq!(map.get("https://wx.qq.com/").unwrap().len(), 1);
        assert_eq!(map.cookie_value("a"), Some("2"));
        map.insert("https://wx.qq.com/", StoredCookie::parse("a=x; Path=/; Max-Age=0").unwrap());
        assert!(map.cookie_value("a").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn jar_records_by_origin_and_serves_cookies() {
        let jar = RecordingJar::new();
        let url = Url::parse("https://wx2.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage").unwrap();
        let headers = [
            HeaderValue::from_static("wxuin=123; Domain=wx2.qq.com; Path=/"),
            HeaderValue::from_static("wxsid=SID; Domain=wx2.qq.com; Path=/"),
        ];
        jar.set_cookies(&mut headers.iter(), &url);
        let snapshot = jar.snapshot();
        assert_eq!(snapshot.origins().collect::<Vec<_>>(), vec!["https://wx2.qq.com/"]);
        assert_eq!(snapshot.cookie_value("wxsid"), Some("SID"));
        let header = jar.cookies(&url).unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("wxuin=123"));
        assert!(header.contains("wxsid=SID"));
    }

    #[test]
    fn load_reseeds_jar() {
        let mut map = CookieMap::new();
        map.insert(
            "https://wx.qq.com/",
            StoredCookie::parse("webwx_auth_ticket=T; Domain=wx.qq.com; Path=/").unwrap(),
        );
        let jar = RecordingJar::new();
        jar.load(&map).unwrap();
        let url = Url::parse("https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxinit").unwrap();
        assert!(jar.cookies(&url).is_some());
        assert_eq!(jar.snapshot(), map);

        let json = serde_json::to_string(&map).unwrap();
        let back: CookieMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
