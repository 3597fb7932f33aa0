//! Cookie namespace translation.
//!
//! Backend cookies are handed to the client under a per-deployment prefix
//! and scoped to the proxy's mount path. When the client sends them back,
//! only prefixed cookies reach the backend, with the prefix stripped.
//!
//! ```text
//! backend  Set-Cookie: sid=42; Path=/app; Domain=internal
//!   → client Set-Cookie: !Proxy!svcsid=42; Path=/proxy
//! client   Cookie: !Proxy!svcsid=42; theme=dark
//!   → backend Cookie: sid=42
//! ```

/// One cookie parsed from a `Set-Cookie` or `Set-Cookie2` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieView {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    /// Parsed but never forwarded to the client.
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub expires: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub version: Option<u32>,
    pub comment: Option<String>,
    pub same_site: Option<String>,
}

impl CookieView {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(version) = self.version {
            out.push_str(&format!("; Version={}", version));
        }
        if let Some(comment) = &self.comment {
            out.push_str(&format!("; Comment={}", comment));
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(expires) = &self.expires {
            out.push_str(&format!("; Expires={}", expires));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={}", path));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = &self.same_site {
            out.push_str(&format!("; SameSite={}", same_site));
        }
        out
    }
}

/// Parse a `Set-Cookie`/`Set-Cookie2` header value into cookies.
///
/// A value carrying `Expires=` is a single Netscape-style cookie, since the
/// date itself contains a comma. `Set-Cookie2` values and values carrying
/// `Version=` may list several cookies separated by commas.
pub fn parse_set_cookie(header_name: &str, value: &str) -> Vec<CookieView> {
    let lower = value.to_ascii_lowercase();
    let multi = !lower.contains("expires=")
        && (header_name.eq_ignore_ascii_case("set-cookie2") || lower.contains("version="));

    let parts = if multi {
        split_outside_quotes(value, ',')
    } else {
        vec![value]
    };

    parts.into_iter().filter_map(parse_one).collect()
}

fn parse_one(raw: &str) -> Option<CookieView> {
    let mut attrs = split_outside_quotes(raw, ';').into_iter();
    let (name, value) = attrs.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = CookieView {
        name: name.to_string(),
        value: value.trim().to_string(),
        ..CookieView::default()
    };

    for attr in attrs {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attr.trim(), None),
        };
        match (key.to_ascii_lowercase().as_str(), val) {
            ("path", Some(v)) => cookie.path = Some(v.to_string()),
            ("domain", Some(v)) => cookie.domain = Some(v.to_string()),
            ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
            ("expires", Some(v)) => cookie.expires = Some(v.to_string()),
            ("version", Some(v)) => cookie.version = v.trim_matches('"').parse().ok(),
            ("comment", Some(v)) => cookie.comment = Some(v.to_string()),
            ("samesite", Some(v)) => cookie.same_site = Some(v.to_string()),
            ("secure", _) => cookie.secure = true,
            ("httponly", _) => cookie.http_only = true,
            _ => {}
        }
    }

    Some(cookie)
}

fn split_outside_quotes(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (idx, c) in input.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&input[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts.retain(|p| !p.trim().is_empty());
    parts
}

/// Settings and per-request facts needed to rewrite a backend cookie.
#[derive(Debug, Clone, Copy)]
pub struct ClientCookieScope<'a> {
    /// Prefix prepended to cookie names, e.g. `!Proxy!svc`.
    pub prefix: &'a str,
    /// Proxy mount path; `/` is used when empty.
    pub mount_path: &'a str,
    pub preserve_cookies: bool,
    pub preserve_cookie_path: bool,
    /// Whether the inbound request arrived over a secure channel.
    pub request_secure: bool,
}

/// Rewrite a backend cookie for the client.
pub fn to_client_cookie(cookie: &CookieView, scope: &ClientCookieScope<'_>) -> CookieView {
    let name = if scope.preserve_cookies {
        cookie.name.clone()
    } else {
        format!("{}{}", scope.prefix, cookie.name)
    };

    let path = if scope.preserve_cookie_path {
        cookie.path.clone()
    } else if scope.mount_path.is_empty() {
        Some("/".to_string())
    } else {
        Some(scope.mount_path.to_string())
    };

    CookieView {
        name,
        path,
        domain: None,
        secure: cookie.secure && scope.request_secure,
        ..cookie.clone()
    }
}

/// Rebuild a client `Cookie` header for the backend.
///
/// Only `name=value` pairs whose name carries `prefix` survive, with the
/// prefix removed. Returns `None` when nothing is left.
pub fn to_backend_cookie_header(value: &str, prefix: &str) -> Option<String> {
    let kept: Vec<String> = value
        .split([';', ','])
        .filter_map(|pair| {
            let (name, val) = pair.split_once('=')?;
            let stripped = name.trim().strip_prefix(prefix)?;
            Some(format!("{}={}", stripped, val.trim()))
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}
