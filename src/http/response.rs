//! Backend response translation.
//!
//! # Responsibilities
//! - Copy backend headers minus hop-by-hop ones
//! - Map redirect `Location` back under the proxy mount
//! - Namespace and rescope `Set-Cookie`/`Set-Cookie2`
//! - Force an empty body for `304 Not Modified`
//!
//! # Design Decisions
//! - A redirect status without `Location` is an error, not an empty redirect
//! - Status code and reason phrase are relayed as received

use axum::http::StatusCode;

use crate::error::{ProxyError, Result};
use crate::http::cookies::parse_set_cookie;
use crate::http::headers::{self, is_hop_by_hop, HeaderList};
use crate::http::policy::{ExchangeContext, Policies};

/// Status line and headers to send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponseHead {
    pub status: StatusCode,
    /// Non-standard reason phrase from the backend, if any.
    pub reason: Option<String>,
    pub headers: HeaderList,
    /// Whether the body must be suppressed.
    pub bodiless: bool,
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Translate a backend status line and headers for the client.
pub fn translate_head(
    ctx: &ExchangeContext<'_>,
    policies: &Policies,
    status: StatusCode,
    reason: Option<String>,
    backend_headers: &HeaderList,
) -> Result<ClientResponseHead> {
    if !ctx.forwarding.handle_redirects
        && is_redirect(status)
        && !backend_headers.contains(headers::LOCATION)
    {
        return Err(ProxyError::MissingLocation {
            status: status.as_u16(),
        });
    }

    let mut out = HeaderList::new();
    for (name, value) in backend_headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }

        if name.eq_ignore_ascii_case(headers::SET_COOKIE)
            || name.eq_ignore_ascii_case(headers::SET_COOKIE2)
        {
            // Rewritten cookies always go out as Set-Cookie.
            for cookie in parse_set_cookie(name, value) {
                let client_cookie = policies.cookies.client_cookie(ctx, &cookie);
                out.append(headers::SET_COOKIE, client_cookie.to_header_value());
            }
        } else if name.eq_ignore_ascii_case(headers::LOCATION) {
            out.append(headers::LOCATION, policies.urls.backend_url(ctx, value));
        } else if let Some(value) = policies.headers.response_header(ctx, name, value) {
            out.append(name, value);
        }
    }

    let bodiless = status == StatusCode::NOT_MODIFIED || ctx.head.method == axum::http::Method::HEAD;
    if status == StatusCode::NOT_MODIFIED {
        out.set(headers::CONTENT_LENGTH, "0");
    }

    Ok(ClientResponseHead {
        status,
        reason,
        headers: out,
        bodiless,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForwardingConfig, TargetConfig, TargetMode};
    use crate::http::request::RequestHead;
    use crate::routing::{ResolvedTarget, TargetResolver};

    fn target() -> ResolvedTarget {
        TargetResolver::from_config(&TargetConfig {
            uri: "http://backend:8080/api".to_string(),
            mode: TargetMode::Static,
        })
        .unwrap()
        .resolve(None)
        .unwrap()
    }

    fn translate(
        status: u16,
        backend: &[(&str, &str)],
        forwarding: &ForwardingConfig,
    ) -> Result<ClientResponseHead> {
        let head = RequestHead::for_test("GET", "/proxy/x", None, "/proxy");
        let target = target();
        let ctx = ExchangeContext {
            head: &head,
            target: &target,
            forwarding,
            cookie_prefix: "!Proxy!svc",
        };
        let backend_headers: HeaderList = backend
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        translate_head(
            &ctx,
            &Policies::default(),
            StatusCode::from_u16(status).unwrap(),
            None,
            &backend_headers,
        )
    }

    #[test]
    fn test_hop_by_hop_removed() {
        let head = translate(
            200,
            &[
                ("Transfer-Encoding", "chunked"),
                ("connection", "close"),
                ("Content-Type", "text/plain"),
            ],
            &ForwardingConfig::default(),
        )
        .unwrap();
        assert_eq!(head.headers.len(), 1);
        assert_eq!(head.headers.get("content-type"), Some("text/plain"));
        assert!(!head.bodiless);
    }

    #[test]
    fn test_location_rewritten() {
        let head = translate(
            302,
            &[("Location", "http://backend:8080/api/sub?a=b#c")],
            &ForwardingConfig::default(),
        )
        .unwrap();
        assert_eq!(
            head.headers.get("Location"),
            Some("http://proxy.example/proxy/sub?a=b#c")
        );

        let head = translate(
            302,
            &[("Location", "http://otherhost/x")],
            &ForwardingConfig::default(),
        )
        .unwrap();
        assert_eq!(head.headers.get("Location"), Some("http://otherhost/x"));
    }

    #[test]
    fn test_redirect_without_location() {
        let err = translate(302, &[], &ForwardingConfig::default()).unwrap_err();
        assert!(matches!(err, ProxyError::MissingLocation { status: 302 }));

        // 304 is not a redirect
        assert!(translate(304, &[], &ForwardingConfig::default()).is_ok());
    }

    #[test]
    fn test_not_modified_forces_zero_length() {
        let head = translate(
            304,
            &[("ETag", "\"v1\""), ("Content-Length", "120")],
            &ForwardingConfig::default(),
        )
        .unwrap();
        assert!(head.bodiless);
        assert_eq!(head.headers.get("Content-Length"), Some("0"));
        assert_eq!(head.headers.get_all("content-length").count(), 1);
        assert_eq!(head.headers.get("ETag"), Some("\"v1\""));
    }

    #[test]
    fn test_set_cookie_translated() {
        let head = translate(
            200,
            &[
                ("Set-Cookie", "name=value; Path=/x; Domain=backend"),
                ("set-cookie", "other=1"),
            ],
            &ForwardingConfig::default(),
        )
        .unwrap();
        let cookies: Vec<_> = head.headers.get_all("Set-Cookie").collect();
        assert_eq!(
            cookies,
            vec![
                "!Proxy!svcname=value; Path=/proxy",
                "!Proxy!svcother=1; Path=/proxy"
            ]
        );
    }
}
