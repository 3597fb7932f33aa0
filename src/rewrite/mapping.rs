//! Bidirectional URL mapping between the proxy mount and the target.
//!
//! ```text
//! inbound   https://proxy.example/proxy/sub/a%20b?x=1
//!   → outbound http://backend:8080/api/sub/a%20b?x=1
//! backend Location: http://backend:8080/api/next?y=2
//!   → client Location: https://proxy.example/proxy/next?y=2
//! ```

use crate::rewrite::codec::{encode_query_or_fragment, EncodeMode};

/// Build the outbound request URL.
///
/// `path_info` is the decoded remainder of the inbound path below the
/// mount point; it is re-encoded with `%` escaped and always with the
/// strict character set, so a decoded `?`, `[` or `]` stays escaped.
/// `query` and `fragment` are raw, keep their existing escapes and use
/// `mode`.
pub fn build_target_url(
    base_uri: &str,
    path_info: Option<&str>,
    query: Option<&str>,
    fragment: Option<&str>,
    mode: EncodeMode,
) -> String {
    let mut url = String::with_capacity(base_uri.len() + 64);
    url.push_str(base_uri);

    if let Some(path) = path_info {
        url.push_str(&encode_query_or_fragment(path, true, EncodeMode::Template));
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&encode_query_or_fragment(query, false, mode));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(&encode_query_or_fragment(fragment, false, mode));
    }
    url
}

/// Map a backend URL (typically a redirect `Location`) back into the
/// client-visible address space.
///
/// URLs under `target_base` are re-rooted at `proxy_origin` + `mount_path`.
/// Anything else, including relative references and third-party hosts,
/// is returned unchanged.
pub fn map_backend_url(url: &str, target_base: &str, proxy_origin: &str, mount_path: &str) -> String {
    match url.strip_prefix(target_base) {
        Some(suffix) => format!("{}{}{}", proxy_origin, mount_path, suffix),
        None => url.to_string(),
    }
}

/// Split a raw query at the first `#` into query and fragment.
pub fn split_fragment(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (raw, None),
    }
}
