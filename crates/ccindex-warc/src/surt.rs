//! Sort-friendly URL keys (SURT) and server host derivation

use url::{Host, Url};

/// Query parameters that only carry session state
const SESSION_PARAMS: &[&str] = &["jsessionid", "phpsessid", "sid", "cfid", "cftoken"];

/// Canonical keys derived from one captured URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlKey {
    /// Reversed-host sort key, e.g. `com,example)/path`
    pub surt: String,
    /// Lower-cased host with any explicit non-default port
    pub server: Option<String>,
}

impl UrlKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Url::parse(raw) {
            Ok(url) => Self {
                surt: surt_of(&url).unwrap_or_else(|| escape_verbatim(raw)),
                server: server_of(&url),
            },
            Err(e) => {
                log::debug!("unparsable URL {raw:?}: {e}");
                Self {
                    surt: escape_verbatim(&raw.to_lowercase()),
                    server: None,
                }
            }
        }
    }
}

/// SURT form of a URL string
pub fn surt(raw: &str) -> String {
    UrlKey::parse(raw).surt
}

/// Percent-encode spaces and ASCII controls in a key kept as written
fn escape_verbatim(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ' ' || c.is_ascii_control() {
            out.push_str(&format!("%{:02X}", c as u8));
        } else {
            out.push(c);
        }
    }
    out
}

fn server_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// `None` for URLs without a host (`dns:`, `mailto:`), which stay verbatim
fn surt_of(url: &Url) -> Option<String> {
    let host = match url.host()? {
        Host::Domain(domain) => reverse_domain(&domain.to_lowercase()),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => format!("[{addr}]"),
    };
    if host.is_empty() {
        return None;
    }

    let mut key = host;
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push(')');
    key.push_str(&canonical_path(url.path()));
    if let Some(query) = url.query().and_then(canonical_query) {
        key.push('?');
        key.push_str(&query);
    }
    Some(key)
}

fn reverse_domain(domain: &str) -> String {
    let domain = domain.trim_end_matches('.');
    let domain = strip_www(domain);
    domain.rsplit('.').collect::<Vec<_>>().join(",")
}

/// Drop a leading `www.`, `www1.`, ... label unless it is all that precedes the TLD
fn strip_www(domain: &str) -> &str {
    let Some((first, rest)) = domain.split_once('.') else {
        return domain;
    };
    let is_www = first
        .strip_prefix("www")
        .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit()));
    if is_www && rest.contains('.') {
        rest
    } else {
        domain
    }
}

fn canonical_path(path: &str) -> String {
    let mut path = path.to_lowercase();
    while let Some(start) = path.find(";jsessionid=") {
        let end = path[start + 1..]
            .find(['/', ';'])
            .map_or(path.len(), |i| start + 1 + i);
        path.replace_range(start..end, "");
    }
    if path.is_empty() {
        return "/".to_string();
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

fn canonical_query(query: &str) -> Option<String> {
    let query = query.to_lowercase();
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .filter(|p| {
            let name = p.split('=').next().unwrap_or_default();
            !(SESSION_PARAMS.contains(&name) || name.starts_with("aspsessionid"))
        })
        .collect();
    if params.is_empty() {
        return None;
    }
    params.sort_unstable();
    Some(params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_reversed_and_lowercased() {
        assert_eq!(surt("http://Example.COM/Path"), "com,example)/path");
        assert_eq!(surt("https://news.bbc.co.uk/"), "uk,co,bbc,news)/");
    }

    #[test]
    fn scheme_userinfo_fragment_dropped() {
        assert_eq!(
            surt("https://user:pw@example.com/a/b/#frag"),
            "com,example)/a/b"
        );
    }

    #[test]
    fn www_prefix_removed() {
        assert_eq!(surt("http://www.example.com"), "com,example)/");
        assert_eq!(surt("http://www2.example.com/x"), "com,example)/x");
        assert_eq!(surt("http://www.com/"), "com,www)/");
        assert_eq!(surt("http://wwwx.example.com/"), "com,example,wwwx)/");
    }

    #[test]
    fn ports() {
        assert_eq!(surt("http://example.com:80/"), "com,example)/");
        assert_eq!(surt("http://example.com:8080/"), "com,example:8080)/");
    }

    #[test]
    fn query_sorted_and_cleaned() {
        assert_eq!(
            surt("http://example.com/s?B=2&a=1&&PHPSESSID=abc"),
            "com,example)/s?a=1&b=2"
        );
        assert_eq!(surt("http://example.com/s?"), "com,example)/s");
    }

    #[test]
    fn jsessionid_path_segment_removed() {
        assert_eq!(
            surt("http://example.com/app;jsessionid=ABC123/page"),
            "com,example)/app/page"
        );
    }

    #[test]
    fn ip_hosts_kept() {
        assert_eq!(surt("http://192.168.1.1/x"), "192.168.1.1)/x");
    }

    #[test]
    fn non_hierarchical_kept_verbatim() {
        assert_eq!(surt("dns:example.com"), "dns:example.com");
        assert_eq!(surt("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn unparsable_falls_back() {
        assert_eq!(surt("Not A URL"), "not%20a%20url");
    }

    #[test]
    fn verbatim_keys_escape_controls() {
        assert_eq!(surt("Not\tA\nURL"), "not%09a%0Aurl");
        assert_eq!(surt("dns:exa mple.com\r"), "dns:exa%20mple.com");
        assert!(!surt("mailto:a\tb@example.com").contains(char::is_whitespace));
    }

    #[test]
    fn server_keeps_explicit_port() {
        assert_eq!(
            UrlKey::parse("http://Example.COM/Path").server.as_deref(),
            Some("example.com")
        );
        assert_eq!(
            UrlKey::parse("https://example.com:8443/").server.as_deref(),
            Some("example.com:8443")
        );
        assert_eq!(UrlKey::parse("dns:example.com").server, None);
    }
}
