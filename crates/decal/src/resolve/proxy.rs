//! Rewriting remote image URLs through the storefront's image proxy.

use url::Url;

use crate::config::ResolverConfig;

/// Returns `true` if `host` is `allowed` or one of its subdomains.
fn host_matches(host: &str, allowed: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let allowed = allowed.trim_end_matches('.').to_ascii_lowercase();
    host == allowed
        || host
            .strip_suffix(allowed.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Returns `true` if `url` points at a host the proxy must front.
pub fn is_proxied(url: &Url, config: &ResolverConfig) -> bool {
    url.host_str().is_some_and(|host| {
        config
            .proxied_hosts()
            .iter()
            .any(|allowed| host_matches(host, allowed))
    })
}

/// Rewrites `url` to `<origin><proxy_path>?url=<encoded url>` when its host
/// is on the proxy allow list. Other URLs yield `None` and are fetched as-is.
///
/// # Examples
///
/// ```
/// # use decal::config::ResolverConfig;
/// # use decal::resolve::proxy::proxied_url;
/// # use url::Url;
/// let config = ResolverConfig::default();
/// let origin = Url::parse("http://localhost:3000").unwrap();
/// let remote = Url::parse("https://storage.googleapis.com/bucket/a.png").unwrap();
///
/// let rewritten = proxied_url(&remote, &config, &origin).unwrap();
/// assert_eq!(
///     rewritten.as_str(),
///     "http://localhost:3000/api/image-proxy?url=https%3A%2F%2Fstorage.googleapis.com%2Fbucket%2Fa.png"
/// );
/// ```
pub fn proxied_url(url: &Url, config: &ResolverConfig, origin: &Url) -> Option<Url> {
    if !is_proxied(url, config) {
        return None;
    }

    let mut proxy = origin.join(config.proxy_path()).ok()?;
    proxy.set_query(None);
    proxy.query_pairs_mut().append_pair("url", url.as_str());
    Some(proxy)
}

/// Returns `true` if `url` shares scheme, host and port with `origin`.
pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

/// Returns `true` if an `Access-Control-Allow-Origin` value admits `origin`.
pub fn allows_origin(header: Option<&str>, origin: &Url) -> bool {
    header.is_some_and(|value| {
        let value = value.trim();
        value == "*" || value.trim_end_matches('/') == origin.origin().ascii_serialization()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    #[test]
    fn test_subdomains_are_proxied() {
        let config = ResolverConfig::default();
        let url = Url::parse("https://my-bucket.s3.amazonaws.com/logo.png").unwrap();
        assert!(is_proxied(&url, &config));
    }

    #[test]
    fn test_lookalike_hosts_are_not_proxied() {
        let config = ResolverConfig::default();
        let url = Url::parse("https://evils3.amazonaws.com.attacker.net/logo.png").unwrap();
        assert!(!is_proxied(&url, &config));
        let url = Url::parse("https://nots3.amazonaws.com/logo.png").unwrap();
        assert!(!is_proxied(&url, &config));
        assert!(proxied_url(&url, &config, &origin()).is_none());
    }

    #[test]
    fn test_rewrite_encodes_query() {
        let config = ResolverConfig::default();
        let url = Url::parse(
            "https://firebasestorage.googleapis.com/v0/b/x/o/a.png?alt=media&token=t",
        )
        .unwrap();
        let rewritten = proxied_url(&url, &config, &origin()).unwrap();

        assert_eq!(rewritten.path(), "/api/image-proxy");
        let pairs: Vec<(String, String)> = rewritten
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("url".to_string(), url.to_string())]);
    }

    #[test]
    fn test_origin_checks() {
        let origin = origin();
        assert!(is_same_origin(&Url::parse("http://localhost:3000/a.png").unwrap(), &origin));
        assert!(!is_same_origin(&Url::parse("https://localhost:3000/a.png").unwrap(), &origin));

        assert!(allows_origin(Some("*"), &origin));
        assert!(allows_origin(Some("http://localhost:3000"), &origin));
        assert!(!allows_origin(Some("https://shop.example"), &origin));
        assert!(!allows_origin(None, &origin));
    }
}
