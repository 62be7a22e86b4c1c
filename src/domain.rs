/// Domain extraction for tab sorting
///
/// All extractors share one pipeline: parse the URL, take the hostname and
/// strip a single leading "www." label. Anything that does not parse as an
/// absolute URL yields empty output instead of an error, so a broken URL only
/// pushes its tab towards the end of a sorted group.
use url::Url;

pub const MIN_DOMAIN_LEVEL: usize = 2;
pub const MAX_DOMAIN_LEVEL: usize = 10;
pub const DEFAULT_DOMAIN_LEVEL: usize = 4;

/// Hostname without a leading "www.", e.g. `https://www.google.com/x` → `google.com`
pub fn domain(url: &str) -> String {
    extract_hostname(url).unwrap_or_default()
}

/// Last two labels of the hostname
///
/// Examples:
/// - http://a.p-pp.cn → p-pp.cn
/// - http://b.c.p-pp.cn → p-pp.cn
/// - http://localhost → localhost
pub fn second_level_domain(url: &str) -> String {
    let Some(hostname) = extract_hostname(url) else {
        return String::new();
    };

    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() < 2 {
        return hostname;
    }

    parts[parts.len() - 2..].join(".")
}

/// Domain hierarchy from the top-level label down, padded to `max_level`
///
/// Level 1 is the TLD label, level 2 the second-level domain, and so on:
/// `http://a.b.example.com` at 4 levels gives
/// `["com", "example.com", "b.example.com", "a.b.example.com"]`.
pub fn domain_levels(url: &str, max_level: usize) -> Vec<String> {
    let mut levels = Vec::with_capacity(max_level);

    if let Some(hostname) = extract_hostname(url) {
        let parts: Vec<&str> = hostname.split('.').collect();
        for k in 1..=max_level.min(parts.len()) {
            levels.push(parts[parts.len() - k..].join("."));
        }
    }

    levels.resize(max_level, String::new());
    levels
}

/// Clamp a configured hierarchy depth into the supported range
pub fn clamp_max_level(level: usize) -> usize {
    level.clamp(MIN_DOMAIN_LEVEL, MAX_DOMAIN_LEVEL)
}

/// Extract the hostname, minus a leading "www.", from an absolute URL
fn extract_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let hostname = parsed.host_str()?;

    Some(hostname.strip_prefix("www.").unwrap_or(hostname).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_basic() {
        assert_eq!(domain("https://www.google.com"), "google.com");
        assert_eq!(domain("https://google.com/search?q=rust"), "google.com");
        assert_eq!(domain("http://docs.microsoft.com"), "docs.microsoft.com");
    }

    #[test]
    fn test_domain_only_strips_leading_www() {
        assert_eq!(domain("https://www.www.example.com"), "www.example.com");
        assert_eq!(domain("https://wwwexample.com"), "wwwexample.com");
        assert_eq!(domain("https://api.www.example.com"), "api.www.example.com");
    }

    #[test]
    fn test_domain_with_port_and_case() {
        assert_eq!(domain("http://localhost:3000/app"), "localhost");
        assert_eq!(domain("https://WWW.Example.COM/Path"), "example.com");
        assert_eq!(domain("http://127.0.0.1:8080"), "127.0.0.1");
    }

    #[test]
    fn test_second_level_domain() {
        assert_eq!(second_level_domain("http://a.p-pp.cn"), "p-pp.cn");
        assert_eq!(second_level_domain("http://b.c.p-pp.cn"), "p-pp.cn");
        assert_eq!(second_level_domain("https://www.github.com/rust-lang"), "github.com");
        assert_eq!(second_level_domain("http://localhost:8000"), "localhost");
    }

    #[test]
    fn test_domain_levels() {
        assert_eq!(
            domain_levels("http://a.b.example.com", 4),
            vec!["com", "example.com", "b.example.com", "a.b.example.com"]
        );
    }

    #[test]
    fn test_domain_levels_pads_short_hostnames() {
        assert_eq!(
            domain_levels("https://www.example.com", 4),
            vec!["com", "example.com", "", ""]
        );
        assert_eq!(domain_levels("http://a.b.c.example.com", 2), vec!["com", "example.com"]);
    }

    #[test]
    fn test_unparseable_urls_give_empty_output() {
        for url in ["", "not-a-url", "example.com/path", "https://", "://missing"] {
            assert_eq!(domain(url), "", "domain({url:?})");
            assert_eq!(second_level_domain(url), "", "second_level_domain({url:?})");
            assert_eq!(domain_levels(url, 3), vec!["", "", ""], "domain_levels({url:?})");
        }
    }

    #[test]
    fn test_urls_without_host_give_empty_output() {
        assert_eq!(domain("about:blank"), "");
        assert_eq!(second_level_domain("mailto:someone@example.com"), "");
        assert_eq!(domain_levels("data:text/plain,hi", 2), vec!["", ""]);
    }

    #[test]
    fn test_clamp_max_level() {
        assert_eq!(clamp_max_level(0), 2);
        assert_eq!(clamp_max_level(4), 4);
        assert_eq!(clamp_max_level(42), 10);
    }
}
