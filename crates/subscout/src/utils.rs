use reqwest::Url;

/// Extract the hostname from an absolute http(s) URL.
///
/// Search results link to anything: relative paths, `javascript:` pseudo
/// URLs, app deep links. Everything without an http(s) host yields `None`.
pub fn hostname_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.host_str().map(|host| host.to_string())
}

/// Append a value if the list does not already contain it, preserving
/// insertion order (first seen wins).
pub fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Repeatedly drop everything up to and including a `*.` wildcard marker.
///
/// Certificate names come as `*.example.com` or even `foo.*.example.com`;
/// the caller discards the value entirely if a `*` survives the stripping.
pub fn strip_wildcard_labels(name: &str) -> &str {
    let mut name = name;
    while let Some(pos) = name.find("*.") {
        name = &name[pos + 2..];
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_from_url_strips_path_query_and_port() {
        assert_eq!(
            hostname_from_url("https://api.example.com:8443/v2/search?q=x"),
            Some("api.example.com".to_string())
        );
        assert_eq!(
            hostname_from_url("http://www.example.com/about"),
            Some("www.example.com".to_string())
        );
    }

    #[test]
    fn hostname_from_url_rejects_non_http_links() {
        assert_eq!(hostname_from_url("/search?q=example.com"), None);
        assert_eq!(hostname_from_url("javascript:void(0)"), None);
        assert_eq!(hostname_from_url("android-app://com.example"), None);
    }

    #[test]
    fn push_unique_keeps_first_occurrence() {
        let mut list = Vec::new();
        push_unique(&mut list, "a.example.com".to_string());
        push_unique(&mut list, "b.example.com".to_string());
        push_unique(&mut list, "a.example.com".to_string());

        assert_eq!(list, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn strip_wildcard_labels_removes_leading_wildcards() {
        assert_eq!(strip_wildcard_labels("*.example.com"), "example.com");
        assert_eq!(strip_wildcard_labels("*.*.example.com"), "example.com");
        assert_eq!(strip_wildcard_labels("foo.*.example.com"), "example.com");
        assert_eq!(strip_wildcard_labels("www.example.com"), "www.example.com");
    }

    #[test]
    fn strip_wildcard_labels_leaves_embedded_star() {
        // a bare star is not a `*.` label, the caller drops the value
        assert_eq!(strip_wildcard_labels("*foo.example.com"), "*foo.example.com");
    }
}
