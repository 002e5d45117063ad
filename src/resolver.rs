// URL resolution against a configured base

/// Check whether a URL already carries an http:// or https:// scheme (case-insensitive)
pub fn has_http_scheme(url: &str) -> bool {
    let starts_with = |prefix: &str| {
        url.as_bytes()
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
    };
    starts_with("http://") || starts_with("https://")
}

/// Resolve a request URL against an optional base URL
///
/// - No base, or URL already absolute → returned unchanged
/// - Otherwise base and path are joined with exactly one `/`
///
/// `resolve("/users", Some("https://api.x.com/"))` → `https://api.x.com/users`
pub fn resolve(url: &str, base_url: Option<&str>) -> String {
    let Some(base) = base_url else {
        return url.to_string();
    };

    if has_http_scheme(url) {
        return url.to_string();
    }

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_without_base() {
        assert_eq!(resolve("/users", None), "/users");
        assert_eq!(resolve("users", None), "users");
    }

    #[test]
    fn test_resolve_relative() {
        let base = Some("https://api.x.com");
        assert_eq!(resolve("/users", base), "https://api.x.com/users");
        assert_eq!(resolve("users", base), "https://api.x.com/users");
    }

    #[test]
    fn test_resolve_slash_normalization() {
        assert_eq!(
            resolve("/users", Some("https://api.x.com/")),
            "https://api.x.com/users"
        );
        assert_eq!(
            resolve("//users", Some("https://api.x.com//")),
            "https://api.x.com/users"
        );
        assert_eq!(
            resolve("v1/users?page=2", Some("https://api.x.com/api")),
            "https://api.x.com/api/v1/users?page=2"
        );
    }

    #[test]
    fn test_resolve_absolute_untouched() {
        let base = Some("https://api.x.com");
        assert_eq!(
            resolve("https://other.com/a", base),
            "https://other.com/a"
        );
        assert_eq!(resolve("http://other.com/a", base), "http://other.com/a");
        assert_eq!(resolve("HTTPS://Other.com/a", base), "HTTPS://Other.com/a");
        assert_eq!(resolve("Http://other.com", base), "Http://other.com");
    }

    #[test]
    fn test_non_http_scheme_is_relative() {
        // Only http(s) counts as absolute
        assert_eq!(
            resolve("ftp://files", Some("https://api.x.com")),
            "https://api.x.com/ftp://files"
        );
    }

    #[test]
    fn test_has_http_scheme() {
        assert!(has_http_scheme("http://a"));
        assert!(has_http_scheme("HTTPS://a"));
        assert!(!has_http_scheme("/http://a"));
        assert!(!has_http_scheme("http:/a"));
        assert!(!has_http_scheme("htt"));
        assert!(!has_http_scheme(""));
        assert!(!has_http_scheme("hé://x"));
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(resolve("", Some("https://api.x.com/")), "https://api.x.com/");
    }

    proptest! {
        #[test]
        fn prop_join_has_single_separator(
            base in "https://[a-z]{1,10}\\.com/{0,3}",
            path in "/{0,3}[a-z0-9]{1,10}(/[a-z0-9]{1,5}){0,3}",
        ) {
            let resolved = resolve(&path, Some(&base));
            let expected = format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            prop_assert_eq!(resolved, expected);
        }

        #[test]
        fn prop_absolute_urls_are_fixed_points(
            scheme in "(http|https|HTTP|HTTPS|Http|hTTpS)",
            rest in "[a-z]{1,10}\\.[a-z]{2,3}(/[a-z0-9]{0,8}){0,3}",
            base in "[a-z:/.]{0,20}",
        ) {
            let url = format!("{}://{}", scheme, rest);
            prop_assert_eq!(resolve(&url, Some(&base)), url);
        }
    }
}
