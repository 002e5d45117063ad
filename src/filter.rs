// Request filtering by URL substring patterns

/// Decide whether a request should go through the interceptor
///
/// Exclusion wins over inclusion. An empty include list matches everything,
/// an empty exclude list matches nothing.
pub fn should_intercept<S: AsRef<str>>(url: &str, exclude: &[S], include: &[S]) -> bool {
    if exclude.iter().any(|p| url.contains(p.as_ref())) {
        return false;
    }

    include.is_empty() || include.iter().any(|p| url.contains(p.as_ref()))
}
