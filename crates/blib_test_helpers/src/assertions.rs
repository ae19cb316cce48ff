//! Domain-specific assertions for B-Lib tests

use blib_common::Bookmark;
use predicates::prelude::*;
use std::collections::HashSet;

/// Ids in collection order
pub fn ids(bookmarks: &[Bookmark]) -> Vec<&str> {
    bookmarks.iter().map(|b| b.id.as_str()).collect()
}

/// Panics unless every id appears once and order is newest first
pub fn assert_collection_invariants(bookmarks: &[Bookmark]) {
    let mut seen = HashSet::new();
    for bookmark in bookmarks {
        assert!(
            seen.insert(bookmark.id.as_str()),
            "duplicate id {} in {:?}",
            bookmark.id,
            ids(bookmarks)
        );
    }
    for pair in bookmarks.windows(2) {
        assert!(
            pair[0].created_at >= pair[1].created_at,
            "{} is older than {} but listed first",
            pair[0].id,
            pair[1].id
        );
    }
}

/// Assert that stderr does NOT contain any of the given strings
///
/// # Example
///
/// ```rust
/// use blib_test_helpers::assertions::stderr_not_contains;
/// use predicates::prelude::*;
///
/// assert!(stderr_not_contains(&["ERROR", "panicked"]).eval("all good"));
/// ```
pub fn stderr_not_contains(values: &[&str]) -> impl Predicate<str> {
    let owned_values: Vec<String> = values.iter().map(|&s| s.to_string()).collect();
    predicate::function(move |s: &str| !owned_values.iter().any(|v| s.contains(v.as_str())))
}

/// Output never leaks a bearer token or API key query parameter
pub fn no_credentials() -> impl Predicate<str> {
    predicate::str::contains("Bearer ey")
        .or(predicate::str::contains("apikey=ey"))
        .not()
}
