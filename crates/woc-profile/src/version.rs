//! Dataset version tags and their ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Order two version tags.
///
/// A longer tag is always newer (`"AA"` > `"U"`). Tags of equal length are
/// ordered by their first character only, so `"UA"` and `"UZ"` compare equal.
/// Existing profiles depend on this ordering; it is not lexicographic.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.chars().next().cmp(&b.chars().next()))
}

/// Restricts which versions of a relation are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionFilter {
    One(String),
    AnyOf(Vec<String>),
}

impl VersionFilter {
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionFilter::One(v) => v == version,
            VersionFilter::AnyOf(vs) => vs.iter().any(|v| v == version),
        }
    }
}

impl std::fmt::Display for VersionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionFilter::One(v) => f.write_str(v),
            VersionFilter::AnyOf(vs) => write!(f, "{}", vs.join("|")),
        }
    }
}

impl From<&str> for VersionFilter {
    fn from(v: &str) -> Self {
        VersionFilter::One(v.to_string())
    }
}

impl From<String> for VersionFilter {
    fn from(v: String) -> Self {
        VersionFilter::One(v)
    }
}

impl From<Vec<String>> for VersionFilter {
    fn from(vs: Vec<String>) -> Self {
        VersionFilter::AnyOf(vs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn longer_is_newer() {
        assert_eq!(compare_versions("AA", "U"), Ordering::Greater);
        assert_eq!(compare_versions("U", "AA"), Ordering::Less);
    }

    #[test]
    fn same_length_by_first_char() {
        assert_eq!(compare_versions("S", "T"), Ordering::Less);
        assert_eq!(compare_versions("V", "U"), Ordering::Greater);
        assert_eq!(compare_versions("UA", "UZ"), Ordering::Equal);
    }

    #[test]
    fn newest_first_sort() {
        let mut vs = vec!["R", "AA", "U", "T"];
        vs.sort_by(|a, b| compare_versions(b, a));
        assert_eq!(vs, vec!["AA", "U", "T", "R"]);
    }

    #[test]
    fn filter_matching() {
        let one = VersionFilter::from("U");
        assert!(one.matches("U"));
        assert!(!one.matches("V"));
        let any = VersionFilter::from(vec!["U".to_string(), "V".to_string()]);
        assert!(any.matches("V"));
        assert!(!any.matches("R"));
        assert_eq!(any.to_string(), "U|V");
    }

    proptest! {
        #[test]
        fn length_dominates(short in "[A-Z]{1,3}", extra in "[A-Z]{1,3}") {
            let long = format!("{short}{extra}");
            prop_assert_eq!(compare_versions(&long, &short), Ordering::Greater);
        }
    }
}
