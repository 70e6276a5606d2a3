//! Slug derivation for team URLs

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALPHANUMERIC_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Used when a name has no ASCII alphanumerics at all
const FALLBACK_SLUG: &str = "team";

/// Derive the base slug for a team name
///
/// Lower-cases the name, collapses every run of non-alphanumeric characters
/// into a single hyphen and trims hyphens from both ends.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let hyphenated = NON_ALPHANUMERIC_RUN.replace_all(&lowered, "-");
    let slug = hyphenated.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Candidate slugs in probing order: `base`, `base-1`, `base-2`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u32..).map(move |n| format!("{}-{}", base, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Acme Inc"), "acme-inc");
        assert_eq!(slugify("acme"), "acme");
    }

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(slugify("Acme -- & Sons!!"), "acme-sons");
        assert_eq!(slugify("  Leading and trailing  "), "leading-and-trailing");
    }

    #[test]
    fn test_slugify_strips_non_ascii() {
        assert_eq!(slugify("Café Münster"), "caf-m-nster");
    }

    #[test]
    fn test_slugify_fallback() {
        assert_eq!(slugify("!!!"), "team");
        assert_eq!(slugify("日本"), "team");
    }

    #[test]
    fn test_slug_candidates_order() {
        let candidates: Vec<String> = slug_candidates("acme").take(3).collect();
        assert_eq!(candidates, vec!["acme", "acme-1", "acme-2"]);
    }
}
