//! Residential colleges offered on the landing page.

use serde::Serialize;

/// A college that has a laundry room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct College {
    pub slug: &'static str,
    pub name: &'static str,
}

/// Slug preselected on the landing page.
pub const DEFAULT_COLLEGE: &str = "baker";

pub const COLLEGES: &[College] = &[
    College { slug: "baker", name: "Baker" },
    College { slug: "willrice", name: "Will Rice" },
    College { slug: "hanszen", name: "Hanszen" },
    College { slug: "wiess", name: "Wiess" },
    College { slug: "jones", name: "Jones" },
    College { slug: "brown", name: "Brown" },
    College { slug: "lovett", name: "Lovett" },
    College { slug: "sidrichardson", name: "Sid Richardson" },
    College { slug: "martel", name: "Martel" },
    College { slug: "mcmurtry", name: "McMurtry" },
    College { slug: "duncan", name: "Duncan" },
];

pub fn find(slug: &str) -> Option<&'static College> {
    COLLEGES.iter().find(|c| c.slug == slug)
}

/// Normalize a slug taken from a route or form: trimmed and lowercased.
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether a normalized slug can name a college: non-empty, lowercase
/// ASCII letters, digits and `-` only.
///
/// Paths such as `favicon.ico` or `robots.txt` fail this check.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Name shown in the college header.
///
/// Known colleges use their proper name; anything else gets its first
/// letter capitalized.
pub fn display_name(slug: &str) -> String {
    if let Some(college) = find(slug) {
        return college.name.to_string();
    }
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
