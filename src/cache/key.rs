//! Cache Key Module
//!
//! Query normalization and the deterministic digest used as cache key.

use sha2::{Digest, Sha256};

/// Lowercases, trims and collapses whitespace runs to a single space.
pub fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of `normalize(query)`, suffixed with `":" + category` when a
/// non-blank category is given.
pub fn query_hash(query: &str, category: Option<&str>) -> String {
    let mut material = normalize(query);
    if let Some(category) = category.filter(|c| !c.trim().is_empty()) {
        material.push(':');
        material.push_str(category);
    }
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Truncates the stored copy of a query on a char boundary.
pub fn truncate_query(query: &str, max_chars: usize) -> String {
    query.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_case_and_space() {
        assert_eq!(normalize("  Oil   FILTER\tchange \n"), "oil filter change");
    }

    #[test]
    fn test_hash_ignores_formatting() {
        assert_eq!(query_hash("Oil Filter", None), query_hash("  oil   filter ", None));
    }

    #[test]
    fn test_hash_depends_on_category() {
        let plain = query_hash("fault code e-204", None);
        let manuals = query_hash("fault code e-204", Some("manuals"));
        let emails = query_hash("fault code e-204", Some("emails"));
        assert_ne!(plain, manuals);
        assert_ne!(manuals, emails);
    }

    #[test]
    fn test_blank_category_hashes_like_none() {
        assert_eq!(query_hash("gen set", Some("")), query_hash("gen set", None));
        assert_eq!(query_hash("gen set", Some("   ")), query_hash("gen set", None));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = query_hash("watermaker", None);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_query("héllo", 2), "hé");
        assert_eq!(truncate_query("short", 100), "short");
    }
}
