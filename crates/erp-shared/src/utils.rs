//! Utility functions

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

pub fn is_valid_uuid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}

pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let (local, domain) = email.split_at(at_pos);
        if local.is_empty() {
            format!("***{}", domain)
        } else if local.len() <= 2 {
            format!("{}***{}", &local[..1], domain)
        } else {
            format!("{}***{}", &local[..2], domain)
        }
    } else {
        "***".to_string()
    }
}

fn non_slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// URL-friendly slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    non_slug_chars()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Normalize an email for lookups and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  About Us!  "), "about-us");
        assert_eq!(slugify("Q1 -- Pricing & Plans"), "q1-pricing-plans");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("jane@example.com"), "ja***@example.com");
        assert_eq!(mask_email("j@example.com"), "j***@example.com");
        assert_eq!(mask_email("invalid"), "***");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Jane@Example.COM "), "jane@example.com");
    }
}
