//! Tag name normalization.
//!
//! Tag names are exact and case-sensitive: "Run" and "run" are different
//! tags. Normalization only trims whitespace, drops blanks and collapses
//! duplicates.

use crate::defaults::TAG_NAME_MAX_LEN;
use crate::error::{Error, Result};

/// Normalize a requested tag list.
///
/// Trims each name, drops blank names and removes later duplicates while
/// keeping first-occurrence order.
pub fn normalize_tag_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.iter().any(|existing| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Validate a single, already-trimmed tag name.
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Tag name cannot be empty".to_string()));
    }
    if name.chars().count() > TAG_NAME_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Tag name must be {} characters or less",
            TAG_NAME_MAX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_drops_blank() {
        let names = normalize_tag_names(["  fitness ", "", "   ", "cardio"]);
        assert_eq!(names, vec!["fitness", "cardio"]);
    }

    #[test]
    fn test_normalize_dedupes_preserving_order() {
        let names = normalize_tag_names(["b", "a", "b ", "a"]);
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_normalize_is_case_sensitive() {
        let names = normalize_tag_names(["Run", "run"]);
        assert_eq!(names, vec!["Run", "run"]);
    }

    #[test]
    fn test_normalize_empty_input() {
        let names = normalize_tag_names(Vec::<String>::new());
        assert!(names.is_empty());
    }

    #[test]
    fn test_validate_tag_name_length() {
        assert!(validate_tag_name("fitness").is_ok());
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name(&"x".repeat(51)).is_err());
        assert!(validate_tag_name(&"x".repeat(50)).is_ok());
    }
}
