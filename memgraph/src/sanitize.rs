//! Input gate for values that end up inside storage predicates
//!
//! Namespace, bucket and other caller-supplied tags may only contain word
//! characters, hyphens, periods and spaces. Identifier strings must be
//! canonical hyphenated UUIDs.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{MemoryError, Result};
use crate::node::MemoryId;

static SAFE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-. ]+$").expect("valid regex"));

static CANONICAL_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid regex")
});

/// Validate that `value` is safe to place in a predicate.
///
/// Returns the value unchanged on success, `InvalidInput` naming `field`
/// otherwise.
pub fn sanitize<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if SAFE_VALUE.is_match(value) {
        Ok(value)
    } else {
        Err(MemoryError::invalid_input(
            field,
            format!("{:?} may only contain word characters, '-', '.' and spaces", value),
        ))
    }
}

/// Whether `value` is a canonical 8-4-4-4-12 hex identifier
pub fn is_canonical_id(value: &str) -> bool {
    CANONICAL_UUID.is_match(value)
}

/// Parse a canonical identifier string into a [`MemoryId`].
///
/// Rejects the other textual forms `uuid` would otherwise accept (simple,
/// braced, urn).
pub fn parse_memory_id(value: &str, field: &str) -> Result<MemoryId> {
    if !is_canonical_id(value) {
        return Err(MemoryError::invalid_input(
            field,
            format!("{:?} is not a hyphenated UUID", value),
        ));
    }
    Ok(value.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_safe_values() {
        for value in ["default", "team-a", "v1.2", "my bucket", "snake_case_9"] {
            assert_eq!(sanitize(value, "bucket").unwrap(), value);
        }
    }

    #[test]
    fn test_rejects_injection() {
        for value in [
            "x' OR '1'='1",
            "a\"b",
            "ns; DROP TABLE memory",
            "a=b",
            "(x)",
            "a%",
            "",
            "line\nbreak",
        ] {
            let err = sanitize(value, "namespace").unwrap_err();
            assert!(
                matches!(err, MemoryError::InvalidInput { ref field, .. } if field == "namespace"),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_canonical_id() {
        assert!(is_canonical_id("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(is_canonical_id("67E55044-10B1-426F-9247-BB680E5FE0C8"));
        assert!(!is_canonical_id("67e5504410b1426f9247bb680e5fe0c8"));
        assert!(!is_canonical_id("{67e55044-10b1-426f-9247-bb680e5fe0c8}"));
        assert!(!is_canonical_id("67e55044-10b1-426f-9247-bb680e5fe0c8' OR 1=1"));
    }

    #[test]
    fn test_parse_memory_id() {
        let id = MemoryId::new();
        assert_eq!(parse_memory_id(&id.to_string(), "memory_id").unwrap(), id);
        assert!(parse_memory_id("not-an-id", "memory_id").is_err());
    }
}
