//! Identifier validation and quoting for dynamically built SQL.
//!
//! Schema and table names can come from configuration and column names from
//! catalog metadata. Every one of them passes through [`validate_identifier`]
//! before it is interpolated, and is then double-quoted so reserved words and
//! mixed case survive intact.

use stowage_core::defaults::MAX_IDENTIFIER_LEN;
use stowage_core::{Error, Result, TableRef};

/// Schemas that must never be a landing or archive target.
const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Validate a PostgreSQL identifier against the allow-listed charset.
///
/// Identifiers must:
/// - Not be empty
/// - Not exceed 63 bytes (PostgreSQL identifier limit)
/// - Start with an ASCII letter or underscore
/// - Contain only ASCII alphanumerics and underscores
///
/// # Examples
///
/// ```
/// use stowage_db::validate_identifier;
///
/// assert!(validate_identifier("archive_orders").is_ok());
/// assert!(validate_identifier("orders; DROP TABLE x").is_err());
/// assert!(validate_identifier("").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::UnsafeIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::UnsafeIdentifier(format!(
            "identifier exceeds {} character limit: {} characters",
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::UnsafeIdentifier(format!(
                "'{}' must start with a letter or underscore",
                name
            )));
        }
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
    {
        return Err(Error::UnsafeIdentifier(format!(
            "'{}' contains invalid character '{}'",
            name, ch
        )));
    }

    Ok(())
}

/// Validate a schema name: an identifier that is not a system schema.
pub fn validate_schema_name(name: &str) -> Result<()> {
    validate_identifier(name)?;

    let lowercase = name.to_lowercase();
    if SYSTEM_SCHEMAS.contains(&lowercase.as_str()) {
        return Err(Error::UnsafeIdentifier(format!(
            "'{}' is a system schema",
            name
        )));
    }
    Ok(())
}

/// Validate both halves of a table reference.
pub fn validate_table_ref(table: &TableRef) -> Result<()> {
    validate_schema_name(table.schema())?;
    validate_identifier(table.name())
}

/// Double-quote a validated identifier.
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Render `"schema"."name"` for a validated table reference.
pub fn qualified_name(table: &TableRef) -> Result<String> {
    validate_table_ref(table)?;
    Ok(format!("\"{}\".\"{}\"", table.schema(), table.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_unsafe(result: Result<()>, needle: &str) {
        match result {
            Err(Error::UnsafeIdentifier(msg)) => {
                assert!(msg.contains(needle), "message '{}' lacks '{}'", msg, needle)
            }
            other => panic!("Expected UnsafeIdentifier, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_identifiers() {
        for name in ["orders", "archive_orders", "_private", "Order2026", "a", "_"] {
            assert!(validate_identifier(name).is_ok(), "{} should be valid", name);
        }
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        expect_unsafe(validate_identifier(""), "empty");
    }

    #[test]
    fn test_too_long_identifier() {
        expect_unsafe(validate_identifier(&"a".repeat(64)), "63 character limit");
    }

    #[test]
    fn test_leading_digit() {
        expect_unsafe(validate_identifier("2024_orders"), "start with a letter");
    }

    #[test]
    fn test_invalid_characters() {
        let invalid = [
            "order-items",
            "order.items",
            "order items",
            "orders;",
            "order'name",
            "order\"name",
            "order/name",
            "order\\name",
            "order(name)",
            "order$name",
            "ordersλ",
        ];
        for name in invalid {
            expect_unsafe(validate_identifier(name), "invalid character");
        }
    }

    #[test]
    fn test_injection_attempt_rejected() {
        expect_unsafe(validate_identifier("orders; DROP TABLE x"), "invalid character ';'");
    }

    #[test]
    fn test_system_schemas_rejected() {
        for schema in ["pg_catalog", "information_schema", "PG_TOAST"] {
            expect_unsafe(validate_schema_name(schema), "system schema");
        }
        assert!(validate_schema_name("landing").is_ok());
        assert!(validate_schema_name("public").is_ok());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("select").unwrap(), "\"select\"");
        assert_eq!(
            qualified_name(&TableRef::new("archive", "archive_orders")).unwrap(),
            "\"archive\".\"archive_orders\""
        );
        assert!(qualified_name(&TableRef::new("archive", "a\"b")).is_err());
    }

    #[test]
    fn test_table_ref_validates_both_parts() {
        assert!(validate_table_ref(&TableRef::new("landing", "orders")).is_ok());
        assert!(validate_table_ref(&TableRef::new("land ing", "orders")).is_err());
        assert!(validate_table_ref(&TableRef::new("landing", "orders; DROP TABLE x")).is_err());
    }
}
