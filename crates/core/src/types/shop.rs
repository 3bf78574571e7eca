//! Shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty (after trimming).
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that cannot appear in a hostname.
    #[error("shop domain contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// The input has no dot-separated labels (e.g. `my-store`).
    #[error("shop domain must contain at least one dot")]
    MissingDot,
}

/// A merchant's store identifier (e.g. `acme.myshopify.com`).
///
/// The shop domain is the primary cache-partitioning key: every cache entry
/// and every in-flight request is tagged with the shop it belongs to.
///
/// ## Constraints
///
/// - Leading/trailing whitespace is trimmed, letters are lowercased
/// - Length: 1-255 characters
/// - Only ASCII letters, digits, `-` and `.`
/// - At least one `.`, and no empty labels
///
/// ## Examples
///
/// ```
/// use storesight_core::ShopDomain;
///
/// let shop = ShopDomain::parse(" Acme.myshopify.com ").unwrap();
/// assert_eq!(shop.as_str(), "acme.myshopify.com");
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("no-dot").is_err());
/// assert!(ShopDomain::parse("bad domain.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a hostname.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, too long, contains a
    /// non-hostname character, or is not a dotted hostname.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
        {
            return Err(ShopDomainError::InvalidCharacter(bad));
        }

        if !trimmed.contains('.') || trimmed.split('.').any(str::is_empty) {
            return Err(ShopDomainError::MissingDot);
        }

        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the store handle (the first label, e.g. `acme`).
    #[must_use]
    pub fn handle(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(shop: ShopDomain) -> Self {
        shop.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_domains() {
        assert!(ShopDomain::parse("acme.myshopify.com").is_ok());
        assert!(ShopDomain::parse("shop.example.co.uk").is_ok());
        assert!(ShopDomain::parse("my-store-2.myshopify.com").is_ok());
    }

    #[test]
    fn test_parse_normalizes() {
        let shop = ShopDomain::parse("  ACME.MyShopify.com\n").unwrap();
        assert_eq!(shop.as_str(), "acme.myshopify.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ShopDomain::parse(""), Err(ShopDomainError::Empty));
        assert_eq!(ShopDomain::parse("   "), Err(ShopDomainError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}.com", "a".repeat(260));
        assert!(matches!(
            ShopDomain::parse(&long),
            Err(ShopDomainError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            ShopDomain::parse("acme_store.com"),
            Err(ShopDomainError::InvalidCharacter('_'))
        );
        assert_eq!(
            ShopDomain::parse("https://acme.com"),
            Err(ShopDomainError::InvalidCharacter(':'))
        );
    }

    #[test]
    fn test_parse_missing_dot() {
        assert_eq!(ShopDomain::parse("acme"), Err(ShopDomainError::MissingDot));
        assert_eq!(ShopDomain::parse("acme..com"), Err(ShopDomainError::MissingDot));
        assert_eq!(ShopDomain::parse(".acme.com"), Err(ShopDomainError::MissingDot));
    }

    #[test]
    fn test_handle() {
        let shop = ShopDomain::parse("acme.myshopify.com").unwrap();
        assert_eq!(shop.handle(), "acme");
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let parsed: Result<ShopDomain, _> = serde_json::from_str("\"not a shop\"");
        assert!(parsed.is_err());

        let shop: ShopDomain = serde_json::from_str("\"Acme.myshopify.com\"").unwrap();
        assert_eq!(shop.as_str(), "acme.myshopify.com");
        assert_eq!(serde_json::to_string(&shop).unwrap(), "\"acme.myshopify.com\"");
    }
}
