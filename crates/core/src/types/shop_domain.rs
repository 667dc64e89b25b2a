//! Shopify shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input does not end in the platform's shop suffix.
    #[error("shop domain must end with {suffix}")]
    WrongSuffix {
        /// Required suffix.
        suffix: &'static str,
    },
    /// The store handle contains characters outside `[a-z0-9-]`.
    #[error("shop domain contains invalid characters")]
    InvalidCharacters,
    /// The store handle is too long.
    #[error("shop handle must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length of the handle.
        max: usize,
    },
}

/// A merchant's `{handle}.myshopify.com` domain.
///
/// The shop domain is the primary key for install state, and it is also
/// interpolated into outbound URLs (`https://{shop}/admin/...`), so parsing
/// is strict: the handle may only contain lower-case ASCII letters, digits,
/// and hyphens, must start with a letter or digit, and the domain must end in
/// `.myshopify.com`. Input is trimmed and lower-cased first.
///
/// ## Examples
///
/// ```
/// use product_merge_core::ShopDomain;
///
/// let shop = ShopDomain::parse("Cool-Store.myshopify.com").unwrap();
/// assert_eq!(shop.as_str(), "cool-store.myshopify.com");
/// assert_eq!(shop.handle(), "cool-store");
///
/// assert!(ShopDomain::parse("evil.com/x?.myshopify.com").is_err());
/// assert!(ShopDomain::parse("example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Domain suffix every shop shares.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Maximum handle length accepted by the platform.
    pub const MAX_HANDLE_LENGTH: usize = 60;

    /// Parse a `ShopDomain` from a bare host string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, lacks the `.myshopify.com`
    /// suffix, has an over-long handle, or contains invalid characters.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let normalized = s.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        let handle = normalized
            .strip_suffix(Self::SUFFIX)
            .ok_or(ShopDomainError::WrongSuffix {
                suffix: Self::SUFFIX,
            })?;

        if handle.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if handle.len() > Self::MAX_HANDLE_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_HANDLE_LENGTH,
            });
        }

        let valid_chars = handle
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !valid_chars || handle.starts_with('-') {
            return Err(ShopDomainError::InvalidCharacters);
        }

        Ok(Self(normalized))
    }

    /// Parse a `ShopDomain` from an origin URL such as `https://shop.myshopify.com`.
    ///
    /// Session tokens carry the shop as a `dest` URL rather than a bare host.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ShopDomain::parse`] for the host part.
    pub fn from_origin(origin: &str) -> Result<Self, ShopDomainError> {
        let trimmed = origin.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        Self::parse(without_scheme.trim_end_matches('/'))
    }

    /// Returns the full domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the store handle (the part before `.myshopify.com`).
    #[must_use]
    pub fn handle(&self) -> &str {
        self.0.strip_suffix(Self::SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
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

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopDomain {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopDomain {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
