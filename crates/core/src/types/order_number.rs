//! Human-readable order numbers.
//!
//! An order number is the fixed prefix `ORD` followed by exactly eleven ASCII
//! digits (`^ORD\d{11}$`, 14 characters). Uniqueness is not a property of the
//! type; the storefront checks candidates against persisted orders.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// The value does not start with `ORD`.
    #[error("order number must start with {prefix}")]
    MissingPrefix {
        /// Expected prefix.
        prefix: &'static str,
    },
    /// The value has the wrong number of characters.
    #[error("order number must be {expected} characters long")]
    WrongLength {
        /// Expected total length.
        expected: usize,
    },
    /// The sequence part contains something other than ASCII digits.
    #[error("order number sequence must be digits only")]
    NonDigit,
    /// The numeric sequence does not fit in eleven digits.
    #[error("order number sequence {0} exceeds eleven digits")]
    SequenceOutOfRange(u64),
}

/// A validated order number such as `ORD04715582901`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Fixed prefix of every order number.
    pub const PREFIX: &'static str = "ORD";
    /// Number of digits after the prefix.
    pub const DIGITS: usize = 11;
    /// Total length of an order number.
    pub const LENGTH: usize = Self::PREFIX.len() + Self::DIGITS;
    /// Largest sequence value that fits in [`Self::DIGITS`] digits.
    pub const MAX_SEQUENCE: u64 = 99_999_999_999;

    /// Build an order number from a numeric sequence, zero-padding to eleven digits.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError::SequenceOutOfRange`] if `sequence` has more
    /// than eleven digits.
    pub fn from_sequence(sequence: u64) -> Result<Self, OrderNumberError> {
        if sequence > Self::MAX_SEQUENCE {
            return Err(OrderNumberError::SequenceOutOfRange(sequence));
        }
        Ok(Self(format!(
            "{}{sequence:0width$}",
            Self::PREFIX,
            width = Self::DIGITS
        )))
    }

    /// Parse an existing order number.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderNumberError`] if the value does not match `^ORD\d{11}$`.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or(OrderNumberError::MissingPrefix {
                prefix: Self::PREFIX,
            })?;
        if digits.len() != Self::DIGITS {
            return Err(OrderNumberError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderNumberError::NonDigit);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric sequence after the prefix.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.0
            .get(Self::PREFIX.len()..)
            .and_then(|digits| digits.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
