//! Shipping address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use driftwood_core::{AddressId, UserId};

/// Maximum length of any free-text address field.
const MAX_FIELD_LENGTH: usize = 200;

/// A user's saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub phone: Option<String>,
    /// At most one address per user carries this flag.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for an address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Make this the default address.
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Trim fields, uppercase the country code and check lengths.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the first invalid field.
    pub fn normalize(self) -> Result<Self, String> {
        let required = |name: &str, value: String| -> Result<String, String> {
            let value = value.trim().to_owned();
            if value.is_empty() {
                return Err(format!("{name} is required"));
            }
            if value.len() > MAX_FIELD_LENGTH {
                return Err(format!("{name} must be at most {MAX_FIELD_LENGTH} characters"));
            }
            Ok(value)
        };
        let optional = |name: &str, value: Option<String>| -> Result<Option<String>, String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .map(|v| required(name, v))
                .transpose()
        };

        let country = self.country.trim().to_ascii_uppercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err("country must be a two-letter ISO code".to_owned());
        }

        Ok(Self {
            full_name: required("full_name", self.full_name)?,
            line1: required("line1", self.line1)?,
            line2: optional("line2", self.line2)?,
            city: required("city", self.city)?,
            region: required("region", self.region)?,
            postal_code: required("postal_code", self.postal_code)?,
            country,
            phone: optional("phone", self.phone)?,
            is_default: self.is_default,
        })
    }
}

/// Copy of an address frozen into an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<&Address> for AddressSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            region: address.region.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        }
    }
}
