//! Boundary validation
//!
//! Inbound payloads are decoded with serde (ids validate themselves while
//! deserializing) and then checked with [`Validate`]. [`parse_payload`] is
//! the single gate between raw JSON and the typed kernel API.

use crate::error::ValidationError;
use serde::de::DeserializeOwned;

/// Post-decode invariants of an inbound value
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl<T: Validate> Validate for [T] {
    fn validate(&self) -> Result<(), ValidationError> {
        for (i, item) in self.iter().enumerate() {
            item.validate().map_err(|e| e.nested(&format!("[{i}]")))?;
        }
        Ok(())
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        self.as_slice().validate()
    }
}

/// Decode JSON into `T` and validate it
pub fn parse_payload<T>(json: &str) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let value: T =
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    value.validate()?;
    Ok(value)
}

/// Same as [`parse_payload`] for an already-decoded JSON value
pub fn parse_value<T>(value: serde_json::Value) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let value: T =
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    value.validate()?;
    Ok(value)
}

#[inline]
pub fn ensure(condition: bool, field: &str, reason: &str) -> Result<(), ValidationError> {
    if condition {
        Ok(())
    } else {
        Err(ValidationError::invalid(field, reason))
    }
}

#[inline]
pub fn ensure_finite(value: f64, field: &str) -> Result<(), ValidationError> {
    ensure(value.is_finite(), field, "must be a finite number")
}
