//! Attribute value conversion to and from stored bytes.

use sqlsession_types::AttributeValue;

use crate::error::StoreResult;

/// Serializes attribute values for the attribute table.
pub trait ValueConverter: Send + Sync {
    fn serialize(&self, value: &AttributeValue) -> StoreResult<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> StoreResult<AttributeValue>;
}

/// Stores values as compact JSON text bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonValueConverter;

impl ValueConverter for JsonValueConverter {
    fn serialize(&self, value: &AttributeValue) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> StoreResult<AttributeValue> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
