//! UUID utilities

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
///
/// Leading/trailing whitespace is ignored so values pasted from logs parse.
pub fn parse(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim())
        .map_err(|e| Error::InvalidInput(format!("Invalid UUID '{}': {}", s, e)))
}
