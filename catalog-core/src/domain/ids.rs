use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of random bytes behind a generated request or correlation id.
pub const TRACE_ID_BYTES: usize = 16;

/// Newtype pattern for ProductId
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProductId(pub Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProductId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ProductId> for Uuid {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

fn random_hex_id() -> String {
    let bytes: [u8; TRACE_ID_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Identifier threading one logical request across service hops.
///
/// Generated ids are 32 lowercase hex characters. Inherited ids are kept
/// verbatim (minus surrounding whitespace), whatever their shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    /// Accept an inbound value. Empty and whitespace-only input is treated
    /// as absent.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

/// Identifier for a single hop's handling of a request. Always fresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn test_generated_correlation_id_shape() {
        let id = CorrelationId::generate();
        assert_eq!(id.as_str().len(), TRACE_ID_BYTES * 2);
        assert!(is_lower_hex(id.as_str()));
    }

    #[test]
    fn test_generated_request_id_shape() {
        let id = RequestId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(is_lower_hex(id.as_str()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_parse_trims_and_rejects_blank() {
        assert_eq!(CorrelationId::parse("  abc ").unwrap().as_str(), "abc");
        assert!(CorrelationId::parse("").is_none());
        assert!(CorrelationId::parse("   \t").is_none());
    }
}
