//! Aggregate identity and versioning types.
//!
//! An aggregate is a consistency boundary identified by `(type, id)` and,
//! for multi-tenant backends, an optional tenant. Its full history is an
//! ordered event sequence; `Version` counts the events ever applied and is
//! the basis for optimistic concurrency at the write boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for [`AggregateType`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid aggregate type: {0}")]
pub struct ParseAggregateTypeError(String);

/// Name of an aggregate category (e.g. `"order"`, `"payment"`).
///
/// Newtype over `String`: type safety in signatures, serialization for the
/// wire. Parsing rejects empty names; `new()` trusts application-controlled
/// input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateType(String);

impl AggregateType {
    /// Create a new `AggregateType` from a string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the aggregate type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AggregateType {
    type Err = ParseAggregateTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseAggregateTypeError(
                "Aggregate type cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for AggregateType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AggregateType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AggregateType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier of one aggregate instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random ID.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Tenant identifier for multi-tenant backends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Aggregate version for optimistic concurrency control.
///
/// Counts the events ever applied to the aggregate, starting at 0 for an
/// aggregate with no history. When appending with an expected version, the
/// backend rejects the batch if the current version no longer matches; that
/// rejection is the conflict signal surfaced to callers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version (0) of an aggregate with no history.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Check if this is the initial version (0).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod aggregate_type_tests {
        use super::*;

        #[test]
        fn new_creates_aggregate_type() {
            let aggregate_type = AggregateType::new("order");
            assert_eq!(aggregate_type.as_str(), "order");
        }

        #[test]
        #[allow(clippy::expect_used)] // Panics: test will fail if parse fails
        fn parse_from_str() {
            let parsed: AggregateType = "order".parse().expect("parse should succeed");
            assert_eq!(parsed, AggregateType::new("order"));
        }

        #[test]
        fn parse_empty_string_fails() {
            let result = "".parse::<AggregateType>();
            assert!(result.is_err());
        }

        #[test]
        fn display() {
            let aggregate_type = AggregateType::new("order");
            assert_eq!(format!("{aggregate_type}"), "order");
        }
    }

    mod aggregate_id_tests {
        use super::*;

        #[test]
        #[allow(clippy::expect_used)] // Panics: test will fail if parse fails
        fn parse_from_uuid_string() {
            let id: AggregateId = "723ecfce-14e9-4889-98d5-a3d0ad54912f"
                .parse()
                .expect("parse should succeed");
            assert_eq!(format!("{id}"), "723ecfce-14e9-4889-98d5-a3d0ad54912f");
        }

        #[test]
        fn parse_garbage_fails() {
            let result = "not-a-uuid".parse::<AggregateId>();
            assert!(result.is_err());
        }

        #[test]
        fn random_ids_differ() {
            assert_ne!(AggregateId::random(), AggregateId::random());
        }
    }

    mod version_tests {
        use super::*;

        #[test]
        fn initial_version() {
            assert_eq!(Version::INITIAL, Version::new(0));
            assert!(Version::INITIAL.is_initial());
        }

        #[test]
        fn version_ordering() {
            assert!(Version::new(1) < Version::new(2));
            assert!(Version::new(3) > Version::new(1));
        }

        #[test]
        fn version_from_u64() {
            let version = Version::from(42_u64);
            assert_eq!(version.value(), 42);

            let num: u64 = version.into();
            assert_eq!(num, 42);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", Version::new(42)), "42");
        }
    }
}
