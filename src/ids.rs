//! Server identity.
//!
//! Side tables in the [`crate::linker::Linker`] (link ownership, rewrite
//! callbacks) are keyed by [`ServerId`] instead of hanging state off the
//! server value. Ids are ULIDs, so they sort by creation time and print
//! compactly in logs.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct ServerId(Ulid);

impl ServerId {
    /// A fresh id; every composed server gets its own.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ServerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

// Serialized as the ULID text so ids read the same in JSON as in logs.
impl Serialize for ServerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_ids_are_unique_and_ordered() {
        let first = ServerId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ServerId::new();
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_server_id_parses_its_display_form() {
        let id = ServerId::new();
        let parsed: ServerId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<ServerId>().is_err());
    }

    #[test]
    fn test_server_id_serializes_as_text() {
        let id = ServerId::new();
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::Value::String(id.to_string()));
    }
}
