//! Typed IDs for type-safe entity references.
//!
//! Ledger identifiers are opaque strings: callers may assert their own
//! transaction IDs, and account IDs are never parsed. Wrapping them still
//! prevents passing an `AccountId` where a `TransactionId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new random ID from a UUID v7 (time-ordered), in simple hex form.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().simple().to_string())
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Returns true if the ID is empty or only whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(AccountId, "Unique identifier for a ledger account.");
typed_id!(CustomerId, "Identifier of the customer owning an account.");
typed_id!(TransactionId, "Unique identifier for a ledger transaction.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique_hex() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_opaque() {
        let id = AccountId::from("acct-123 savings");
        assert_eq!(id.as_str(), "acct-123 savings");
        assert_eq!(id.to_string(), "acct-123 savings");
        assert_eq!(id.into_inner(), "acct-123 savings".to_string());
    }

    #[test]
    fn test_blank_detection() {
        assert!(AccountId::from("").is_blank());
        assert!(AccountId::from("   ").is_blank());
        assert!(!AccountId::from("a").is_blank());
    }

    #[test]
    fn test_ids_order_lexicographically() {
        let mut ids = vec![AccountId::from("b"), AccountId::from("a"), AccountId::from("c")];
        ids.sort();
        assert_eq!(ids, vec![AccountId::from("a"), AccountId::from("b"), AccountId::from("c")]);
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = TransactionId::from("tx-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tx-1\"");
        let back: TransactionId = serde_json::from_str("\"tx-1\"").unwrap();
        assert_eq!(back, id);
    }
}
