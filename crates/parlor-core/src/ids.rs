//! Branded identifier newtypes.
//!
//! Thread, turn, and correlation identifiers are all strings on the wire, so
//! raw `String` parameters invite swapped-argument bugs. These newtypes brand
//! each identifier at the type level while staying `#[serde(transparent)]` so
//! the wire format is unchanged.
//!
//! Locally generated identifiers (optimistic sends, new threads) are UUID v4,
//! matching what the gateway's other clients emit. Identifiers observed in the
//! event log are opaque — they are stored verbatim, never parsed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[doc = $doc:literal])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random (UUID v4) identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// View the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a conversation thread.
    ThreadId
}

branded_id! {
    /// Identifier of one logical request/response exchange.
    TurnId
}

branded_id! {
    /// Identifier spanning all records of one causal chain.
    CorrelationId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
