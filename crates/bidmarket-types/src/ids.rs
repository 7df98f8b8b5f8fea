//! Globally unique identifiers used throughout Bidmarket.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting. They
//! are persisted as their hyphenated string form.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Entity label used in error messages and logs.
            #[must_use]
            pub const fn label() -> &'static str {
                $label
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = crate::BidmarketError;

            fn from_str(s: &str) -> crate::Result<Self> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| {
                    crate::BidmarketError::InvalidArgument {
                        reason: format!("malformed {} id {s:?}: {e}", $label),
                    }
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

define_id!(
    /// Identifier of an issuer (the party that lists invoices and gets paid).
    IssuerId,
    "issuer"
);

define_id!(
    /// Identifier of an investor (the party that places escrowed bids).
    InvestorId,
    "investor"
);

// ---------------------------------------------------------------------------
// Market objects
// ---------------------------------------------------------------------------

define_id!(
    /// Identifier of an invoice listed for sale.
    InvoiceId,
    "invoice"
);

define_id!(
    /// Identifier of a bid. Doubles as the payout idempotency key.
    BidId,
    "bid"
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
