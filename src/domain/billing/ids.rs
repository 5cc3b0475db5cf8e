//! Identifier newtypes for billing records.
//!
//! Primary keys are plain integers: the transaction id is encoded into the
//! processor-facing identity string and the item id appears in invoice ids,
//! so both must round-trip through decimal text exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Primary key of a purchase item (any variant).
    ItemId
);

define_id!(
    /// Primary key of a checkout transaction.
    TransactionId
);

define_id!(
    /// Primary key of an active processor subscription agreement.
    SubscriptionId
);

define_id!(
    /// Primary key of a completed payment.
    PaymentId
);
