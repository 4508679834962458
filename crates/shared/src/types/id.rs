//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `FolioId` where a `HotelId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user (operator or system actor).");
typed_id!(HotelId, "Unique identifier for a hotel property.");
typed_id!(GuestId, "Unique identifier for a guest profile.");
typed_id!(CompanyId, "Unique identifier for a company (city ledger) account.");
typed_id!(FolioId, "Unique identifier for a folio.");
typed_id!(
    FolioTransactionId,
    "Unique identifier for a posted folio transaction."
);
typed_id!(TaxRateId, "Unique identifier for a hotel tax rate.");
typed_id!(ReservationId, "Unique identifier for a reservation.");
typed_id!(
    ReservationRoomId,
    "Unique identifier for a room line within a reservation."
);
typed_id!(RoomTypeId, "Unique identifier for a room type.");
typed_id!(RateTypeId, "Unique identifier for a rate plan.");
typed_id!(JobId, "Unique identifier for a queued job.");
