//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Legal entity owning warehouses and ledger accounts (journal numbering scope).
    CompanyId,
    "CompanyId"
);
uuid_newtype!(
    /// Opaque actor identity attached to every mutating call (audit attribution only).
    UserId,
    "UserId"
);
uuid_newtype!(ItemId, "ItemId");
uuid_newtype!(UnitId, "UnitId");
uuid_newtype!(WarehouseId, "WarehouseId");
uuid_newtype!(BinId, "BinId");
uuid_newtype!(GoodsIssueId, "GoodsIssueId");
uuid_newtype!(GoodsIssueLineId, "GoodsIssueLineId");
uuid_newtype!(GoodsReceiptId, "GoodsReceiptId");
uuid_newtype!(LedgerEntryId, "LedgerEntryId");
uuid_newtype!(JournalEntryId, "JournalEntryId");
uuid_newtype!(
    /// Concrete general-ledger account (chart of accounts row).
    AccountId,
    "AccountId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage_with_type_name() {
        let err = "not-a-uuid".parse::<ItemId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("ItemId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = WarehouseId::new();
        let parsed: WarehouseId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
