use serde::{Deserialize, Serialize};

/// Declares a row identifier newtype.
///
/// Every table in the POS schema is keyed by a 64-bit integer. Wrapping each
/// key in its own type keeps a product id from being passed where an
/// ingredient id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw database value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a menu product.
    ProductId
);

row_id!(
    /// Identifier of a stock-tracked ingredient.
    ///
    /// The derived `Ord` is the global lock order: ingredients touched by one
    /// transaction are always locked in ascending id.
    IngredientId
);

row_id!(
    /// Identifier of a placed order.
    OrderId
);

row_id!(
    /// Identifier of a staff member (cashier, kitchen, manager).
    StaffId
);

row_id!(
    /// Identifier of a loyalty customer.
    CustomerId
);

row_id!(
    /// Identifier of an ingredient supplier.
    SupplierId
);

row_id!(
    /// Identifier of an inventory ledger entry.
    LedgerEntryId
);
