//! Staff roles and the capability table.
//!
//! Authorization is decided here, once, at the service boundary. Callers ask
//! [`Role::can`] instead of comparing role names.

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Staff role as issued by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cashier,
    Kitchen,
    Manager,
}

/// An action guarded by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    PlaceOrder,
    ViewOrder,
    UpdateOrderStatus,
    ViewInventory,
    AdjustInventory,
}

const CASHIER: &[Capability] = &[
    Capability::PlaceOrder,
    Capability::ViewOrder,
    Capability::UpdateOrderStatus,
];

const KITCHEN: &[Capability] = &[
    Capability::ViewOrder,
    Capability::UpdateOrderStatus,
    Capability::ViewInventory,
];

const MANAGER: &[Capability] = &[
    Capability::PlaceOrder,
    Capability::ViewOrder,
    Capability::UpdateOrderStatus,
    Capability::ViewInventory,
    Capability::AdjustInventory,
];

impl Role {
    /// Capabilities granted to this role.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Cashier => CASHIER,
            Role::Kitchen => KITCHEN,
            Role::Manager => MANAGER,
        }
    }

    /// Returns true if the role grants `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Fails with [`AccessError::Forbidden`] unless the role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), AccessError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                role: *self,
                capability,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::Kitchen => "kitchen",
            Role::Manager => "manager",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(Role::Cashier),
            "kitchen" => Ok(Role::Kitchen),
            "manager" => Ok(Role::Manager),
            other => Err(AccessError::UnknownRole(other.to_string())),
        }
    }
}
