//! Closed vocabularies stored as text columns.
//!
//! Each enum round-trips through the exact string the schema's `CHECK`
//! constraint accepts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

macro_rules! text_enum {
    ($name:ident, $err:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CoreError::$err(other.to_string())),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Mod,
    Buyer,
}

text_enum!(Role, InvalidRole, {
    Admin => "admin",
    Mod => "mod",
    Buyer => "buyer",
});

impl Role {
    /// Admins and moderators run the back office.
    #[must_use]
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Mod)
    }

    /// Roles an admin may hand out when creating or re-roling an account.
    #[must_use]
    pub fn is_assignable(self) -> bool {
        matches!(self, Role::Mod | Role::Buyer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
    Banned,
}

text_enum!(UserStatus, InvalidUserStatus, {
    Active => "active",
    Suspended => "suspended",
    Banned => "banned",
});

impl UserStatus {
    #[must_use]
    pub fn is_active(self) -> bool {
        self == UserStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Available,
    Sold,
}

text_enum!(ProductStatus, InvalidProductStatus, {
    Available => "Available",
    Sold => "Sold",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, InvalidOrderStatus, {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Buyers may cancel only before the parcel leaves.
    #[must_use]
    pub fn is_cancellable_by_buyer(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}
