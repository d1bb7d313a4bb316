//! Platform roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A role a user may hold on the platform.
///
/// `Provider` and `Consumer` are granted per resource server and carry a
/// scope (the set of resource server URLs). The others are presence-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Resource server administrator.
    Admin,
    /// Data provider on one or more resource servers.
    Provider,
    /// Data consumer on one or more resource servers.
    Consumer,
    /// May act on behalf of another user under a delegation grant.
    Delegate,
    /// The single platform (COS) administrator, configured by user id.
    CosAdmin,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Provider,
        Role::Consumer,
        Role::Delegate,
        Role::CosAdmin,
    ];

    /// Wire and storage name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Provider => "PROVIDER",
            Self::Consumer => "CONSUMER",
            Self::Delegate => "DELEGATE",
            Self::CosAdmin => "COS_ADMIN",
        }
    }

    /// Whether grants of this role are bound to resource servers.
    #[must_use]
    pub fn is_resource_scoped(self) -> bool {
        matches!(self, Self::Provider | Self::Consumer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}
