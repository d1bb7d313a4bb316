//! aaa-core — identity primitives shared between the auth service and the
//! services that consume a resolved caller identity.
//!
//! Nothing in this crate performs I/O. Values are built by the pipeline in
//! `aaa-server` and handed downstream read-only.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod grant;
pub mod identity;
pub mod role;

pub use grant::{ClientCredential, DelegationGrant, SecretAlgorithm};
pub use identity::{
    CredentialKind, DelegationContext, DisplayName, Identity, IdentityContext, ProviderScope,
};
pub use role::{ParseRoleError, Role};
