//! HTTP surface: per-route authentication guard, router and server.

mod auth;
mod router;
mod server;

pub use auth::{AuthGuard, auth_middleware};
pub use router::create_router;
pub use server::Server;
