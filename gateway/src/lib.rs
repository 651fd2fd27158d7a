// gateway/src/lib.rs
pub mod api;
pub mod applications;
pub mod auth;
pub mod catalog;
pub mod client_registry;
pub mod commands;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod socket;
pub mod state;
pub mod static_files;

pub use error::GatewayError;
pub use state::Gateway;

/// Asks a background actor to stop
#[derive(Debug, Clone, Copy, actix::Message)]
#[rtype(result = "()")]
pub struct Shutdown;
