// gateway/src/auth/mod.rs
pub mod credentials;
pub mod session;

pub use credentials::{CredentialError, CredentialStore, User};
pub use session::{SessionService, TokenError, Viewer};
