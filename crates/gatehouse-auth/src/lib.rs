//! Gatehouse Authentication
//!
//! Session-backed JWT authentication: credential verification, token
//! issuance and validation, and the TTL-bounded session registry that
//! decides whether an identity is still logged in.

pub mod authenticator;
pub mod error;
pub mod password;
pub mod registry;
pub mod token;

pub use authenticator::{AuthIdentity, AuthenticatedUser, Authenticator, UserStore};
pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use registry::{InMemorySessionStore, NewSession, RegistryError, Session, SessionStore};
pub use token::{ClaimType, IdentityClaims, TokenCodec};
