//! Credential verification and session lifecycle
//!
//! The authenticator is the single translation boundary for auth errors:
//! whatever failed underneath (unknown user, wrong password, bad token,
//! dead session), callers see `InvalidCredentials`; only infrastructure
//! failures surface as `Internal`.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_db::{Database, DbError, User};
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::password::verify_password;
use crate::registry::{NewSession, RegistryError, SessionStore};
use crate::token::{ClaimType, IdentityClaims, TokenCodec};

/// Valid Argon2 hash verified when the username does not resolve, so the
/// missing-user path costs the same as the wrong-password path.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// User lookup capability consumed by the authenticator. This crate never
/// writes through it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<User, DbError>;
}

#[async_trait]
impl UserStore for Database {
    async fn find_by_username(&self, username: &str) -> Result<User, DbError> {
        self.find_user_by_username(username).await
    }
}

/// Outcome of a successful `authenticate` call.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claim_type: ClaimType,
    pub session_id: String,
}

/// Identity attributes stamped into the request context once a bearer
/// token has been verified against a live session. Handlers learn who is
/// calling exclusively through this.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub user_id: String,
    pub username: String,
    pub super_user: bool,
}

/// The process-wide authentication authority.
///
/// Constructed once at startup and shared by every request handler;
/// sessions and the signing secret live nowhere else.
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    codec: TokenCodec,
}

impl Authenticator {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            users,
            sessions,
            codec,
        }
    }

    /// Verify a username/password pair and open a session for it.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        let user = match self.users.find_by_username(username).await {
            Ok(user) => Some(user),
            Err(DbError::NotFound(_)) => None,
            Err(DbError::Ambiguous(_)) => {
                warn!("Multiple live rows for username, refusing to authenticate");
                None
            }
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        };

        // Always run a verification, against a dummy hash if need be.
        let hash = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| DUMMY_HASH.to_string());
        let password_valid = verify_password(password, &hash)?;

        let user = match (user, password_valid) {
            (Some(user), true) => user,
            _ => return Err(AuthError::InvalidCredentials),
        };

        let session_id = self
            .sessions
            .add(NewSession {
                user_id: user.id.clone(),
                claim_type: ClaimType::Internal,
                super_user: user.superuser,
            })
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        debug!("Opened session for user: {}", user.username);

        Ok(AuthenticatedUser {
            user,
            claim_type: ClaimType::Internal,
            session_id,
        })
    }

    /// Issue a bearer token for a freshly authenticated user.
    pub fn encode_token(&self, auth: &AuthenticatedUser) -> Result<String, AuthError> {
        self.codec.issue(
            &auth.user.id,
            &auth.user.username,
            auth.claim_type,
            &auth.session_id,
        )
    }

    /// Check a bearer `Authorization` header value against the session
    /// registry and return the verified identity.
    pub async fn verify_credentials(
        &self,
        auth_header: Option<&str>,
    ) -> Result<AuthIdentity, AuthError> {
        let claims = self.decode_header(auth_header)?;

        let session = match self.sessions.get(&claims.session_id).await {
            Ok(session) => session,
            Err(RegistryError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        };

        Ok(AuthIdentity {
            user_id: claims.sub,
            username: claims.username,
            super_user: session.super_user,
        })
    }

    /// Evict the session embedded in the presented bearer token.
    ///
    /// Evicting a session that is already gone succeeds; a missing or
    /// garbled token is still an error.
    pub async fn invalidate_session(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        let claims = self.decode_header(auth_header)?;

        self.sessions
            .evict(&claims.session_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    fn decode_header(&self, auth_header: Option<&str>) -> Result<IdentityClaims, AuthError> {
        let header = auth_header.ok_or(AuthError::MissingAuthHeader)?;
        let token = bearer_token(header)?;
        self.codec
            .decode(token)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use crate::registry::InMemorySessionStore;
    use chrono::Utc;
    use std::time::Duration;

    struct StubUserStore {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserStore for StubUserStore {
        async fn find_by_username(&self, username: &str) -> Result<User, DbError> {
            let matches: Vec<&User> = self
                .users
                .iter()
                .filter(|u| u.username == username)
                .collect();
            match matches.len() {
                0 => Err(DbError::NotFound(format!("user: {username}"))),
                1 => Ok(matches[0].clone()),
                _ => Err(DbError::Ambiguous(format!("user: {username}"))),
            }
        }
    }

    fn test_user(username: &str, password: &str, superuser: bool) -> User {
        let now = Utc::now();
        User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: hash_password(password).unwrap(),
            superuser,
            created_at: now,
            updated_at: now,
        }
    }

    fn authenticator(users: Vec<User>) -> (Authenticator, Arc<InMemorySessionStore>) {
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(3600)));
        let auth = Authenticator::new(
            Arc::new(StubUserStore { users }),
            sessions.clone(),
            TokenCodec::new("test-secret-key", 24),
        );
        (auth, sessions)
    }

    #[tokio::test]
    async fn test_authenticate_success_creates_session() {
        let user = test_user("alice", "correct-pw", false);
        let user_id = user.id.clone();
        let (auth, sessions) = authenticator(vec![user]);

        let outcome = auth.authenticate("alice", "correct-pw").await.unwrap();
        assert_eq!(outcome.user.id, user_id);
        assert_eq!(outcome.claim_type, ClaimType::Internal);

        let session = sessions.get(&outcome.session_id).await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(!session.super_user);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let (auth, sessions) = authenticator(vec![test_user("alice", "correct-pw", false)]);

        let err = auth.authenticate("alice", "wrong-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user_looks_like_wrong_password() {
        let (auth, sessions) = authenticator(vec![]);

        let err = auth.authenticate("nobody", "whatever").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_user_rows_refused() {
        let (auth, _) = authenticator(vec![
            test_user("alice", "correct-pw", false),
            test_user("alice", "correct-pw", false),
        ]);

        let err = auth.authenticate("alice", "correct-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_verify_credentials_round_trip() {
        let user = test_user("alice", "correct-pw", true);
        let user_id = user.id.clone();
        let (auth, _) = authenticator(vec![user]);

        let outcome = auth.authenticate("alice", "correct-pw").await.unwrap();
        let token = auth.encode_token(&outcome).unwrap();
        let header = format!("Bearer {token}");

        let identity = auth.verify_credentials(Some(&header)).await.unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "alice");
        assert!(identity.super_user);
    }

    #[tokio::test]
    async fn test_verify_credentials_missing_header() {
        let (auth, _) = authenticator(vec![]);

        assert!(auth.verify_credentials(None).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_credentials_after_eviction() {
        let (auth, sessions) = authenticator(vec![test_user("alice", "correct-pw", false)]);

        let outcome = auth.authenticate("alice", "correct-pw").await.unwrap();
        let token = auth.encode_token(&outcome).unwrap();
        let header = format!("Bearer {token}");

        sessions.evict(&outcome.session_id).await.unwrap();

        let err = auth.verify_credentials(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_expired_token_fails_even_with_live_session() {
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(3600)));
        let auth = Authenticator::new(
            Arc::new(StubUserStore {
                users: vec![test_user("alice", "correct-pw", false)],
            }),
            sessions.clone(),
            TokenCodec::new("test-secret-key", -2),
        );

        let outcome = auth.authenticate("alice", "correct-pw").await.unwrap();
        let token = auth.encode_token(&outcome).unwrap();
        let header = format!("Bearer {token}");

        // The session outlives the token here
        assert!(sessions.get(&outcome.session_id).await.is_ok());

        let err = auth.verify_credentials(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_invalidate_session_then_reuse() {
        let (auth, _) = authenticator(vec![test_user("alice", "correct-pw", false)]);

        let outcome = auth.authenticate("alice", "correct-pw").await.unwrap();
        let token = auth.encode_token(&outcome).unwrap();
        let header = format!("Bearer {token}");

        auth.verify_credentials(Some(&header)).await.unwrap();
        auth.invalidate_session(Some(&header)).await.unwrap();

        let err = auth.verify_credentials(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_invalidate_session_garbled_token() {
        let (auth, _) = authenticator(vec![]);

        assert!(auth.invalidate_session(Some("Bearer garbage")).await.is_err());
        assert!(auth.invalidate_session(None).await.is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer abc").unwrap(), "abc");
        assert!(bearer_token("Basic abc").is_err());
        assert!(bearer_token("Bearer").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }
}
