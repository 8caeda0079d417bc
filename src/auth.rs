use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Role granting access to the /cards surface. Identities holding any other
/// role are authenticated but receive 403 before any record lookup.
pub const ROLE_CARD_OWNER: &str = "card-owner";

/// AuthUser
///
/// The resolved identity of an authenticated request. This is the core output
/// of the Basic-auth extractor; handlers use the `username` as the caller
/// identity for every ownership decision.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The principal name, and the authorization key for all per-card operations.
    pub username: String,
    /// The RBAC field: 'card-owner' or 'non-owner'.
    pub role: String,
}

/// UserAccount
///
/// What the user store hands back for a successfully verified credential pair.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    pub role: String,
}

/// UserStore Trait
///
/// The authentication collaborator: resolves a username/password pair to an
/// identity and role, or nothing. Verification is pure in-memory work, so the
/// trait is synchronous; it still lives behind an Arc so the store can be
/// swapped in tests.
pub trait UserStore: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Option<UserAccount>;
}

/// UserStoreState
///
/// The concrete type used to share the user store across the application state.
pub type UserStoreState = Arc<dyn UserStore>;

// --- In-Memory Store ---

struct StoredUser {
    salt: String,
    digest: String,
    role: String,
}

/// InMemoryUserStore
///
/// Credential store holding salted SHA-256 password digests, keyed by
/// username. Plaintext passwords are hashed at insertion and never retained.
pub struct InMemoryUserStore {
    users: HashMap<String, StoredUser>,
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    /// Adds a user, hashing the plaintext password with the given salt.
    pub fn with_user(mut self, username: &str, password: &str, salt: &str, role: &str) -> Self {
        self.users.insert(
            username.to_string(),
            StoredUser {
                salt: salt.to_string(),
                digest: digest_password(salt, password),
                role: role.to_string(),
            },
        );
        self
    }

    /// seeded
    ///
    /// The development user set carried over from the original system: two
    /// card owners and one authenticated identity without the owner role.
    /// Used in Env::Local when no CARD_USERS spec is configured, and by tests.
    pub fn seeded() -> Self {
        Self::new()
            .with_user("sarah1", "abc123", "s1", ROLE_CARD_OWNER)
            .with_user("kumar2", "xyz789", "k2", ROLE_CARD_OWNER)
            .with_user("hank-owns-no-cards", "qrs456", "h1", "non-owner")
    }

    /// from_spec
    ///
    /// Parses the CARD_USERS configuration value: comma-separated
    /// `username:role:salt:sha256hex` entries. Digests are stored as given, so
    /// no plaintext password ever reaches the environment.
    pub fn from_spec(spec: &str) -> Result<Self, String> {
        let mut store = Self::new();
        for entry in spec.split(',').filter(|e| !e.trim().is_empty()) {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            let [username, role, salt, digest] = parts[..] else {
                return Err(format!(
                    "invalid CARD_USERS entry '{}': expected username:role:salt:sha256hex",
                    entry.trim()
                ));
            };
            if username.is_empty() || digest.len() != 64 {
                return Err(format!("invalid CARD_USERS entry '{}'", entry.trim()));
            }
            store.users.insert(
                username.to_string(),
                StoredUser {
                    salt: salt.to_string(),
                    digest: digest.to_string(),
                    role: role.to_string(),
                },
            );
        }
        Ok(store)
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for InMemoryUserStore {
    fn authenticate(&self, username: &str, password: &str) -> Option<UserAccount> {
        let stored = self.users.get(username)?;
        if digest_password(&stored.salt, password) != stored.digest {
            return None;
        }
        Some(UserAccount {
            username: username.to_string(),
            role: stored.role.clone(),
        })
    }
}

// --- Extractor ---

/// parse_basic_credentials
///
/// Decodes an `Authorization: Basic <base64(user:pass)>` header value into the
/// credential pair. Passwords may contain ':'; only the first separator splits.
pub fn parse_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any protected handler. Authentication is separated
/// from business logic: handlers only ever see a resolved identity.
///
/// The process:
/// 1. Dependency resolution: pull the UserStore from the application state.
/// 2. Header extraction: Authorization header with the Basic scheme.
/// 3. Verification: salted-digest comparison against the store.
///
/// Rejection: StatusCode::UNAUTHORIZED (401) on any failure. The role gate is
/// not applied here; that happens in the /cards route middleware so the
/// role-level 403 stays distinct from credential-level 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserStoreState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let users = UserStoreState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let (username, password) =
            parse_basic_credentials(auth_header).ok_or(StatusCode::UNAUTHORIZED)?;

        let account = users
            .authenticate(&username, &password)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            username: account.username,
            role: account.role,
        })
    }
}
