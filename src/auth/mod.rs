// auth/mod.rs - Session tokens and password hashing

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::Store;
use crate::middleware::auth::{Principal, PrincipalResolver};

/// Only the account id travels in the token; `SessionResolver` reads name
/// and email from the store so profile changes apply to live sessions.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(principal: &Principal, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: principal.id,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// HS256 session tokens signed with the configured secret
#[derive(Clone)]
pub struct JwtSessions {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: u64,
}

impl JwtSessions {
    pub fn new(security: &SecurityConfig) -> Result<Self, JwtError> {
        if security.jwt_secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(security.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(security.jwt_secret.as_bytes()),
            expiry_hours: security.jwt_expiry_hours,
        })
    }

    pub fn expires_in_secs(&self) -> u64 {
        self.expiry_hours * 3600
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, JwtError> {
        let claims = Claims::new(principal, self.expiry_hours);
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Decode and verify a token; expired or tampered tokens yield `None`
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                None
            }
        }
    }
}

/// Verifies the token, then loads the account so name and email are current.
/// A token for a deleted account does not resolve.
pub struct SessionResolver {
    sessions: Arc<JwtSessions>,
    store: Arc<dyn Store>,
}

impl SessionResolver {
    pub fn new(sessions: Arc<JwtSessions>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }
}

#[async_trait]
impl PrincipalResolver for SessionResolver {
    async fn resolve(&self, token: &str) -> Option<Principal> {
        let claims = self.sessions.verify(token)?;
        match self.store.find_user_by_id(claims.sub).await {
            Ok(user) => user.map(|user| Principal {
                id: user.id,
                email: user.email,
                name: user.name,
            }),
            Err(e) => {
                tracing::error!("Failed to load session account {}: {}", claims.sub, e);
                None
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("Password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Verified against when the account does not exist, so unknown emails cost
/// the same as wrong passwords
static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("decoy-password").ok());

/// `hash_password` on the blocking pool
pub async fn hash_in_background(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await?
        .map_err(PasswordError::Hash)
}

/// `verify_password` on the blocking pool. A missing hash runs a decoy
/// verification and always yields `false`.
pub async fn verify_in_background(
    password: String,
    stored_hash: Option<String>,
) -> Result<bool, PasswordError> {
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(decoy) = DECOY_HASH.as_deref() {
                verify_password(&password, decoy);
            }
            false
        }
    })
    .await?;
    Ok(verified)
}

/// Argon2id hash in PHC string format
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Unparseable stored hashes never verify
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{NewUser, UserChanges};
    use crate::database::{MemoryStore, UserRepository};

    fn sessions() -> Arc<JwtSessions> {
        Arc::new(JwtSessions::new(&AppConfig::development().security).unwrap())
    }

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "ana@farmacia.com".into(),
            name: "Ana".into(),
        }
    }

    async fn resolver_with_account() -> (SessionResolver, Arc<MemoryStore>, Principal) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                name: "Ana".into(),
                email: "ana@farmacia.com".into(),
                password_hash: "$argon2id$unused".into(),
            })
            .await
            .unwrap();
        let who = Principal { id: user.id, email: user.email, name: user.name };
        (SessionResolver::new(sessions(), store.clone()), store, who)
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut security = AppConfig::development().security;
        security.jwt_secret.clear();
        assert!(matches!(JwtSessions::new(&security), Err(JwtError::InvalidSecret)));
    }

    #[tokio::test]
    async fn issued_tokens_resolve_to_the_account() {
        let (resolver, _, who) = resolver_with_account().await;
        let token = resolver.sessions.issue(&who).unwrap();

        assert_eq!(resolver.resolve(&token).await, Some(who));
    }

    #[tokio::test]
    async fn resolved_profile_follows_the_store() {
        let (resolver, store, who) = resolver_with_account().await;
        let token = resolver.sessions.issue(&who).unwrap();

        store
            .update_user(
                who.id,
                UserChanges { name: Some("Ana Souza".into()), ..Default::default() },
            )
            .await
            .unwrap();

        let resolved = resolver.resolve(&token).await.unwrap();
        assert_eq!(resolved.name, "Ana Souza");
        assert_eq!(resolved.email, "ana@farmacia.com");
    }

    #[tokio::test]
    async fn tokens_for_unknown_accounts_do_not_resolve() {
        let (resolver, _, _) = resolver_with_account().await;
        let token = resolver.sessions.issue(&principal()).unwrap();
        assert!(resolver.resolve(&token).await.is_none());
    }

    #[test]
    fn tokens_carry_only_the_account_id() {
        let sessions = sessions();
        let who = principal();
        let token = sessions.issue(&who).unwrap();

        let raw = decode::<serde_json::Value>(&token, &sessions.decoding_key, &Validation::default())
            .unwrap()
            .claims;
        let mut keys: Vec<&str> = raw.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["exp", "iat", "sub"]);
        assert_eq!(raw["sub"], who.id.to_string());
    }

    #[test]
    fn tokens_signed_elsewhere_do_not_verify() {
        let mut other = AppConfig::development().security;
        other.jwt_secret = "another-secret".into();
        let token = JwtSessions::new(&other).unwrap().issue(&principal()).unwrap();

        let sessions = sessions();
        assert!(sessions.verify(&token).is_none());
        assert!(sessions.verify("not-a-jwt").is_none());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("Senha@123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Senha@123", &hash));
        assert!(!verify_password("Senha@124", &hash));
        assert!(!verify_password("Senha@123", "plain-text"));
    }

    #[tokio::test]
    async fn background_hashing_round_trips() {
        let hash = hash_in_background("Senha@123".into()).await.unwrap();
        assert!(verify_in_background("Senha@123".into(), Some(hash.clone())).await.unwrap());
        assert!(!verify_in_background("Senha@124".into(), Some(hash)).await.unwrap());
        assert!(!verify_in_background("Senha@123".into(), None).await.unwrap());
    }
}
