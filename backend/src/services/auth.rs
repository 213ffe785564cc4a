//! Anonymous sessions and the identity-readiness gate
//!
//! Remote reads and writes are only allowed once an authenticated session
//! exists. Sessions are anonymous: the farmer code chosen at login only
//! scopes which ledger is used, it is not a credential.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

/// Session token service
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    access_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Session ID
    pub anonymous: bool,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// An authenticated (anonymous) session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            jwt_secret: config.secret.clone(),
            access_token_expiry: config.access_token_expiry,
        }
    }

    /// Start a new anonymous session
    pub fn issue_anonymous(&self) -> AppResult<(AuthSession, AuthTokens)> {
        let now = Utc::now();
        let session_id = Uuid::new_v4();
        let expires_at = now + Duration::seconds(self.access_token_expiry);

        let claims = Claims {
            sub: session_id.to_string(),
            anonymous: true,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::SignInFailed(format!("Token generation failed: {}", e)))?;

        tracing::info!(session_id = %session_id, "Issued anonymous session");

        Ok((
            AuthSession {
                session_id,
                expires_at,
            },
            AuthTokens {
                access_token,
                token_type: "Bearer".to_string(),
                expires_in: self.access_token_expiry,
            },
        ))
    }

    /// Validate a bearer token
    pub fn verify(&self, token: &str) -> AppResult<AuthSession> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        let session_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::InvalidToken)?;
        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or(AppError::InvalidToken)?;

        Ok(AuthSession {
            session_id,
            expires_at,
        })
    }
}

/// Source of authenticated sessions
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, `None` while signed out
    fn auth_state(&self) -> watch::Receiver<Option<AuthSession>>;

    /// Request an anonymous session; success shows up on [`auth_state`](Self::auth_state)
    async fn sign_in_anonymously(&self) -> AppResult<()>;
}

/// Provider that mints anonymous sessions in-process
pub struct AnonymousIdentityProvider {
    auth: AuthService,
    state: watch::Sender<Option<AuthSession>>,
}

impl AnonymousIdentityProvider {
    pub fn new(auth: AuthService) -> Self {
        let (state, _rx) = watch::channel(None);
        Self { auth, state }
    }

    /// End the current session
    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentityProvider {
    fn auth_state(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> AppResult<()> {
        let (session, _tokens) = self.auth.issue_anonymous()?;
        self.state.send_replace(Some(session));
        Ok(())
    }
}

/// Turn a provider's auth state into a readiness signal.
///
/// Whenever the provider reports no session, an anonymous sign-in is
/// requested; failures are logged and retrying is left to the provider.
pub fn spawn_readiness<P>(provider: Arc<P>) -> watch::Receiver<bool>
where
    P: IdentityProvider + ?Sized + 'static,
{
    let (ready_tx, ready_rx) = watch::channel(false);
    let mut auth_state = provider.auth_state();

    tokio::spawn(async move {
        loop {
            let signed_in = auth_state.borrow_and_update().is_some();
            ready_tx.send_if_modified(|ready| {
                let changed = *ready != signed_in;
                *ready = signed_in;
                changed
            });

            if !signed_in {
                if let Err(e) = provider.sign_in_anonymously().await {
                    tracing::error!("Anonymous sign-in failed: {}", e);
                }
            }

            tokio::select! {
                changed = auth_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ready_tx.closed() => break,
            }
        }
        tracing::debug!("Readiness watcher stopped");
    });

    ready_rx
}
