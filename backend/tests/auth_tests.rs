//! Anonymous session and readiness tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use kua_agro_backend::config::JwtConfig;
use kua_agro_backend::error::{AppError, AppResult};
use kua_agro_backend::services::{
    spawn_readiness, AnonymousIdentityProvider, AuthService, AuthSession, IdentityProvider,
};
use tokio::sync::watch;
use uuid::Uuid;

fn auth_service() -> AuthService {
    AuthService::new(&JwtConfig {
        secret: "test-secret".to_string(),
        access_token_expiry: 3600,
    })
}

/// Provider whose sign-in always fails
struct OfflineProvider {
    state: watch::Sender<Option<AuthSession>>,
    attempts: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for OfflineProvider {
    fn auth_state(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::SignInFailed("offline".to_string()))
    }
}

#[tokio::test]
async fn test_readiness_follows_anonymous_sign_in() {
    let provider = Arc::new(AnonymousIdentityProvider::new(auth_service()));
    let mut ready = spawn_readiness(provider.clone());

    ready.wait_for(|ready| *ready).await.unwrap();
    assert!(provider.auth_state().borrow().is_some());
}

#[tokio::test]
async fn test_sign_out_triggers_new_session() {
    let provider = Arc::new(AnonymousIdentityProvider::new(auth_service()));
    let mut ready = spawn_readiness(provider.clone());
    ready.wait_for(|ready| *ready).await.unwrap();

    let mut auth_state = provider.auth_state();
    let first = auth_state.borrow_and_update().clone().unwrap();

    provider.sign_out();
    let second = auth_state
        .wait_for(|session| matches!(session, Some(s) if s.session_id != first.session_id))
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_ne!(first.session_id, second.session_id);
    ready.wait_for(|ready| *ready).await.unwrap();
}

#[tokio::test]
async fn test_failed_sign_in_leaves_gate_closed() {
    let (state, _rx) = watch::channel(None);
    let provider = Arc::new(OfflineProvider {
        state,
        attempts: AtomicUsize::new(0),
    });
    let ready = spawn_readiness(provider.clone());

    tokio::task::yield_now().await;
    for _ in 0..10 {
        if provider.attempts.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(provider.attempts.load(Ordering::SeqCst), 1);
    assert!(!*ready.borrow());

    // A session arriving from elsewhere opens the gate
    let mut ready = ready;
    provider.state.send_replace(Some(AuthSession {
        session_id: Uuid::new_v4(),
        expires_at: Utc::now() + Duration::hours(1),
    }));
    ready.wait_for(|ready| *ready).await.unwrap();
}

#[test]
fn test_tokens_are_session_scoped() {
    let auth = auth_service();
    let (a, tokens_a) = auth.issue_anonymous().unwrap();
    let (b, tokens_b) = auth.issue_anonymous().unwrap();
    assert_ne!(a.session_id, b.session_id);
    assert_eq!(auth.verify(&tokens_a.access_token).unwrap().session_id, a.session_id);
    assert_eq!(auth.verify(&tokens_b.access_token).unwrap().session_id, b.session_id);
    assert!(matches!(auth.verify("not-a-token"), Err(AppError::InvalidToken)));
}
