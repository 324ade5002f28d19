//! Auth facade: identity, session, and the joined profile read.

use uuid::Uuid;

use crate::backend::{self, AuthEvent, AuthSubscription, Backend, Query};
use crate::error::Result;
use crate::models::{Profile, Session, SignUpMetadata, User};

/// Joined profile fetch, shared with the claims facade's submission path.
pub(crate) async fn fetch_profile(backend: &Backend, user_id: Uuid) -> Result<Profile> {
    let query = Query::table("profiles")
        .select("*, condo:condos(*)")
        .eq("id", user_id);
    let row = backend.records.select_single(&query).await?;
    backend::decode(row)
}

/// Thin facade over the hosted auth service.
#[derive(Clone)]
pub struct AuthFacade {
    backend: Backend,
}

impl AuthFacade {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create a new identity with name and vehicle metadata attached.
    /// Condo membership is established separately, via registration.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Session> {
        self.backend.auth.sign_up(email, password, metadata).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.backend.auth.sign_in(email, password).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.backend.auth.sign_out().await
    }

    /// The session's user, or `None` when unauthenticated. Absence of a
    /// session is not an error.
    pub async fn current_user(&self) -> Result<Option<User>> {
        self.backend.auth.current_user().await
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session> {
        self.backend.auth.refresh_session().await
    }

    /// The user's profile with their condo joined in.
    pub async fn user_profile(&self, user_id: Uuid) -> Result<Profile> {
        fetch_profile(&self.backend, user_id).await
    }

    /// Register a listener for auth transitions; it stays active until the
    /// returned handle is dropped or `unsubscribe`d.
    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        self.backend.auth.events().subscribe(Box::new(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn metadata() -> SignUpMetadata {
        SignUpMetadata {
            name: "Mei Tan".to_string(),
            vehicle_number: "SKL1234A".to_string(),
        }
    }

    #[tokio::test]
    async fn current_user_is_none_without_session() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        let user = auth.current_user().await.expect("current_user");
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn sign_up_then_current_user() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        let session = auth
            .sign_up("mei@example.com", "s3cret-pw", &metadata())
            .await
            .expect("sign_up");
        assert_eq!(session.user.email, "mei@example.com");

        let user = auth.current_user().await.expect("current_user");
        assert_eq!(user.expect("signed in").id, session.user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_auth_error() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        auth.sign_up("mei@example.com", "s3cret-pw", &metadata())
            .await
            .expect("first sign_up");
        let result = auth.sign_up("mei@example.com", "other-pw", &metadata()).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn bad_credentials_are_auth_error() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());
        backend
            .auth
            .register_user("mei@example.com", "s3cret-pw", "Mei Tan", "SKL1234A");

        let result = auth.sign_in("mei@example.com", "wrong").await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn user_profile_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        let result = auth.user_profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn user_profile_joins_condo() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());
        let condo = backend.seed_condo("Maple Court", "premium", 0.2);
        let user = backend.seed_resident(
            "mei@example.com",
            "s3cret-pw",
            "Mei Tan",
            "SKL1234A",
            &condo,
        );

        let profile = auth.user_profile(user.id).await.expect("profile");
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.condo_id, condo.id);
        assert_eq!(profile.condo.name, "Maple Court");
        assert!((profile.condo.rebate_rate - 0.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn auth_events_fire_in_order() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        let seen: Arc<Mutex<Vec<AuthEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = auth.on_auth_state_change(move |event, _session| {
            sink.lock().expect("event sink").push(event);
        });

        auth.sign_up("mei@example.com", "s3cret-pw", &metadata())
            .await
            .expect("sign_up");
        auth.refresh_session().await.expect("refresh");
        auth.sign_out().await.expect("sign_out");

        assert_eq!(
            *seen.lock().expect("event sink"),
            vec![
                AuthEvent::SignedIn,
                AuthEvent::TokenRefreshed,
                AuthEvent::SignedOut
            ]
        );
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn unsubscribed_listener_stops_receiving() {
        let backend = MemoryBackend::new();
        let auth = AuthFacade::new(backend.backend());

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let subscription = auth.on_auth_state_change(move |_, _| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        auth.sign_up("mei@example.com", "s3cret-pw", &metadata())
            .await
            .expect("sign_up");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        auth.sign_out().await.expect("sign_out");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
