use crate::domain::model::{
    expiry_from, RegistrationForm, RegistrationReceipt, Session, SessionState, StoredTokens, Subject,
};
use crate::domain::ports::{AuthApi, TokenStore};
use crate::utils::error::{ApiError, ConsoleError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTRATION_FALLBACK: &str = "Registration failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshFailure {
    NoRefreshToken,
    SessionExpired,
}

impl From<RefreshFailure> for ConsoleError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::NoRefreshToken => ConsoleError::NoRefreshToken,
            RefreshFailure::SessionExpired => ConsoleError::SessionExpired,
        }
    }
}

type RefreshFlight = Shared<BoxFuture<'static, std::result::Result<String, RefreshFailure>>>;

/// The refresh call currently in flight, if any. `generation` identifies it so
/// only that flight can clear the slot.
#[derive(Default)]
struct RefreshSlot {
    generation: u64,
    flight: Option<RefreshFlight>,
}

/// Owns "who is logged in" and is the only writer of the token store.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TokenStore>,
    auth: Arc<dyn AuthApi>,
    state: watch::Sender<SessionState>,
    in_flight: Mutex<RefreshSlot>,
}

fn label(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unknown => "unknown",
        SessionState::Restoring => "restoring",
        SessionState::Authenticated(_) => "authenticated",
        SessionState::RefreshingToken(_) => "refreshing_token",
        SessionState::Anonymous => "anonymous",
    }
}

impl Inner {
    fn set_state(&self, next: SessionState) {
        let to = label(&next);
        let previous = self.state.send_replace(next);
        let from = label(&previous);
        if from != to {
            tracing::info!(from, to, "session state changed");
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    async fn load_tokens(&self) -> Option<StoredTokens> {
        match self.store.load().await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "token store unreadable, treating as empty");
                None
            }
        }
    }

    /// Clears persisted tokens and drops to `Anonymous` without calling the service.
    async fn drop_local_session(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "failed to clear token store");
        }
        self.set_state(SessionState::Anonymous);
    }

    /// Best-effort remote logout, then local cleanup. Never fails.
    async fn end_session(&self) {
        let token = match self.current_session() {
            Some(session) => Some(session.access_token),
            None => self.load_tokens().await.map(|t| t.access_token),
        };

        if let Some(token) = token {
            if let Err(e) = self.auth.logout(&token).await {
                tracing::warn!(error = %e, "remote logout failed, clearing local session anyway");
            }
        }

        self.drop_local_session().await;
    }

    async fn refresh_once(self: Arc<Self>) -> std::result::Result<String, RefreshFailure> {
        let stored = self.load_tokens().await;
        let Some((stored, refresh_token)) =
            stored.and_then(|t| t.refresh_token.clone().map(|r| (t, r)))
        else {
            tracing::warn!("token refresh requested but no refresh token is stored");
            if self.current_session().is_some() {
                self.drop_local_session().await;
            }
            return Err(RefreshFailure::NoRefreshToken);
        };

        if let Some(session) = self.current_session() {
            self.set_state(SessionState::RefreshingToken(session));
        }

        match self.auth.refresh(&refresh_token).await {
            Ok(grant) => {
                // A logout that landed while the call was in flight wins.
                let ended = matches!(
                    *self.state.borrow(),
                    SessionState::Anonymous | SessionState::Unknown
                );
                if ended {
                    tracing::info!("session ended during token refresh, discarding new token");
                    return Err(RefreshFailure::SessionExpired);
                }

                let expires_at = expiry_from(grant.expires_in);
                let updated = StoredTokens {
                    access_token: grant.access_token.clone(),
                    expires_at,
                    ..stored
                };
                if let Err(e) = self.store.save(&updated).await {
                    tracing::warn!(error = %e, "failed to persist refreshed access token");
                }

                if let Some(mut session) = self.current_session() {
                    session.access_token = grant.access_token.clone();
                    session.expires_at = expires_at;
                    self.set_state(SessionState::Authenticated(session));
                }

                tracing::info!("access token refreshed");
                Ok(grant.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, ending session");
                self.end_session().await;
                Err(RefreshFailure::SessionExpired)
            }
        }
    }
}

fn login_error(err: ApiError) -> ConsoleError {
    match err {
        ApiError::Timeout | ApiError::Network { .. } => ConsoleError::ServiceUnavailable(err),
        other => ConsoleError::InvalidCredentials {
            message: other
                .server_message()
                .unwrap_or(LOGIN_FALLBACK)
                .to_string(),
        },
    }
}

fn registration_error(err: ApiError) -> ConsoleError {
    match err {
        ApiError::Timeout | ApiError::Network { .. } => ConsoleError::ServiceUnavailable(err),
        other => ConsoleError::RegistrationFailed {
            message: other
                .server_message()
                .unwrap_or(REGISTRATION_FALLBACK)
                .to_string(),
        },
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>, auth: Arc<dyn AuthApi>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            inner: Arc::new(Inner {
                store,
                auth,
                state,
                in_flight: Mutex::new(RefreshSlot::default()),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receives every state transition, for UI re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn current_subject(&self) -> Option<Subject> {
        self.inner.current_session().map(|s| s.subject)
    }

    /// The access token to stamp on the next call, read at call time.
    pub fn access_token(&self) -> Option<String> {
        self.inner.current_session().map(|s| s.access_token)
    }

    /// Startup recovery from the token store. Always ends `Authenticated` or `Anonymous`.
    pub async fn restore(&self) -> SessionState {
        self.inner.set_state(SessionState::Restoring);

        let stored = match self.inner.load_tokens().await {
            Some(tokens) => tokens,
            None => {
                self.inner.set_state(SessionState::Anonymous);
                return self.state();
            }
        };
        let Some(refresh_token) = stored.refresh_token.clone() else {
            tracing::info!("stored session has no refresh token, discarding it");
            self.inner.drop_local_session().await;
            return self.state();
        };

        let (access_token, subject) = match self.inner.auth.whoami(&stored.access_token).await {
            Ok(subject) => (stored.access_token.clone(), subject),
            Err(e) => {
                tracing::info!(error = %e, "stored access token rejected, attempting refresh");
                let Ok(token) = self.refresh().await else {
                    return self.state();
                };
                match self.inner.auth.whoami(&token).await {
                    Ok(subject) => (token, subject),
                    Err(e) => {
                        tracing::warn!(error = %e, "session could not be restored after refresh");
                        self.inner.end_session().await;
                        return self.state();
                    }
                }
            }
        };

        // Only the access token may have changed since load.
        let expires_at = self
            .inner
            .load_tokens()
            .await
            .and_then(|t| t.expires_at)
            .or(stored.expires_at);

        tracing::info!(subject_id = %subject.id, "session restored");
        self.inner.set_state(SessionState::Authenticated(Session {
            subject,
            access_token,
            refresh_token,
            expires_at,
        }));
        self.state()
    }

    /// On failure any prior session is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<Subject> {
        let grant = self
            .inner
            .auth
            .login(email, password)
            .await
            .map_err(login_error)?;

        let expires_at = expiry_from(grant.expires_in);
        let tokens = StoredTokens {
            access_token: grant.access_token.clone(),
            refresh_token: Some(grant.refresh_token.clone()),
            subject_id: grant.teacher.id.clone(),
            expires_at,
        };
        self.inner.store.save(&tokens).await?;

        tracing::info!(subject_id = %grant.teacher.id, "login succeeded");
        self.inner.set_state(SessionState::Authenticated(Session {
            subject: grant.teacher.clone(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at,
        }));
        Ok(grant.teacher)
    }

    /// Creates an account. Does not log in and does not touch the current session.
    pub async fn register(&self, form: &RegistrationForm) -> Result<RegistrationReceipt> {
        let receipt = self
            .inner
            .auth
            .register(form)
            .await
            .map_err(registration_error)?;
        tracing::info!(teacher_id = %receipt.teacher_id, "registration succeeded");
        Ok(receipt)
    }

    /// Always ends `Anonymous` with an empty token store; remote errors are only logged.
    pub async fn logout(&self) {
        self.inner.end_session().await;
    }

    /// Obtains a new access token. Concurrent callers share one in-flight refresh call.
    pub async fn refresh(&self) -> Result<String> {
        let flight = self.join_refresh().await;
        flight.await.map_err(ConsoleError::from)
    }

    /// Returns the in-flight refresh, starting one if none is running. The flight
    /// empties the slot itself when it settles, even if every caller has gone.
    async fn join_refresh(&self) -> RefreshFlight {
        let mut slot = self.inner.in_flight.lock().await;
        if let Some(flight) = slot.flight.as_ref() {
            tracing::debug!("joining in-flight token refresh");
            return flight.clone();
        }

        slot.generation += 1;
        let generation = slot.generation;
        let inner = Arc::clone(&self.inner);
        let flight = async move {
            let outcome = Arc::clone(&inner).refresh_once().await;
            let mut slot = inner.in_flight.lock().await;
            if slot.generation == generation {
                slot.flight = None;
            }
            outcome
        }
        .boxed()
        .shared();

        slot.flight = Some(flight.clone());
        flight
    }
}
