//! Session store: who is logged in, and with which token.
//!
//! The token is written through to [`TokenStorage`] on every change, so a
//! store constructed later over the same storage starts from the same token.
//! The user profile is never persisted; it is re-fetched from `/auth/me`.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::api::ApiClient;
use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{NewUser, TokenResponse, User};
use crate::storage::{TOKEN_KEY, TokenStorage};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const ME_PATH: &str = "/auth/me";

/// Snapshot of the session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<User>,
    token: Option<SecretString>,
}

impl Session {
    /// The logged-in user's profile, once fetched.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The bearer token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// True iff a non-empty token is held.
    ///
    /// This is optimistic: a restored token counts as authenticated until the
    /// backend rejects it.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

/// Store owning the session identity.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<AuthStoreInner>,
}

struct AuthStoreInner {
    api: ApiClient,
    state: watch::Sender<Session>,
}

impl AuthStore {
    /// Create the store, loading any token persisted in the API client's
    /// storage.
    ///
    /// No request is made here; see [`AuthStore::restore_session`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub fn new(api: ApiClient) -> Result<Self> {
        let token = api
            .storage()
            .get(TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        debug!(has_token = token.is_some(), "Auth store initialized");

        let (state, _) = watch::channel(Session { user: None, token });
        Ok(Self {
            inner: Arc::new(AuthStoreInner { api, state }),
        })
    }

    fn storage(&self) -> &Arc<dyn TokenStorage> {
        self.inner.api.storage()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner.state.borrow().token.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    // =========================================================================
    // Local mutations
    // =========================================================================

    /// Replace the token, writing through to storage.
    ///
    /// `None` or an empty token removes the persisted entry. Storage is
    /// updated first; if that fails the in-memory token is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn set_token(&self, token: Option<SecretString>) -> Result<()> {
        let token = token.filter(|t| !t.expose_secret().is_empty());

        match &token {
            Some(t) => self.storage().set(TOKEN_KEY, t.expose_secret())?,
            None => self.storage().remove(TOKEN_KEY)?,
        }

        self.inner.state.send_modify(|s| s.token = token);
        Ok(())
    }

    /// Replace the user profile. No validation, no request.
    pub fn set_user(&self, user: Option<User>) {
        self.inner.state.send_modify(|s| s.user = user);
    }

    /// Drop the token and the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed; the
    /// session is then left as it was.
    pub fn logout(&self) -> Result<()> {
        self.set_token(None)?;
        self.set_user(None);
        clear_sentry_user();
        add_breadcrumb("auth", "Logged out", None);
        Ok(())
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    /// Log in with a username and password.
    ///
    /// Credentials are sent form-encoded. On success the token is stored,
    /// the profile is fetched, and the raw token response is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the login request fails or the token cannot be
    /// persisted. A failing profile fetch afterwards is not an error here;
    /// it logs the session out instead (see [`AuthStore::fetch_user`]).
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<TokenResponse> {
        let form = [("username", username), ("password", password.expose_secret())];
        let response: TokenResponse = self.inner.api.post_form(LOGIN_PATH, &form).await?;

        self.set_token(Some(response.access_token.clone()))?;
        add_breadcrumb("auth", "Logged in", Some(&[("username", username)]));

        self.fetch_user().await;
        Ok(response)
    }

    /// Register a new account, then log in with the same credentials.
    ///
    /// Returns the profile the registration endpoint answered with.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails, or if the follow-up login
    /// fails. In the latter case the account exists but no session was
    /// established; nothing is rolled back.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn register(&self, new_user: &NewUser) -> Result<User> {
        let user: User = self.inner.api.post_json(REGISTER_PATH, new_user).await?;
        debug!(user_id = %user.id, "Registered");

        self.login(&new_user.username, &new_user.password).await?;
        Ok(user)
    }

    /// Fetch the current user's profile with the stored token.
    ///
    /// Any failure (expired token, network error, server error) logs the
    /// session out. Returns the profile on success.
    #[instrument(skip(self))]
    pub async fn fetch_user(&self) -> Option<User> {
        match self.inner.api.get::<User>(ME_PATH).await {
            Ok(user) => {
                set_sentry_user(&user.id, &user.username, Some(user.email.as_str()));
                self.set_user(Some(user.clone()));
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user, logging out");
                if let Err(e) = self.logout() {
                    tracing::error!(error = %e, "Failed to clear session after rejected token");
                }
                None
            }
        }
    }

    /// Validate a token left over from a previous run.
    ///
    /// If a token was loaded at construction, [`AuthStore::fetch_user`] is
    /// spawned in the background and the returned handle can be awaited or
    /// dropped (the task keeps running either way). Without a token the
    /// handle is inert.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while a token is present.
    #[must_use = "await the handle to wait for the profile, or drop it to restore in the background"]
    pub fn restore_session(&self) -> SessionRestore {
        if !self.is_authenticated() {
            return SessionRestore { handle: None };
        }

        let store = self.clone();
        SessionRestore {
            handle: Some(tokio::spawn(async move { store.fetch_user().await })),
        }
    }
}

/// Handle to a background session restore started by
/// [`AuthStore::restore_session`].
#[derive(Debug)]
pub struct SessionRestore {
    handle: Option<JoinHandle<Option<User>>>,
}

impl SessionRestore {
    /// A handle with nothing to wait for.
    #[must_use]
    pub const fn none() -> Self {
        Self { handle: None }
    }

    /// Whether a restore was started and has not finished yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the restore to finish.
    ///
    /// Returns the restored profile, or `None` if there was no token or the
    /// token was rejected (in which case the session has been cleared).
    pub async fn wait(self) -> Option<User> {
        let handle = self.handle?;
        match handle.await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, "Session restore task failed");
                None
            }
        }
    }
}
