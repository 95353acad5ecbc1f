use chrono::Utc;
use tracing::{info, warn};

use wayfarer_shared::ValidationError;
use wayfarer_store::{Profile, StorageKey};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::Session;

impl Client {
    /// Sign in against the remote auth service.
    ///
    /// A stored mock identity stays on disk but stops being authoritative.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let remote = self.remote();
        let auth = remote.sign_in(email, password).await?;

        let profile = match remote.fetch_profile(&auth.user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => fallback_profile(&auth.user_id, email),
            Err(e) => {
                warn!(user = %auth.user_id, error = %e, "profile fetch failed, using defaults");
                fallback_profile(&auth.user_id, email)
            }
        };

        info!(user = %profile.id, "signed in");
        self.set_session(Session::Authenticated(profile.clone()))?;
        Ok(profile)
    }

    /// Like [`Client::sign_in`], but falls back to a local identity when the
    /// backend cannot be reached.  Refusals (bad password, rate limit) are
    /// still returned as errors.
    pub async fn sign_in_or_offline(&self, email: &str, password: &str) -> Result<Profile> {
        match self.sign_in(email, password).await {
            Err(ClientError::Remote(e)) if e.is_unreachable() => {
                warn!(error = %e, "backend unreachable, continuing offline");
                self.continue_offline(username_from_email(email))
            }
            other => other,
        }
    }

    /// Use a client-only identity.  A previously stored one is reused,
    /// otherwise a new one is created for `username`.
    pub fn continue_offline(&self, username: &str) -> Result<Profile> {
        let profile = {
            let state = self.lock()?;
            let stored: Option<Profile> =
                state.database.load(StorageKey::MockUser).unwrap_or_else(|e| {
                    warn!(error = %e, "ignoring unreadable mock identity");
                    None
                });
            match stored {
                Some(profile) => profile,
                None => {
                    let username = username.trim();
                    if username.is_empty() {
                        return Err(ValidationError::TitleRequired.into());
                    }
                    Profile::mock(username)
                }
            }
        };

        info!(user = %profile.id, "continuing with local identity");
        self.set_session(Session::Mock(profile.clone()))?;
        Ok(profile)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let was_authenticated = self.read(|s| matches!(s.session, Session::Authenticated(_)))?;
        if was_authenticated {
            if let Err(e) = self.remote().sign_out().await {
                warn!(error = %e, "remote sign-out failed, clearing local session anyway");
            }
        }
        self.set_session(Session::Anonymous)?;
        info!("signed out");
        Ok(())
    }

    pub fn session(&self) -> Result<Session> {
        self.read(|s| s.session.clone())
    }

    fn set_session(&self, session: Session) -> Result<()> {
        let (user_id, mock, changed, total) = {
            let mut state = self.lock()?;
            let previous = std::mem::replace(&mut state.session, session);
            let saved = state
                .persist(StorageKey::MockUser)
                .and_then(|()| state.persist(StorageKey::MockActive));
            if let Err(e) = saved {
                state.session = previous;
                return Err(e);
            }

            // unread counts depend on who "me" is
            let changed = state.reconcile_conversations();
            if !changed.is_empty() {
                state.persist(StorageKey::Conversations)?;
            }
            (
                state.session.user_id().cloned(),
                state.session.is_mock(),
                changed,
                state.total_unread(),
            )
        };

        self.emit(ClientEvent::SessionChanged { user_id, mock });
        if !changed.is_empty() {
            self.emit(ClientEvent::ConversationsChanged { ids: changed });
        }
        self.emit(ClientEvent::TotalUnreadChanged { total });
        Ok(())
    }
}

fn username_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn fallback_profile(id: &wayfarer_shared::types::UserId, email: &str) -> Profile {
    Profile {
        id: id.clone(),
        username: username_from_email(email).to_string(),
        display_name: None,
        avatar_url: None,
        bio: None,
        created_at: Utc::now(),
    }
}
