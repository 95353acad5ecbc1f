//! The [`Client`] handle: state + remote backend + event bus.
//!
//! Operations are implemented in the `commands` modules as `impl Client`
//! blocks, grouped by domain.  The state lock is never held across an
//! `.await`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{info, warn};

use wayfarer_shared::types::CommunityId;
use wayfarer_store::{Database, StorageKey};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::remote::{OfflineBackend, RemoteBackend, RemoteResult, RestBackend};
use crate::repository::{resolve_load, LoadSource, SyncPolicy};
use crate::state::AppState;

#[derive(Clone)]
pub struct Client {
    state: Arc<Mutex<AppState>>,
    remote: Arc<dyn RemoteBackend>,
    events: EventBus,
}

impl Client {
    pub fn new(state: AppState, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            remote,
            events: EventBus::new(),
        }
    }

    /// Open local storage and pick a backend according to `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let database = match &config.data_dir {
            Some(dir) => Database::open_in_dir(dir)?,
            None => Database::new()?,
        };
        let state = AppState::load(database)?;

        let remote: Arc<dyn RemoteBackend> = match &config.backend_url {
            Some(url) => {
                info!(backend = %url, "using remote backend");
                Arc::new(RestBackend::new(
                    url,
                    &config.anon_key,
                    config.request_timeout,
                )?)
            }
            None => {
                info!("no backend configured, running on local storage only");
                Arc::new(OfflineBackend)
            }
        };

        Ok(Self::new(state, remote))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Shared handle to the application state.
    pub fn state(&self) -> Arc<Mutex<AppState>> {
        Arc::clone(&self.state)
    }

    /// Run `f` against a consistent view of the state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> Result<R> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, AppState>> {
        self.state.lock().map_err(|_| ClientError::StatePoisoned)
    }

    pub(crate) fn remote(&self) -> Arc<dyn RemoteBackend> {
        Arc::clone(&self.remote)
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        self.events.emit(event);
    }

    /// Apply a change locally, then confirm it remotely.
    ///
    /// `apply` mutates the in-memory state and returns a snapshot to restore
    /// plus the payload for `remote_call`; the collection behind `key` is
    /// then persisted.  If that write fails, `revert` undoes the change in
    /// memory and the store error is returned.  Mock sessions stop after the
    /// local step.  If the remote call fails, `revert` restores the
    /// snapshot, `key` is persisted again, a [`ClientEvent::MutationReverted`]
    /// is emitted and the remote error is returned.  There is no retry.
    pub(crate) async fn optimistic<S, T, A, F, Fut, R>(
        &self,
        action: &'static str,
        key: StorageKey,
        apply: A,
        remote_call: F,
        revert: R,
    ) -> Result<()>
    where
        A: FnOnce(&mut AppState) -> Result<(S, T)>,
        F: FnOnce(Arc<dyn RemoteBackend>, T) -> Fut,
        Fut: Future<Output = RemoteResult<()>>,
        R: FnOnce(&mut AppState, S) -> Result<()>,
    {
        let (snapshot, payload, policy) = {
            let mut state = self.lock()?;
            let policy = SyncPolicy::for_session(&state.session);
            let (snapshot, payload) = apply(&mut state)?;
            if let Err(e) = state.persist(key) {
                warn!(action, error = %e, "local write failed, rolling back");
                if let Err(e) = revert(&mut state, snapshot) {
                    warn!(action, error = %e, "rollback failed");
                }
                return Err(e);
            }
            (snapshot, payload, policy)
        };

        if policy == SyncPolicy::LocalOnly {
            return Ok(());
        }

        match remote_call(self.remote(), payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(action, error = %e, "remote call failed, reverting local change");
                {
                    let mut state = self.lock()?;
                    let restored = revert(&mut state, snapshot).and_then(|()| state.persist(key));
                    if let Err(e) = restored {
                        warn!(action, error = %e, "revert incomplete");
                    }
                }
                self.emit(ClientEvent::MutationReverted {
                    action,
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Whether an [`Client::optimistic`] outcome is worth a change event:
    /// it succeeded, or the remote refused it after the local step ran.
    pub(crate) fn settled(result: &Result<()>) -> bool {
        matches!(result, Ok(()) | Err(ClientError::Remote(_)))
    }

    /// Load communities through the repository policy.
    pub async fn refresh_communities(&self) -> Result<LoadSource> {
        let remote = self.remote.list_communities().await;

        let (source, ids): (LoadSource, Vec<CommunityId>) = {
            let mut state = self.lock()?;
            let local = std::mem::take(&mut state.communities);
            let (merged, source) = resolve_load("communities", local, remote, |_| true);
            state.communities = merged;
            if source == LoadSource::Remote {
                state.persist(StorageKey::Communities)?;
            }
            (source, state.communities.iter().map(|c| c.id).collect())
        };

        if source == LoadSource::Remote {
            for id in ids {
                self.emit(ClientEvent::CommunityChanged { id });
            }
        }
        Ok(source)
    }

    /// Startup: local state is already loaded; pull what the remote has.
    pub async fn initialize(&self) -> Result<()> {
        let source = self.refresh_communities().await?;
        let (unread, conversations) =
            self.read(|s| (s.total_unread(), s.conversations.len()))?;
        info!(?source, conversations, unread, "client initialized");
        self.emit(ClientEvent::TotalUnreadChanged { total: unread });
        Ok(())
    }
}
