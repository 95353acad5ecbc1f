use tracing::info;

use wayfarer_store::{BackupPayload, ImportStats};

use crate::client::Client;
use crate::error::Result;
use crate::events::ClientEvent;
use crate::state::Session;

impl Client {
    /// Snapshot of the whole local store.
    pub fn export_backup(&self) -> Result<BackupPayload> {
        let payload = self.read(|s| s.database.export_backup())??;
        info!(items = payload.items.len(), "backup exported");
        Ok(payload)
    }

    /// Merge a snapshot into the local store.  Keys that already exist are
    /// kept; the in-memory state is reloaded afterwards.  An imported local
    /// identity is adopted right away when nobody is signed in.
    pub fn import_backup(&self, payload: &BackupPayload) -> Result<ImportStats> {
        let (stats, session, total, unread) = {
            let mut state = self.lock()?;
            let stats = state.database.import_backup(payload)?;
            let mut session = None;
            if stats.items_imported > 0 {
                if state.session == Session::Anonymous && state.restore_session() {
                    session = Some((state.session.user_id().cloned(), state.session.is_mock()));
                }
                state.reload()?;
            }
            let unread = state.notifications.iter().filter(|n| !n.read).count();
            (stats, session, state.total_unread(), unread)
        };

        if let Some((user_id, mock)) = session {
            info!("session restored from backup");
            self.emit(ClientEvent::SessionChanged { user_id, mock });
        }
        if stats.items_imported > 0 {
            self.emit(ClientEvent::TotalUnreadChanged { total });
            self.emit(ClientEvent::NotificationsChanged { unread });
        }
        Ok(stats)
    }
}
