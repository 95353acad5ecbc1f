//! Local-first repository policy.
//!
//! One rule set for every collection that exists both on the device and on
//! the remote backend:
//!
//! - **Load**: ask the remote.  If it answers with records, merge them over
//!   the local cache: the remote copy wins per key, records only known
//!   locally are kept.  If it answers with nothing or fails, the local cache
//!   is used as-is.  A remote failure never fails the load.
//! - **Write**: write-through.  The local copy is written first, then the
//!   remote when the session is authenticated.  Mock sessions stay local.

use std::collections::HashSet;
use std::hash::Hash;

use wayfarer_shared::types::{CommunityId, EventId, PostId, ResourceId};
use wayfarer_store::{Community, Event, Post, Resource};

use crate::remote::RemoteResult;
use crate::state::Session;

/// Anything stored as a keyed list.
pub trait Record: Clone {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

impl Record for Community {
    type Key = CommunityId;
    fn key(&self) -> CommunityId {
        self.id
    }
}

impl Record for Post {
    type Key = PostId;
    fn key(&self) -> PostId {
        self.id
    }
}

impl Record for Event {
    type Key = EventId;
    fn key(&self) -> EventId {
        self.id
    }
}

impl Record for Resource {
    type Key = ResourceId;
    fn key(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Local write, then remote write.
    WriteThrough,
    /// Local write only.
    LocalOnly,
}

impl SyncPolicy {
    pub fn for_session(session: &Session) -> Self {
        match session {
            Session::Authenticated(_) => SyncPolicy::WriteThrough,
            Session::Mock(_) | Session::Anonymous => SyncPolicy::LocalOnly,
        }
    }
}

/// Merge `remote` into the part of `local` selected by `in_scope`.
///
/// In scope: remote records replace local ones with the same key, local-only
/// records are kept after the remote ones.  Out of scope: untouched, and kept
/// in front so that unrelated collections keep their order.
pub fn merge_scoped<T, F>(local: Vec<T>, remote: Vec<T>, in_scope: F) -> Vec<T>
where
    T: Record,
    F: Fn(&T) -> bool,
{
    let remote_keys: HashSet<T::Key> = remote.iter().map(Record::key).collect();

    let (scoped, mut merged): (Vec<T>, Vec<T>) = local.into_iter().partition(|r| in_scope(r));
    merged.extend(remote);
    merged.extend(
        scoped
            .into_iter()
            .filter(|r| !remote_keys.contains(&r.key())),
    );
    merged
}

/// Apply the load rule to a remote answer.
///
/// Returns the collection to use and where it came from.  When the source is
/// [`LoadSource::Remote`] the caller should persist the result locally.
pub fn resolve_load<T, F>(
    what: &'static str,
    local: Vec<T>,
    remote: RemoteResult<Vec<T>>,
    in_scope: F,
) -> (Vec<T>, LoadSource)
where
    T: Record,
    F: Fn(&T) -> bool,
{
    match remote {
        Ok(records) if !records.is_empty() => {
            tracing::debug!(what, remote = records.len(), local = local.len(), "merging remote records");
            (merge_scoped(local, records, in_scope), LoadSource::Remote)
        }
        Ok(_) => {
            tracing::debug!(what, local = local.len(), "remote empty, using local cache");
            (local, LoadSource::Local)
        }
        Err(e) => {
            tracing::warn!(what, error = %e, "remote load failed, using local cache");
            (local, LoadSource::Local)
        }
    }
}
