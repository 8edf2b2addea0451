//! Job channel registry.
//!
//! Maps each job id to the set of subscribers currently watching it. A
//! channel exists only while it has members: it is created by the first
//! [`join`](ChannelRegistry::join) and removed when the last member leaves.
//! Nothing is persisted and nothing is replayed; a subscriber only sees
//! events emitted while it is a member.
//!
//! The registry also keeps the reverse index (subscriber to channels) so a
//! closing connection can release all of its memberships in one call.
//!
//! Emitters call [`members_of`](ChannelRegistry::members_of), which copies
//! the member set under the read lock and releases it before any send.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use onlyvalid_core::types::JobId;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Inner<S> {
    channels: HashMap<JobId, HashSet<S>>,
    memberships: HashMap<S, HashSet<JobId>>,
    closed: bool,
}

impl<S> Default for Inner<S> {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            memberships: HashMap::new(),
            closed: false,
        }
    }
}

/// Process-wide mapping from job id to subscriber handles.
///
/// `S` is the subscriber handle; the API uses the WebSocket connection id.
/// Owned by application state and shared through `Arc`.
#[derive(Debug)]
pub struct ChannelRegistry<S> {
    inner: RwLock<Inner<S>>,
}

impl<S> ChannelRegistry<S>
where
    S: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Add `subscriber` to the channel of `job_id`, creating the channel if
    /// needed.
    ///
    /// Idempotent. Returns `true` when the membership is new. After
    /// [`shutdown`](Self::shutdown) this is a no-op returning `false`.
    pub async fn join(&self, job_id: &JobId, subscriber: S) -> bool {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return false;
        }
        let added = inner
            .channels
            .entry(job_id.clone())
            .or_default()
            .insert(subscriber.clone());
        if added {
            inner
                .memberships
                .entry(subscriber)
                .or_default()
                .insert(job_id.clone());
        }
        added
    }

    /// Remove `subscriber` from the channel of `job_id`.
    ///
    /// No-op when the channel or membership does not exist. Returns `true`
    /// when a membership was removed. An emptied channel is evicted.
    pub async fn leave(&self, job_id: &JobId, subscriber: &S) -> bool {
        let mut inner = self.inner.write().await;
        let removed = match inner.channels.get_mut(job_id) {
            Some(members) => {
                let removed = members.remove(subscriber);
                if members.is_empty() {
                    inner.channels.remove(job_id);
                }
                removed
            }
            None => false,
        };
        if removed {
            if let Some(jobs) = inner.memberships.get_mut(subscriber) {
                jobs.remove(job_id);
                if jobs.is_empty() {
                    inner.memberships.remove(subscriber);
                }
            }
        }
        removed
    }

    /// Release every membership held by `subscriber`.
    ///
    /// Called when a connection closes, whether or not the client sent
    /// `leave-job`. Returns the number of channels left.
    pub async fn leave_all(&self, subscriber: &S) -> usize {
        let mut inner = self.inner.write().await;
        let Some(jobs) = inner.memberships.remove(subscriber) else {
            return 0;
        };
        for job_id in &jobs {
            if let Some(members) = inner.channels.get_mut(job_id) {
                members.remove(subscriber);
                if members.is_empty() {
                    inner.channels.remove(job_id);
                }
            }
        }
        jobs.len()
    }

    /// Snapshot of the current members of `job_id`.
    ///
    /// Empty for unknown channels. The returned vector is a copy; later
    /// joins and leaves do not affect it.
    pub async fn members_of(&self, job_id: &JobId) -> Vec<S> {
        self.inner
            .read()
            .await
            .channels
            .get(job_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Channels `subscriber` currently belongs to, sorted.
    pub async fn channels_of(&self, subscriber: &S) -> Vec<JobId> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<JobId> = inner
            .memberships
            .get(subscriber)
            .map(|jobs| jobs.iter().cloned().collect())
            .unwrap_or_default();
        jobs.sort();
        jobs
    }

    /// Number of channels with at least one member.
    pub async fn channel_count(&self) -> usize {
        self.inner.read().await.channels.len()
    }

    pub async fn member_count(&self, job_id: &JobId) -> usize {
        self.inner
            .read()
            .await
            .channels
            .get(job_id)
            .map_or(0, HashSet::len)
    }

    /// Drop every channel and refuse further joins.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        inner.channels.clear();
        inner.memberships.clear();
        tracing::info!("Channel registry shut down");
    }
}

impl<S> Default for ChannelRegistry<S>
where
    S: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
