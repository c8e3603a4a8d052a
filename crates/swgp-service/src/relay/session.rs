// ============================================
// File: crates/swgp-service/src/relay/session.rs
// ============================================
//! # Relay Sessions
//!
//! ## Creation Reason
//! One listening socket serves many remote peers but forwards everything
//! to a single target. Each peer therefore gets its own forwarding socket,
//! so replies from the target can be told apart and sent back to the right
//! peer.
//!
//! ## Main Functionality
//! - `Session`: one peer, its forwarding socket and reader task
//! - `SessionStats`: per-session traffic counters
//! - `SessionTable`: concurrent map from peer address to session
//!
//! ## Session Lifecycle
//! ```text
//!  first datagram            idle > timeout / socket closed / stop
//! ─────────────────► Open ────────────────────────────────────────► Closed
//!   (lookup_or_create)          close() then removed from table
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sessions are keyed by source address: a WireGuard process that
//!   rebinds to a new port shows up as a new peer and gets a new session,
//!   and replies follow it there. The old session idles out
//! - A session is closed BEFORE its key leaves the table, so a late
//!   datagram for that peer creates a fresh session instead of finding a
//!   half-dead one
//! - Never call `DashMap::len` while holding an entry; the table keeps
//!   its own counter for the limit check
//! - All mutations go through `SessionTable`
//!
//! ## Last Modified
//! v0.1.0 - Initial session table

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;

use swgp_common::time::AtomicInstant;
use swgp_common::types::SessionId;
use swgp_transport::UdpTransport;

use crate::error::{Result, ServiceError};

// ============================================
// Session Statistics
// ============================================

/// Per-session traffic counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Datagrams forwarded from the peer to the target.
    pub packets_forwarded: AtomicU64,
    /// Bytes forwarded from the peer to the target.
    pub bytes_forwarded: AtomicU64,
    /// Datagrams returned from the target to the peer.
    pub packets_returned: AtomicU64,
    /// Bytes returned from the target to the peer.
    pub bytes_returned: AtomicU64,
    /// Datagrams dropped on this session's path.
    pub packets_dropped: AtomicU64,
}

impl SessionStats {
    /// Records a datagram sent to the target.
    pub fn record_forwarded(&self, bytes: usize) {
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a datagram sent back to the peer.
    pub fn record_returned(&self, bytes: usize) {
        self.bytes_returned.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped datagram.
    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_forwarded: self.packets_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            packets_returned: self.packets_returned.load(Ordering::Relaxed),
            bytes_returned: self.bytes_returned.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams forwarded to the target.
    pub packets_forwarded: u64,
    /// Bytes forwarded to the target.
    pub bytes_forwarded: u64,
    /// Datagrams returned to the peer.
    pub packets_returned: u64,
    /// Bytes returned to the peer.
    pub bytes_returned: u64,
    /// Datagrams dropped.
    pub packets_dropped: u64,
}

// ============================================
// Session
// ============================================

/// A remote peer seen on a listening socket.
///
/// The peer address is also the table key, so it never changes for the
/// life of the session.
pub struct Session {
    /// Identifier for logs.
    pub id: SessionId,
    /// Where replies are sent.
    peer: SocketAddr,
    /// When the session was created.
    pub created_at: Instant,
    /// Last datagram in either direction.
    last_activity: AtomicInstant,
    /// Socket used to reach the forward-to target.
    transport: Arc<UdpTransport>,
    /// Task reading replies from the target.
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Wakes the reader task when the session is closed.
    close_signal: Notify,
    /// Traffic counters.
    pub stats: SessionStats,
}

impl Session {
    /// Creates a session for `peer` that owns `transport`.
    #[must_use]
    pub fn new(peer: SocketAddr, transport: Arc<UdpTransport>) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::next(),
            peer,
            created_at: now,
            last_activity: AtomicInstant::from_instant(now),
            transport,
            reader: Mutex::new(None),
            close_signal: Notify::new(),
            stats: SessionStats::default(),
        }
    }

    /// Returns the address replies are sent to.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the forwarding transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<UdpTransport> {
        &self.transport
    }

    /// Refreshes the activity timestamp.
    pub fn touch(&self) {
        self.last_activity.store(Instant::now());
    }

    /// Returns the time since the last datagram.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Returns `true` if idle for longer than `timeout`.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.has_elapsed(timeout)
    }

    /// Stores the reader task handle.
    pub fn attach_reader(&self, handle: JoinHandle<()>) {
        *self.reader.lock() = Some(handle);
    }

    /// Closes the forwarding transport and signals the reader task.
    ///
    /// Returns the reader handle the first time it is called.
    pub fn close(&self) -> Option<JoinHandle<()>> {
        self.transport.close();
        // notify_one keeps a permit if the reader is not waiting yet
        self.close_signal.notify_one();
        self.reader.lock().take()
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.transport.is_shutdown()
    }

    /// Completes when the session is closed.
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer())
            .field("transport", &self.transport)
            .field("idle_time", &self.idle_time())
            .finish_non_exhaustive()
    }
}

// ============================================
// Session Table
// ============================================

/// Sessions of one relay instance, keyed by peer address.
pub struct SessionTable {
    sessions: DashMap<SocketAddr, Arc<Session>>,
    /// Entry count maintained alongside the map
    count: AtomicUsize,
    max_sessions: usize,
    /// Reader tasks of removed sessions that may still be winding down
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            count: AtomicUsize::new(0),
            max_sessions,
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Returns the session for `peer`, creating it with `create` if absent.
    ///
    /// Creation runs while the entry for `peer` is held, so concurrent
    /// first datagrams from one peer produce exactly one session. The
    /// boolean is `true` if this call created the session.
    ///
    /// # Errors
    /// `SessionLimitReached` when the table is full, or whatever `create`
    /// returns.
    pub fn lookup_or_create<F>(&self, peer: SocketAddr, create: F) -> Result<(Arc<Session>, bool)>
    where
        F: FnOnce() -> Result<Arc<Session>>,
    {
        match self.sessions.entry(peer) {
            Entry::Occupied(entry) => Ok((Arc::clone(entry.get()), false)),
            Entry::Vacant(entry) => {
                self.count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < self.max_sessions).then_some(n + 1)
                    })
                    .map_err(|_| ServiceError::SessionLimitReached {
                        limit: self.max_sessions,
                    })?;

                match create() {
                    Ok(session) => {
                        entry.insert(Arc::clone(&session));
                        Ok((session, true))
                    }
                    Err(e) => {
                        self.count.fetch_sub(1, Ordering::AcqRel);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Returns the session for `peer`, if any.
    #[must_use]
    pub fn get(&self, peer: &SocketAddr) -> Option<Arc<Session>> {
        self.sessions.get(peer).map(|r| Arc::clone(r.value()))
    }

    /// Refreshes the activity timestamp of `peer`'s session.
    ///
    /// Returns `false` if there is no such session.
    pub fn touch(&self, peer: &SocketAddr) -> bool {
        self.sessions.get(peer).map(|s| s.touch()).is_some()
    }

    /// Closes and removes sessions idle for longer than `timeout`.
    ///
    /// Returns the peers that were removed.
    pub fn sweep(&self, timeout: Duration) -> Vec<SocketAddr> {
        let mut removed = Vec::new();
        let mut handles = Vec::new();

        self.sessions.retain(|peer, session| {
            if !session.is_expired(timeout) {
                return true;
            }
            handles.extend(session.close());
            log_removed(*peer, session, "idle");
            removed.push(*peer);
            false
        });

        self.count.fetch_sub(removed.len(), Ordering::AcqRel);
        self.retired.lock().extend(handles);
        removed
    }

    /// Removes `peer` only if it still maps to `session`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn evict(&self, peer: SocketAddr, session: &Arc<Session>) -> bool {
        let removed = self
            .sessions
            .remove_if(&peer, |_, current| Arc::ptr_eq(current, session));

        match removed {
            Some((_, session)) => {
                self.count.fetch_sub(1, Ordering::AcqRel);
                self.retired.lock().extend(session.close());
                log_removed(peer, &session, "socket closed");
                true
            }
            None => {
                // Already gone, but make sure this one is closed too
                self.retired.lock().extend(session.close());
                false
            }
        }
    }

    /// Closes and removes every session.
    ///
    /// Returns the reader task handles, including those of sessions that
    /// were removed earlier, so the caller can await them.
    pub fn close_all(&self) -> Vec<JoinHandle<()>> {
        let mut handles = std::mem::take(&mut *self.retired.lock());
        let mut removed = 0;

        self.sessions.retain(|peer, session| {
            handles.extend(session.close());
            log_removed(*peer, session, "shutdown");
            removed += 1;
            false
        });

        self.count.fetch_sub(removed, Ordering::AcqRel);
        handles
    }

    /// Drops handles of retired reader tasks that have finished.
    pub fn reap(&self) {
        self.retired.lock().retain(|handle| !handle.is_finished());
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Returns `true` if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

fn log_removed(peer: SocketAddr, session: &Session, reason: &str) {
    let stats = session.stats.snapshot();
    info!(
        session = %session.id,
        peer = %peer,
        reason,
        packets_forwarded = stats.packets_forwarded,
        packets_returned = stats.packets_returned,
        packets_dropped = stats.packets_dropped,
        "Session removed"
    );
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTable")
            .field("sessions", &self.len())
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
