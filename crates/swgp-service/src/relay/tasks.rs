// ============================================
// File: crates/swgp-service/src/relay/tasks.rs
// ============================================
//! # Relay Tasks
//!
//! ## Creation Reason
//! The loops spawned by a running relay instance.
//!
//! ## Main Functionality
//! - `run_inbound`: listening socket to forward-to target
//! - `run_reader`: forward-to target back to one peer
//! - `run_sweep`: periodic idle eviction
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every loop races its socket against the shutdown broadcast; closing a
//!   transport alone does not wake a pending `recv`
//! - Per-datagram failures are logged at debug and dropped
//! - No loop waits for send buffer space: a full buffer drops that
//!   datagram, so one congested session cannot stall the other peers
//!
//! ## Last Modified
//! v0.1.0 - Initial relay loops

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace, Instrument};

use swgp_common::MAX_DATAGRAM_SIZE;
use swgp_transport::{Transport, TransportError, UdpTransport};

use super::session::Session;
use super::RelayContext;
use crate::error::{Result, ServiceError};

// ============================================
// Inbound
// ============================================

/// Receives from the listening socket until shutdown.
pub(crate) async fn run_inbound(ctx: Arc<RelayContext>, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut out = vec![0u8; MAX_DATAGRAM_SIZE + ctx.codec.max_overhead()];
    let transform = ctx.descriptor.role.inbound();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Inbound task received shutdown signal");
                break;
            }
            result = ctx.listener.recv(&mut buf) => {
                match result {
                    Ok((len, source)) => {
                        let n = match transform.apply(ctx.codec.as_ref(), &buf[..len], &mut out) {
                            Ok(n) => n,
                            Err(e) => {
                                debug!(peer = %source.addr, len, "Dropping datagram, {} failed: {}", transform.as_str(), e);
                                continue;
                            }
                        };
                        forward(&ctx, source.addr, &out[..n]);
                    }
                    Err(e) if e.is_closed() => break,
                    Err(e) => debug!("Listener receive error: {}", e),
                }
            }
        }
    }

    debug!("Inbound task exiting");
}

/// Sends one transformed datagram to the forward-to target on behalf of
/// `peer`.
fn forward(ctx: &Arc<RelayContext>, peer: SocketAddr, data: &[u8]) {
    // Second attempt only happens if the first session was closed under us
    for _ in 0..2 {
        let session = match ctx
            .sessions
            .lookup_or_create(peer, || create_session(ctx, peer))
        {
            Ok((session, created)) => {
                if created {
                    debug!(session = %session.id, peer = %peer, "Session created");
                }
                session
            }
            Err(e) => {
                debug!(peer = %peer, "Dropping datagram: {}", e);
                return;
            }
        };

        session.touch();

        match session.transport().try_send(data, &ctx.descriptor.forward_to) {
            Ok(len) => {
                session.stats.record_forwarded(len);
                trace!(session = %session.id, len, "Forwarded");
                return;
            }
            Err(TransportError::ShuttingDown) => {
                ctx.sessions.evict(peer, &session);
            }
            Err(e) => {
                session.stats.record_dropped();
                debug!(session = %session.id, "Forward failed: {}", e);
                return;
            }
        }
    }
}

/// Binds a forwarding socket for `peer` and spawns its reader.
///
/// Runs while the session table holds the entry for `peer`.
fn create_session(ctx: &Arc<RelayContext>, peer: SocketAddr) -> Result<Arc<Session>> {
    let transport = UdpTransport::bind_for_target(ctx.descriptor.forward_to)
        .map_err(ServiceError::Transport)?;
    let session = Arc::new(Session::new(peer, Arc::new(transport)));

    let reader = tokio::spawn(
        run_reader(
            Arc::clone(ctx),
            Arc::clone(&session),
            ctx.shutdown_tx.subscribe(),
        )
        .instrument(ctx.span.clone()),
    );
    session.attach_reader(reader);

    Ok(session)
}

// ============================================
// Reader
// ============================================

/// Relays replies from the forward-to target back to the session's peer.
async fn run_reader(
    ctx: Arc<RelayContext>,
    session: Arc<Session>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut out = vec![0u8; MAX_DATAGRAM_SIZE + ctx.codec.max_overhead()];
    let transform = ctx.descriptor.role.outbound();
    let forward_to = ctx.descriptor.forward_to;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            () = session.closed() => break,
            result = session.transport().recv(&mut buf) => {
                let (len, source) = match result {
                    Ok(received) => received,
                    Err(e) if e.is_closed() => break,
                    Err(e) => {
                        debug!(session = %session.id, "Session receive error: {}", e);
                        continue;
                    }
                };

                if source.addr != forward_to {
                    session.stats.record_dropped();
                    debug!(session = %session.id, from = %source.addr, "Dropping datagram from unexpected source");
                    continue;
                }

                let n = match transform.apply(ctx.codec.as_ref(), &buf[..len], &mut out) {
                    Ok(n) => n,
                    Err(e) => {
                        session.stats.record_dropped();
                        debug!(session = %session.id, len, "Dropping reply, {} failed: {}", transform.as_str(), e);
                        continue;
                    }
                };

                session.touch();
                let peer = session.peer();
                match ctx.listener.try_send(&out[..n], &peer) {
                    Ok(len) => {
                        session.stats.record_returned(len);
                        trace!(session = %session.id, len, "Returned");
                    }
                    Err(e) if e.is_closed() => break,
                    Err(e) => {
                        session.stats.record_dropped();
                        debug!(session = %session.id, peer = %peer, "Return failed: {}", e);
                    }
                }
            }
        }
    }

    trace!(session = %session.id, "Session reader exiting");
}

// ============================================
// Sweep
// ============================================

/// Evicts idle sessions every cleanup interval.
pub(crate) async fn run_sweep(ctx: Arc<RelayContext>, mut shutdown_rx: broadcast::Receiver<()>) {
    let timeout = ctx.descriptor.session_timeout;
    let mut interval_timer = tokio::time::interval(ctx.descriptor.cleanup_interval);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Sweep task received shutdown signal");
                break;
            }
            _ = interval_timer.tick() => {
                let removed = ctx.sessions.sweep(timeout);
                ctx.sessions.reap();

                if removed.is_empty() {
                    trace!(sessions = ctx.sessions.len(), "Sweep cycle complete");
                } else {
                    info!(
                        removed = removed.len(),
                        sessions = ctx.sessions.len(),
                        "Evicted idle sessions"
                    );
                }
            }
        }
    }

    debug!("Sweep task exiting");
}

// ============================================
// Tests
// ============================================
