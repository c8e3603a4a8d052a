// ============================================
// File: crates/swgp-service/src/relay/mod.rs
// ============================================
//! # Relay Instance
//!
//! ## Creation Reason
//! One running relay: a listening socket, a codec, a session table and the
//! tasks moving datagrams between them. Server and client roles share this
//! engine and only differ in the direction of their transforms.
//!
//! ## Main Functionality
//! - `RelayInstance`: owns one relay's resources and lifecycle
//! - `RelayState`: lifecycle state
//! - [`session`]: per-peer sessions and the session table
//!
//! ## Lifecycle
//! ```text
//!  new()        bind()        start()          stop()            (tasks joined)
//! ──────► Created ─────► Bound ──────► Running ───────► Stopping ──────────────► Stopped
//!            │             │                                                      ▲
//!            └─────────────┴──────────────────── stop() ─────────────────────────┘
//! ```
//!
//! ## Task Layout
//! ```text
//!                  ┌──────────── inbound task ────────────┐
//! peer ──► listen ─┤ inbound transform ─► session socket  ├──► forward_to
//!                  └──────────────────────────────────────┘
//!                  ┌────────── reader task (per session) ──┐
//! peer ◄── listen ◄┤ outbound transform ◄─ session socket  ├◄── forward_to
//!                  └───────────────────────────────────────┘
//!                        sweep task: evicts idle sessions
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `stop()` stops the inbound and sweep tasks BEFORE closing sessions, so
//!   no session can be created once teardown of the table has begun
//! - Lifecycle state lives behind a `parking_lot::Mutex`; never hold it
//!   across an `.await`
//! - A failed transform drops the datagram and never reaches the caller
//!
//! ## Last Modified
//! v0.1.0 - Initial relay instance

pub mod session;
mod tasks;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use swgp_core::{new_codec, PacketCodec};
use swgp_transport::UdpTransport;

use crate::error::{Result, ServiceError};
use crate::role::{InstanceId, RoleDescriptor};

pub use session::{Session, SessionStats, SessionTable, StatsSnapshot};

/// How long `stop()` waits for each task before aborting it.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// RelayState
// ============================================

/// Lifecycle state of a relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, nothing bound.
    Created,
    /// Listening socket bound, no tasks running.
    Bound,
    /// Relaying datagrams.
    Running,
    /// Tearing down tasks and sessions.
    Stopping,
    /// All resources released.
    Stopped,
}

impl RelayState {
    /// Returns the lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Bound => "bound",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// RelayContext
// ============================================

/// State shared by every task of one instance.
pub(crate) struct RelayContext {
    pub(crate) descriptor: Arc<RoleDescriptor>,
    pub(crate) codec: Arc<dyn PacketCodec>,
    pub(crate) listener: Arc<UdpTransport>,
    pub(crate) sessions: Arc<SessionTable>,
    pub(crate) shutdown_tx: broadcast::Sender<()>,
    pub(crate) span: Span,
}

// ============================================
// RelayInstance
// ============================================

/// One relay: a listening socket and everything forwarding its traffic.
///
/// # Example
/// ```ignore
/// let relay = RelayInstance::new(descriptor)?;
/// let addr = relay.bind()?;
/// relay.start()?;
/// // ...
/// relay.stop().await;
/// ```
pub struct RelayInstance {
    descriptor: Arc<RoleDescriptor>,
    id: InstanceId,
    codec: Arc<dyn PacketCodec>,
    span: Span,
    state: Mutex<RelayState>,
    listener: Mutex<Option<Arc<UdpTransport>>>,
    sessions: Arc<SessionTable>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl RelayInstance {
    /// Creates an instance in the `Created` state.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` for a bad descriptor, or a codec error.
    pub fn new(descriptor: RoleDescriptor) -> Result<Self> {
        descriptor.validate()?;

        let codec: Arc<dyn PacketCodec> =
            Arc::from(new_codec(descriptor.mode, &descriptor.psk, descriptor.mtu)?);
        let id = descriptor.id();
        let span = info_span!("relay", instance = %id);
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            sessions: Arc::new(SessionTable::new(descriptor.max_sessions)),
            descriptor: Arc::new(descriptor),
            id,
            codec,
            span,
            state: Mutex::new(RelayState::Created),
            listener: Mutex::new(None),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Binds the listening socket.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when the configured port is 0.
    ///
    /// # Errors
    /// - `InvalidState` unless `Created`
    /// - `Bind` if the socket cannot be bound
    pub fn bind(&self) -> Result<SocketAddr> {
        let mut state = self.state.lock();
        self.expect_state(*state, RelayState::Created, "bind")?;

        let listener =
            UdpTransport::bind_addr(self.descriptor.listen).map_err(|source| ServiceError::Bind {
                instance: self.id.clone(),
                source,
            })?;
        let addr = swgp_transport::Transport::local_addr(&listener)?;

        *self.listener.lock() = Some(Arc::new(listener));
        *state = RelayState::Bound;

        self.span.in_scope(|| info!(listen = %addr, "Relay bound"));
        Ok(addr)
    }

    /// Spawns the inbound and sweep tasks.
    ///
    /// # Errors
    /// `InvalidState` unless `Bound`.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.expect_state(*state, RelayState::Bound, "start")?;

        let listener = self.listener.lock().clone().ok_or_else(|| {
            ServiceError::Common(swgp_common::CommonError::internal(
                "bound relay has no listener",
            ))
        })?;

        let ctx = Arc::new(RelayContext {
            descriptor: Arc::clone(&self.descriptor),
            codec: Arc::clone(&self.codec),
            listener,
            sessions: Arc::clone(&self.sessions),
            shutdown_tx: self.shutdown_tx.clone(),
            span: self.span.clone(),
        });

        let inbound = tokio::spawn(
            tasks::run_inbound(Arc::clone(&ctx), self.shutdown_tx.subscribe())
                .instrument(self.span.clone()),
        );
        let sweep = tokio::spawn(
            tasks::run_sweep(ctx, self.shutdown_tx.subscribe()).instrument(self.span.clone()),
        );

        self.tasks.lock().extend([("inbound", inbound), ("sweep", sweep)]);
        *state = RelayState::Running;

        self.span.in_scope(|| {
            info!(
                role = %self.descriptor.role,
                mode = %self.descriptor.mode,
                forward_to = %self.descriptor.forward_to,
                "Relay started"
            );
        });
        Ok(())
    }

    /// Stops the instance and releases its sockets.
    ///
    /// Idempotent: calling it again, or concurrently, is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                RelayState::Created | RelayState::Bound => {
                    *state = RelayState::Stopped;
                    drop(state);
                    self.listener.lock().take();
                    self.span.in_scope(|| debug!("Relay stopped before running"));
                    return;
                }
                RelayState::Running => *state = RelayState::Stopping,
                RelayState::Stopping | RelayState::Stopped => return,
            }
        }

        self.span.in_scope(|| info!("Stopping relay..."));

        // Stop accepting new datagrams first
        let _ = self.shutdown_tx.send(());
        if let Some(listener) = self.listener.lock().take() {
            listener.close();
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for (name, task) in tasks {
            join_task(name, task, &self.span).await;
        }

        let handles = self.sessions.close_all();
        for handle in handles {
            join_task("session reader", handle, &self.span).await;
        }

        *self.state.lock() = RelayState::Stopped;
        self.span.in_scope(|| info!("Relay stopped"));
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        *self.state.lock()
    }

    /// Returns the bound listening address, if bound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .as_ref()
            .and_then(|l| swgp_transport::Transport::local_addr(l.as_ref()).ok())
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns the instance identity.
    #[must_use]
    pub const fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Returns the descriptor this instance was built from.
    #[must_use]
    pub fn descriptor(&self) -> &RoleDescriptor {
        &self.descriptor
    }

    fn expect_state(
        &self,
        actual: RelayState,
        expected: RelayState,
        operation: &'static str,
    ) -> Result<()> {
        if actual == expected {
            Ok(())
        } else {
            Err(ServiceError::InvalidState {
                instance: self.id.clone(),
                state: actual,
                operation,
            })
        }
    }
}

impl fmt::Debug for RelayInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayInstance")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("codec", &self.codec)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

/// Awaits a task, aborting it if it does not finish in time.
async fn join_task(name: &str, mut task: JoinHandle<()>, span: &Span) {
    match tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_cancelled() => {}
        Ok(Err(e)) => span.in_scope(|| warn!("Task '{}' failed: {}", name, e)),
        Err(_) => {
            span.in_scope(|| warn!("Task '{}' timed out during shutdown", name));
            task.abort();
        }
    }
}

// ============================================
// Tests
// ============================================
