// ============================================
// File: crates/swgp-transport/src/udp.rs
// ============================================
//! # UDP Transport Implementation
//!
//! ## Creation Reason
//! Wraps Tokio's UDP socket with our `Transport` trait. The same type
//! serves as a relay's listening socket and as a session's forwarding
//! socket.
//!
//! ## Main Functionality
//! - `UdpTransport`: Main UDP transport implementation
//! - `bind_addr` / `bind`: explicit address (listening sockets)
//! - `bind_for_target`: ephemeral port of the target's family (sessions)
//! - Async send/receive operations, plus a non-waiting `try_send`
//! - Close flag checked by every operation
//!
//! ## Design Choices
//! - Binding is synchronous so a session socket can be created while the
//!   session table holds the entry for that peer
//! - IPv6 sockets are dual-stack (`IPV6_V6ONLY` off) so `[::]` listens on
//!   both families
//! - No SO_REUSEADDR, so a taken port is reported as `AddressInUse`
//!
//! ## ⚠️ Important Note for Next Developer
//! - UDP is connectionless - no guaranteed delivery
//! - Closing only sets a flag; a `recv` already pending is not woken.
//!   Callers race `recv` against their own shutdown signal and the socket
//!   is released when the last `Arc` drops
//!
//! ## Last Modified
//! v0.1.0 - Initial UDP transport implementation

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{PacketSource, Transport};

// ============================================
// UdpTransport
// ============================================

/// UDP-based transport implementation.
///
/// # Example
/// ```ignore
/// use swgp_transport::{Transport, UdpTransport};
///
/// let transport = UdpTransport::bind("[::]:20220")?;
///
/// let mut buf = [0u8; 65535];
/// let (len, source) = transport.recv(&mut buf).await?;
/// transport.send(&buf[..len], &source.addr).await?;
/// ```
pub struct UdpTransport {
    /// Underlying UDP socket
    socket: UdpSocket,
    /// Local address we're bound to
    local_addr: SocketAddr,
    /// Shutdown flag
    shutdown: AtomicBool,
}

impl UdpTransport {
    /// Creates a new UDP transport bound to the specified address.
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (e.g., `"[::]:20220"`)
    ///
    /// # Errors
    /// - `InvalidAddress`: If the string is not a socket address
    /// - `BindFailed` / `AddressInUse`: If binding fails
    pub fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr =
            addr_str
                .parse()
                .map_err(|_| TransportError::InvalidAddress {
                    addr: addr_str.to_string(),
                })?;

        Self::bind_addr(socket_addr)
    }

    /// Creates a transport on an ephemeral port suitable for reaching
    /// `target`.
    ///
    /// Binds the unspecified address of the target's family, port 0.
    ///
    /// # Errors
    /// Returns error if binding fails.
    pub fn bind_for_target(target: SocketAddr) -> Result<Self> {
        let local = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        Self::bind_addr(local)
    }

    /// Creates a new UDP transport bound to the specified socket address.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Socket Options
    /// - Non-blocking: Required for async operations
    /// - `IPV6_V6ONLY` off for IPv6 addresses
    ///
    /// # Errors
    /// Returns error if binding fails.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        // Create socket with socket2 for more control
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::io("creating UDP socket", e))?;

        if addr.is_ipv6() {
            socket
                .set_only_v6(false)
                .map_err(|e| TransportError::io("clearing IPV6_V6ONLY", e))?;
        }

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;

        socket.bind(&addr.into()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse { addr }
            } else {
                TransportError::bind_failed(addr, e.to_string())
            }
        })?;

        // Convert to Tokio socket
        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket)
            .map_err(|e| TransportError::io("converting to Tokio socket", e))?;

        let local_addr = tokio_socket
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        debug!("UDP transport bound to {}", local_addr);

        Ok(Self {
            socket: tokio_socket,
            local_addr,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Marks the transport closed without awaiting.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn close(&self) -> bool {
        !self.shutdown.swap(true, Ordering::AcqRel)
    }

    /// Sends one datagram without waiting for send buffer space.
    ///
    /// # Errors
    /// - `ShuttingDown` once closed
    /// - `WouldBlock` if the send buffer is full
    /// - `SendFailed` otherwise
    pub fn try_send(&self, buf: &[u8], dest: &SocketAddr) -> Result<usize> {
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        let len = self
            .socket
            .try_send_to(buf, *dest)
            .map_err(|e| send_error(*dest, &e))?;

        trace!("Sent {} bytes to {}", len, dest);

        Ok(len)
    }

    /// Checks if the transport has been shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, PacketSource)> {
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        let (len, addr) =
            self.socket
                .recv_from(buf)
                .await
                .map_err(|e| TransportError::ReceiveFailed {
                    reason: e.to_string(),
                })?;

        // Datagrams that land after close are not delivered
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        trace!("Received {} bytes from {}", len, addr);

        Ok((len, PacketSource::new(addr)))
    }

    async fn send(&self, buf: &[u8], dest: &SocketAddr) -> Result<usize> {
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        let len = self
            .socket
            .send_to(buf, dest)
            .await
            .map_err(|e| send_error(*dest, &e))?;

        trace!("Sent {} bytes to {}", len, dest);

        Ok(len)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn shutdown(&self) -> Result<()> {
        if self.close() {
            debug!("UDP transport {} shut down", self.local_addr);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.is_shutdown()
    }
}

/// Maps a send failure, keeping a full send buffer distinguishable.
fn send_error(dest: SocketAddr, e: &std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::WouldBlock {
        TransportError::WouldBlock { dest }
    } else {
        TransportError::SendFailed {
            dest,
            reason: e.to_string(),
        }
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
