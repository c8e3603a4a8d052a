// ============================================
// File: crates/swgp-service/src/manager.rs
// ============================================
//! # Relay Manager
//!
//! ## Creation Reason
//! A process runs any number of server and client relays side by side.
//! The manager starts them as a unit and stops them as a unit.
//!
//! ## Main Functionality
//! - `Manager::start`: all-or-nothing startup in descriptor order
//! - `Manager::stop`: idempotent shutdown of every instance
//! - `Manager::run`: start, wait for a shutdown future, stop
//! - Lookup of bound addresses by `(role, name)`
//!
//! ## ⚠️ Important Note for Next Developer
//! - If any instance fails to bind or start, every instance created so far
//!   is stopped (reverse order) before the error is returned
//! - A stopped manager may be started again
//! - `start` and `stop` are serialized; the instance list lock is never
//!   held across an `.await`
//! - Binding is synchronous, so `start` has nothing to cancel between
//!   instances. Callers that need a cancellation input use `run`, which
//!   only observes its shutdown future once startup has settled
//!
//! ## Last Modified
//! v0.1.0 - Initial manager

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::{Result, ServiceError};
use crate::relay::RelayInstance;
use crate::role::{Role, RoleDescriptor};

/// Owns every relay instance of a process.
#[derive(Debug)]
pub struct Manager {
    descriptors: Vec<RoleDescriptor>,
    instances: Mutex<Vec<Arc<RelayInstance>>>,
    /// Serializes `start` and `stop`
    lifecycle: tokio::sync::Mutex<()>,
}

impl Manager {
    /// Creates a manager for `descriptors`.
    ///
    /// # Errors
    /// `DuplicateInstance` if two descriptors share a role and a name.
    pub fn new(descriptors: Vec<RoleDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            let id = descriptor.id();
            if !seen.insert(id.clone()) {
                return Err(ServiceError::DuplicateInstance(id));
            }
        }

        Ok(Self {
            descriptors,
            instances: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates, binds and starts every instance.
    ///
    /// # Errors
    /// - `AlreadyRunning` if the manager is running
    /// - The first instance error; nothing is left running in that case
    pub async fn start(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if !self.instances.lock().is_empty() {
            return Err(ServiceError::AlreadyRunning);
        }

        info!(instances = self.descriptors.len(), "Starting relays");

        let mut started: Vec<Arc<RelayInstance>> = Vec::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            let result = RelayInstance::new(descriptor.clone()).map(Arc::new).and_then(|relay| {
                started.push(Arc::clone(&relay));
                relay.bind()?;
                relay.start()
            });

            if let Err(e) = result {
                error!(instance = %descriptor.id(), "Failed to start relay: {}", e);
                for relay in started.iter().rev() {
                    relay.stop().await;
                }
                return Err(e);
            }
        }

        *self.instances.lock() = started;
        info!("All relays started");
        Ok(())
    }

    /// Stops every instance. Calling it again is a no-op.
    pub async fn stop(&self) {
        let _guard = self.lifecycle.lock().await;
        let instances = std::mem::take(&mut *self.instances.lock());
        if instances.is_empty() {
            return;
        }

        info!(instances = instances.len(), "Stopping relays...");
        for relay in &instances {
            relay.stop().await;
        }
        info!("All relays stopped");
    }

    /// Starts every instance, waits for `shutdown`, then stops them all.
    ///
    /// # Errors
    /// Returns the startup error; `shutdown` is not awaited in that case.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }

    /// Returns the bound address of the instance `(role, name)`.
    #[must_use]
    pub fn local_addr(&self, role: Role, name: &str) -> Option<SocketAddr> {
        self.instances
            .lock()
            .iter()
            .find(|r| r.id().role == role && r.id().name == name)
            .and_then(|r| r.local_addr())
    }

    /// Returns the running instances.
    #[must_use]
    pub fn instances(&self) -> Vec<Arc<RelayInstance>> {
        self.instances.lock().clone()
    }

    /// Returns the descriptors this manager was built from.
    #[must_use]
    pub fn descriptors(&self) -> &[RoleDescriptor] {
        &self.descriptors
    }

    /// Returns `true` while instances are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.instances.lock().is_empty()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use swgp_core::{ProxyMode, Psk};
    use swgp_transport::UdpTransport;

    fn descriptor(role: Role, name: &str, listen: &str) -> RoleDescriptor {
        RoleDescriptor::new(
            name,
            role,
            listen.parse().unwrap(),
            "127.0.0.1:51820".parse().unwrap(),
            ProxyMode::Paranoid,
            Psk::generate(),
        )
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Manager::new(vec![
            descriptor(Role::Server, "wg0", "127.0.0.1:0"),
            descriptor(Role::Server, "wg0", "127.0.0.1:0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateInstance(_)));

        // Same name under different roles is fine
        assert!(Manager::new(vec![
            descriptor(Role::Server, "wg0", "127.0.0.1:0"),
            descriptor(Role::Client, "wg0", "127.0.0.1:0"),
        ])
        .is_ok());
    }

    #[tokio::test]
    async fn test_start_stop_restart() {
        let manager = Manager::new(vec![
            descriptor(Role::Server, "a", "127.0.0.1:0"),
            descriptor(Role::Client, "b", "127.0.0.1:0"),
        ])
        .unwrap();

        manager.start().await.unwrap();
        assert!(manager.is_running());
        assert!(manager.local_addr(Role::Server, "a").is_some());
        assert!(manager.local_addr(Role::Client, "b").is_some());
        assert!(manager.local_addr(Role::Client, "a").is_none());
        assert!(matches!(
            manager.start().await,
            Err(ServiceError::AlreadyRunning)
        ));

        manager.stop().await;
        manager.stop().await;
        assert!(!manager.is_running());

        manager.start().await.unwrap();
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let manager = Arc::new(
            Manager::new(vec![descriptor(Role::Server, "wg0", "127.0.0.1:0")]).unwrap(),
        );
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let runner = Arc::clone(&manager);
        let task = tokio::spawn(async move {
            runner
                .run(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::time::timeout(std::time::Duration::from_secs(3), async {
            while !manager.is_running() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("manager never started");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_run_returns_startup_error() {
        let taken = UdpTransport::bind("127.0.0.1:0").unwrap();
        let taken_addr = swgp_transport::Transport::local_addr(&taken).unwrap();
        let manager =
            Manager::new(vec![descriptor(Role::Server, "wg0", &taken_addr.to_string())]).unwrap();

        // A shutdown that never fires must not hang a failed start
        let err = manager.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_failed_start_unwinds() {
        let taken = UdpTransport::bind("127.0.0.1:0").unwrap();
        let taken_addr = swgp_transport::Transport::local_addr(&taken).unwrap();

        let manager = Manager::new(vec![
            descriptor(Role::Server, "first", "127.0.0.1:0"),
            descriptor(Role::Server, "second", &taken_addr.to_string()),
        ])
        .unwrap();

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }));
        assert!(!manager.is_running());
        assert!(manager.instances().is_empty());
    }
}
