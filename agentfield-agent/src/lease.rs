//! Node Lease Manager
//!
//! Registers the node before it serves traffic, marks it ready, then renews
//! its lease on a fixed interval until shutdown.
//!
//! # Lifecycle
//!
//! ```ignore
//! let lease = lease::start(&agent).await?;
//! // ... serve ...
//! lease.shutdown(&agent).await;
//! ```
//!
//! Registration failure aborts startup unless the node runs in dev mode.
//! Renewal failures are logged and never stop the loop.

use crate::agent::Agent;
use crate::constants::DEFAULT_LEASE_TIMEOUT_SECS;
use crate::control_plane::{ControlPlane, ShutdownNotice, StatusUpdate};
use crate::error::{AgentError, AgentResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct LeaseMetrics {
    pub renewals_sent: AtomicU64,
    pub renewal_failures: AtomicU64,
}

impl LeaseMetrics {
    pub fn snapshot(&self) -> LeaseSnapshot {
        LeaseSnapshot {
            renewals_sent: self.renewals_sent.load(Ordering::Relaxed),
            renewal_failures: self.renewal_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseSnapshot {
    pub renewals_sent: u64,
    pub renewal_failures: u64,
}

// ============================================================================
// HANDLE
// ============================================================================

/// Owns the renewal loop started by [`start`].
#[derive(Debug)]
pub struct LeaseHandle {
    registered: bool,
    metrics: Arc<LeaseMetrics>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl LeaseHandle {
    fn inactive(registered: bool) -> Self {
        Self {
            registered,
            metrics: Arc::new(LeaseMetrics::default()),
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_renewing(&self) -> bool {
        self.task.is_some()
    }

    pub fn metrics(&self) -> LeaseSnapshot {
        self.metrics.snapshot()
    }

    /// Stop renewing, mark the node offline and tell the control plane it
    /// is leaving.
    pub async fn shutdown(mut self, agent: &Agent) -> LeaseSnapshot {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Lease task ended abnormally");
            }
        }

        if self.registered {
            if let Some(control_plane) = agent.control_plane() {
                let timeout = Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS);
                let offline = StatusUpdate::offline();
                match tokio::time::timeout(
                    timeout,
                    control_plane.update_status(agent.node_id(), &offline),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Failed to mark node offline"),
                    Err(_) => tracing::warn!("Offline status update timed out"),
                }

                let notice = ShutdownNotice {
                    reason: "shutdown".to_string(),
                };
                match tokio::time::timeout(
                    timeout,
                    control_plane.notify_shutdown(agent.node_id(), &notice),
                )
                .await
                {
                    Ok(Ok(())) => tracing::info!(node_id = %agent.node_id(), "Shutdown notified"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "Shutdown notification failed"),
                    Err(_) => tracing::warn!("Shutdown notification timed out"),
                }
            }
        }

        self.metrics.snapshot()
    }
}

// ============================================================================
// STARTUP
// ============================================================================

/// Register the node, mark it ready and start lease renewal.
pub async fn start(agent: &Agent) -> AgentResult<LeaseHandle> {
    let Some(control_plane) = agent.control_plane().cloned() else {
        tracing::info!(node_id = %agent.node_id(), "No control plane configured, running standalone");
        return Ok(LeaseHandle::inactive(false));
    };
    let config = agent.config();

    if let Err(e) = control_plane.register_node(&agent.registration_payload()).await {
        let err = match e {
            AgentError::Registration(_) => e,
            other => AgentError::Registration(other.to_string()),
        };
        if !config.dev_mode {
            tracing::error!(node_id = %config.node_id, error = %err, "Node registration failed");
            return Err(err);
        }
        tracing::warn!(
            node_id = %config.node_id,
            error = %err,
            "Node registration failed, continuing in dev mode"
        );
        return Ok(LeaseHandle::inactive(false));
    }

    tracing::info!(
        node_id = %config.node_id,
        base_url = %config.base_url(),
        capabilities = agent.registry().len(),
        "Node registered"
    );

    if let Err(e) = control_plane
        .update_status(&config.node_id, &StatusUpdate::ready())
        .await
    {
        tracing::warn!(node_id = %config.node_id, error = %e, "Failed to mark node ready");
    }

    if !config.lease_enabled() {
        tracing::debug!(node_id = %config.node_id, "Lease renewal disabled");
        return Ok(LeaseHandle::inactive(true));
    }

    let metrics = Arc::new(LeaseMetrics::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(lease_task(
        control_plane,
        config.node_id.clone(),
        config.lease_interval,
        Arc::clone(&metrics),
        shutdown_rx,
    ));

    Ok(LeaseHandle {
        registered: true,
        metrics,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn lease_task(
    control_plane: Arc<dyn ControlPlane>,
    node_id: String,
    period: Duration,
    metrics: Arc<LeaseMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let renewal_timeout = Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS);
    let ready = StatusUpdate::ready();

    tracing::info!(
        node_id = %node_id,
        interval_secs = period.as_secs(),
        "Lease renewal started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                metrics.renewals_sent.fetch_add(1, Ordering::Relaxed);
                let renewal = control_plane.update_status(&node_id, &ready);
                let error = match tokio::time::timeout(renewal_timeout, renewal).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some("timed out".to_string()),
                };
                if let Some(error) = error {
                    metrics.renewal_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(node_id = %node_id, error = %error, "Lease renewal failed");
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        node_id = %node_id,
        renewals_sent = snapshot.renewals_sent,
        renewal_failures = snapshot.renewal_failures,
        "Lease renewal stopped"
    );
}
