//! Memory Change Listener
//!
//! Handlers registered with [`MemoryFacade::on_change`] are served by one
//! background task that holds the control plane's memory event stream,
//! matches each event against every subscription and runs the matching
//! handlers in registration order.
//!
//! # Lifecycle
//!
//! ```ignore
//! agent.memory().session("s1").on_change(["prefs.*"], |event| async move {
//!     tracing::info!(key = %event.key, "Preference changed");
//!     Ok(())
//! });
//! let listener = memory_events::start(&agent);
//! // ... serve ...
//! listener.shutdown().await;
//! ```
//!
//! A dropped stream is reopened with exponential backoff. A failing or
//! panicking handler is logged and never stops the loop.
//!
//! [`MemoryFacade::on_change`]: crate::memory::MemoryFacade::on_change

use crate::agent::Agent;
use crate::constants::{MEMORY_EVENTS_RECONNECT_INITIAL_MS, MEMORY_EVENTS_RECONNECT_MAX_MS};
use crate::error::AgentResult;
use agentfield_core::{key_matches, MemoryChangeEvent, MemoryScope};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

pub type ChangeHandler =
    Arc<dyn Fn(MemoryChangeEvent) -> BoxFuture<'static, AgentResult<()>> + Send + Sync>;

pub(crate) struct Subscription {
    patterns: Vec<String>,
    /// `None` listens across every scope.
    scope: Option<MemoryScope>,
    handler: ChangeHandler,
}

impl Subscription {
    pub(crate) fn new(patterns: Vec<String>, scope: Option<MemoryScope>, handler: ChangeHandler) -> Self {
        Self {
            patterns,
            scope,
            handler,
        }
    }

    fn matches(&self, event: &MemoryChangeEvent) -> bool {
        if let Some(scope) = &self.scope {
            if !event.in_scope(scope) {
                return false;
            }
        }
        self.patterns.iter().any(|p| key_matches(p, &event.key))
    }

    fn label(&self) -> String {
        self.patterns.join(",")
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionSet {
    entries: RwLock<Vec<Arc<Subscription>>>,
}

impl SubscriptionSet {
    pub(crate) fn add(&self, subscription: Subscription) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(subscription));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn matching(&self, event: &MemoryChangeEvent) -> Vec<Arc<Subscription>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.matches(event))
            .cloned()
            .collect()
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ListenerMetrics {
    pub connections: AtomicU64,
    pub events_received: AtomicU64,
    pub handlers_run: AtomicU64,
    pub handler_failures: AtomicU64,
}

impl ListenerMetrics {
    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            handlers_run: self.handlers_run.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSnapshot {
    pub connections: u64,
    pub events_received: u64,
    pub handlers_run: u64,
    pub handler_failures: u64,
}

// ============================================================================
// HANDLE
// ============================================================================

/// Owns the listener task started by [`start`].
#[derive(Debug)]
pub struct MemoryListenerHandle {
    metrics: Arc<ListenerMetrics>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl MemoryListenerHandle {
    fn inactive() -> Self {
        Self {
            metrics: Arc::new(ListenerMetrics::default()),
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.task.is_some()
    }

    pub fn metrics(&self) -> ListenerSnapshot {
        self.metrics.snapshot()
    }

    pub async fn shutdown(mut self) -> ListenerSnapshot {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Memory listener ended abnormally");
            }
        }
        self.metrics.snapshot()
    }
}

// ============================================================================
// LISTENER
// ============================================================================

/// Start the listener for every subscription registered so far.
///
/// Without a control plane or without subscriptions nothing is spawned.
/// Subscriptions added after a listener started are still served.
pub fn start(agent: &Agent) -> MemoryListenerHandle {
    if agent.control_plane().is_none() {
        return MemoryListenerHandle::inactive();
    }
    let subscriptions = agent.memory_subscriptions().len();
    if subscriptions == 0 {
        return MemoryListenerHandle::inactive();
    }

    tracing::info!(
        node_id = %agent.node_id(),
        subscriptions,
        "Memory listener started"
    );

    let metrics = Arc::new(ListenerMetrics::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(listener_task(
        agent.clone(),
        Arc::clone(&metrics),
        shutdown_rx,
    ));

    MemoryListenerHandle {
        metrics,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

async fn listener_task(
    agent: Agent,
    metrics: Arc<ListenerMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let Some(control_plane) = agent.control_plane().cloned() else {
        return;
    };
    let initial = Duration::from_millis(MEMORY_EVENTS_RECONNECT_INITIAL_MS);
    let max = Duration::from_millis(MEMORY_EVENTS_RECONNECT_MAX_MS);
    let mut backoff = initial;

    'outer: loop {
        let connected = tokio::select! {
            _ = stopped(&mut shutdown_rx) => break,
            connected = control_plane.subscribe_memory_events() => connected,
        };

        match connected {
            Ok(mut events) => {
                metrics.connections.fetch_add(1, Ordering::Relaxed);
                backoff = initial;
                tracing::debug!(node_id = %agent.node_id(), "Memory event stream open");

                loop {
                    let event = tokio::select! {
                        _ = stopped(&mut shutdown_rx) => break 'outer,
                        event = events.recv() => event,
                    };
                    let Some(event) = event else {
                        break;
                    };
                    metrics.events_received.fetch_add(1, Ordering::Relaxed);
                    deliver(&agent, &metrics, event).await;
                }
                tracing::warn!(node_id = %agent.node_id(), "Memory event stream closed");
            }
            Err(e) => {
                tracing::warn!(
                    node_id = %agent.node_id(),
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Memory event stream unavailable"
                );
            }
        }

        tokio::select! {
            _ = stopped(&mut shutdown_rx) => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(max);
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        node_id = %agent.node_id(),
        events_received = snapshot.events_received,
        handler_failures = snapshot.handler_failures,
        "Memory listener stopped"
    );
}

/// Resolves once shutdown was requested or the handle was dropped.
async fn stopped(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn deliver(agent: &Agent, metrics: &ListenerMetrics, event: MemoryChangeEvent) {
    for subscription in agent.memory_subscriptions().matching(&event) {
        metrics.handlers_run.fetch_add(1, Ordering::Relaxed);
        let run = AssertUnwindSafe((subscription.handler)(event.clone())).catch_unwind();
        let failure = match run.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("handler panicked".to_string()),
        };
        if let Some(error) = failure {
            metrics.handler_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                key = %event.key,
                patterns = %subscription.label(),
                error = %error,
                "Memory change handler failed"
            );
        }
    }
}
