use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use cosign_core::domain::NotificationType;
use cosign_core::foundation::{CosignError, Result};
use log::{debug, error, info};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Proposal lifecycle stage a notification reports, if any.
pub fn proposal_stage(kind: NotificationType) -> Option<&'static str> {
    match kind {
        NotificationType::NewTxProposal => Some("published"),
        NotificationType::TxProposalAcceptedBy => Some("signed"),
        NotificationType::TxProposalFinallyAccepted => Some("accepted"),
        NotificationType::TxProposalRejectedBy => Some("rejected"),
        NotificationType::TxProposalFinallyRejected => Some("finally_rejected"),
        NotificationType::NewOutgoingTx | NotificationType::NewOutgoingTxByThirdParty => Some("broadcast"),
        NotificationType::TxProposalRemoved => Some("removed"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub proposals_published: u64,
    pub proposals_signed: u64,
    pub proposals_rejected: u64,
    pub proposals_broadcast: u64,
    pub proposals_removed: u64,
    pub lock_grants: u64,
    pub lock_waits: u64,
    pub lock_timeouts: u64,
    pub lock_connections: u64,
    pub relay_connections: u64,
}

pub struct Metrics {
    registry: Registry,
    proposals_total: IntCounterVec,
    lock_requests_total: IntCounterVec,
    lock_waits_total: IntCounter,
    connections_total: IntCounterVec,
    started_at: Instant,
    proposals_published: AtomicU64,
    proposals_signed: AtomicU64,
    proposals_rejected: AtomicU64,
    proposals_broadcast: AtomicU64,
    proposals_removed: AtomicU64,
    lock_grants: AtomicU64,
    lock_waits: AtomicU64,
    lock_timeouts: AtomicU64,
    lock_connections: AtomicU64,
    relay_connections: AtomicU64,
}

fn metrics_err(err: impl std::fmt::Display) -> CosignError {
    CosignError::Message(format!("metrics: {}", err))
}

impl Metrics {
    pub fn new() -> Result<Self> {
        debug!("initializing prometheus metrics");
        let registry = Registry::new();
        let proposals_total =
            IntCounterVec::new(Opts::new("cosign_proposals_total", "Proposal events seen on the relay by stage"), &["stage"])
                .map_err(metrics_err)?;
        let lock_requests_total =
            IntCounterVec::new(Opts::new("cosign_lock_requests_total", "Lock acquisitions by outcome"), &["outcome"]).map_err(metrics_err)?;
        let lock_waits_total =
            IntCounter::new("cosign_lock_waits_total", "Lock acquisitions that queued behind a holder").map_err(metrics_err)?;
        let connections_total =
            IntCounterVec::new(Opts::new("cosign_connections_total", "Accepted client connections by role"), &["role"])
                .map_err(metrics_err)?;

        registry.register(Box::new(proposals_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(lock_requests_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(lock_waits_total.clone())).map_err(metrics_err)?;
        registry.register(Box::new(connections_total.clone())).map_err(metrics_err)?;

        debug!("prometheus metrics registered metric_count=4");
        Ok(Self {
            registry,
            proposals_total,
            lock_requests_total,
            lock_waits_total,
            connections_total,
            started_at: Instant::now(),
            proposals_published: AtomicU64::new(0),
            proposals_signed: AtomicU64::new(0),
            proposals_rejected: AtomicU64::new(0),
            proposals_broadcast: AtomicU64::new(0),
            proposals_removed: AtomicU64::new(0),
            lock_grants: AtomicU64::new(0),
            lock_waits: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            lock_connections: AtomicU64::new(0),
            relay_connections: AtomicU64::new(0),
        })
    }

    /// Counts a relayed notification when it belongs to a proposal lifecycle.
    pub fn observe_notification(&self, kind: NotificationType) {
        let Some(stage) = proposal_stage(kind) else {
            return;
        };
        self.proposals_total.with_label_values(&[stage]).inc();
        let counter = match stage {
            "published" => &self.proposals_published,
            "signed" => &self.proposals_signed,
            "rejected" => &self.proposals_rejected,
            "broadcast" => &self.proposals_broadcast,
            "removed" => &self.proposals_removed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lock_wait(&self) {
        self.lock_waits_total.inc();
        self.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lock_request(&self, outcome: &str) {
        self.lock_requests_total.with_label_values(&[outcome]).inc();
        match outcome {
            "granted" => {
                self.lock_grants.fetch_add(1, Ordering::Relaxed);
            }
            "timeout" => {
                self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn inc_connection(&self, role: &str) {
        self.connections_total.with_label_values(&[role]).inc();
        match role {
            "lock_server" => {
                self.lock_connections.fetch_add(1, Ordering::Relaxed);
            }
            "relay" => {
                self.relay_connections.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            proposals_published: self.proposals_published.load(Ordering::Relaxed),
            proposals_signed: self.proposals_signed.load(Ordering::Relaxed),
            proposals_rejected: self.proposals_rejected.load(Ordering::Relaxed),
            proposals_broadcast: self.proposals_broadcast.load(Ordering::Relaxed),
            proposals_removed: self.proposals_removed.load(Ordering::Relaxed),
            lock_grants: self.lock_grants.load(Ordering::Relaxed),
            lock_waits: self.lock_waits.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            lock_connections: self.lock_connections.load(Ordering::Relaxed),
            relay_connections: self.relay_connections.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer).map_err(metrics_err)?;
        String::from_utf8(buffer).map_err(metrics_err)
    }
}

async fn handle_metrics(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => {
            let mut response = body.into_response();
            response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            response
        }
        Err(err) => {
            debug!("metrics encode failed error={}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics_error: {}", err)).into_response()
        }
    }
}

pub fn build_router(metrics: Arc<Metrics>) -> Router {
    Router::new().route("/metrics", get(handle_metrics)).with_state(metrics)
}

/// Serves `GET /metrics` until the listener fails.
pub async fn serve_metrics(listener: TcpListener, metrics: Arc<Metrics>) -> Result<()> {
    let addr = listener.local_addr().map_err(metrics_err)?;
    info!("metrics endpoint ready addr={}", addr);
    axum::serve(listener, build_router(metrics)).await.map_err(|err| {
        error!("metrics endpoint terminated unexpectedly addr={} error={}", addr, err);
        metrics_err(err)
    })
}
