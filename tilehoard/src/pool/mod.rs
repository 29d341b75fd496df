//! Upstream server selection with per-server health tracking.
//!
//! Every request asks the pool for a server. Servers are chosen by smooth
//! weighted round-robin among those currently eligible, and each server runs
//! its own small circuit:
//!
//! ```text
//! Healthy --[failure_exclusion_threshold consecutive failures]--> Excluded
//! Excluded --[cool_down elapsed]--> HalfOpen (one probe allowed)
//! HalfOpen --[probe succeeds]--> Healthy
//! HalfOpen --[probe fails]--> Excluded (cool-down restarts)
//! ```
//!
//! When no server is eligible, [`ServerPool::select`] waits until the earliest
//! cool-down expires or an in-flight probe resolves. An optional wait timeout
//! turns that wait into [`PoolError::WaitTimeout`].
//!
//! Health lives only in memory and is rebuilt on every run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::provider::ServerEndpoint;

/// Errors returned by [`ServerPool`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("server pool has no servers")]
    NoServers,

    #[error("no tile server became available within {waited:?}")]
    WaitTimeout { waited: Duration },
}

/// Health settings for the pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Consecutive failures that exclude a server.
    pub failure_exclusion_threshold: u32,
    /// How long an excluded server sits out.
    pub cool_down: Duration,
    /// Give up waiting for an eligible server after this long.
    pub wait_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_exclusion_threshold: crate::config::defaults::DEFAULT_FAILURE_EXCLUSION_THRESHOLD,
            cool_down: Duration::from_millis(crate::config::defaults::DEFAULT_COOL_DOWN_MS),
            wait_timeout: None,
        }
    }
}

/// Circuit state of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Selectable.
    Healthy,
    /// Sitting out a cool-down.
    Excluded,
    /// Cool-down over; at most one probe request may be in flight.
    HalfOpen,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Excluded => write!(f, "excluded"),
            HealthState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHealth {
    pub name: String,
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
}

/// A server handed out by [`ServerPool::select`].
///
/// Must be given back through exactly one of [`ServerPool::report_success`],
/// [`ServerPool::report_failure`] or [`ServerPool::release`].
#[derive(Debug, Clone)]
pub struct SelectedServer {
    index: usize,
    endpoint: Arc<ServerEndpoint>,
    probe: bool,
}

impl SelectedServer {
    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn name(&self) -> &str {
        self.endpoint.name()
    }

    /// Whether this selection is the half-open probe for its server.
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

#[derive(Debug)]
enum Circuit {
    Healthy,
    Excluded { since: Instant },
    HalfOpen { probe_in_flight: bool },
}

#[derive(Debug)]
struct ServerSlot {
    endpoint: Arc<ServerEndpoint>,
    circuit: Circuit,
    consecutive_failures: u32,
    current_weight: i64,
    total_successes: u64,
    total_failures: u64,
}

impl ServerSlot {
    /// Moves an excluded server to half-open once its cool-down has elapsed.
    fn refresh(&mut self, now: Instant, cool_down: Duration) {
        if let Circuit::Excluded { since } = self.circuit {
            if now.duration_since(since) >= cool_down {
                self.circuit = Circuit::HalfOpen {
                    probe_in_flight: false,
                };
                info!(
                    server = self.endpoint.name(),
                    "Server cool-down over, admitting one probe"
                );
            }
        }
    }

    fn is_eligible(&self) -> bool {
        matches!(
            self.circuit,
            Circuit::Healthy
                | Circuit::HalfOpen {
                    probe_in_flight: false
                }
        )
    }

    fn readmit_at(&self, cool_down: Duration) -> Option<Instant> {
        match self.circuit {
            Circuit::Excluded { since } => Some(since + cool_down),
            _ => None,
        }
    }
}

/// Shared, internally synchronized set of upstream servers.
///
/// Clone the surrounding `Arc` to share between workers.
#[derive(Debug)]
pub struct ServerPool {
    config: PoolConfig,
    slots: Mutex<Vec<ServerSlot>>,
    changed: Notify,
}

impl ServerPool {
    pub fn new(servers: Vec<ServerEndpoint>, config: PoolConfig) -> Result<Self, PoolError> {
        if servers.is_empty() {
            return Err(PoolError::NoServers);
        }

        let slots = servers
            .into_iter()
            .map(|endpoint| ServerSlot {
                endpoint: Arc::new(endpoint),
                circuit: Circuit::Healthy,
                consecutive_failures: 0,
                current_weight: 0,
                total_successes: 0,
                total_failures: 0,
            })
            .collect();

        Ok(Self {
            config,
            slots: Mutex::new(slots),
            changed: Notify::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Picks the next server, waiting while every server is excluded.
    pub async fn select(&self) -> Result<SelectedServer, PoolError> {
        let started = Instant::now();
        let deadline = self.config.wait_timeout.map(|t| started + t);
        let mut logged_wait = false;

        loop {
            // Register for wake-ups before inspecting state so a report that
            // lands in between is not missed.
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let next_readmit = match self.try_select(Instant::now()) {
                Ok(selected) => return Ok(selected),
                Err(next_readmit) => next_readmit,
            };

            if !logged_wait {
                warn!(
                    servers = self.len(),
                    "All tile servers excluded, waiting for cool-down"
                );
                logged_wait = true;
            }

            let wake_at = match (next_readmit, deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = &mut changed => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => changed.await,
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    // One last look: the wake may have coincided with a readmission.
                    if let Ok(selected) = self.try_select(Instant::now()) {
                        return Ok(selected);
                    }
                    return Err(PoolError::WaitTimeout {
                        waited: Instant::now().duration_since(started),
                    });
                }
            }
        }
    }

    /// Non-blocking selection.
    ///
    /// On failure returns the earliest instant an excluded server will be
    /// readmitted, if any.
    fn try_select(&self, now: Instant) -> Result<SelectedServer, Option<Instant>> {
        let mut slots = self.slots.lock();
        let cool_down = self.config.cool_down;

        // Smooth weighted round-robin: every eligible server gains its weight,
        // the heaviest wins and pays back the total. Ties keep the earlier server.
        let mut total: i64 = 0;
        let mut best: Option<(usize, i64)> = None;
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.refresh(now, cool_down);
            if !slot.is_eligible() {
                continue;
            }
            let weight = i64::from(slot.endpoint.weight());
            slot.current_weight += weight;
            total += weight;
            if best.map_or(true, |(_, w)| slot.current_weight > w) {
                best = Some((index, slot.current_weight));
            }
        }

        let Some((index, _)) = best else {
            let next = slots.iter().filter_map(|s| s.readmit_at(cool_down)).min();
            return Err(next);
        };

        let slot = &mut slots[index];
        slot.current_weight -= total;

        let probe = matches!(slot.circuit, Circuit::HalfOpen { .. });
        if probe {
            slot.circuit = Circuit::HalfOpen {
                probe_in_flight: true,
            };
            debug!(server = slot.endpoint.name(), "Sending half-open probe");
        }

        Ok(SelectedServer {
            index,
            endpoint: Arc::clone(&slot.endpoint),
            probe,
        })
    }

    /// Records a successful fetch; closes the server's circuit.
    pub fn report_success(&self, server: &SelectedServer) {
        {
            let mut slots = self.slots.lock();
            let slot = &mut slots[server.index];
            slot.consecutive_failures = 0;
            slot.total_successes += 1;
            if !matches!(slot.circuit, Circuit::Healthy) {
                info!(server = slot.endpoint.name(), "Server recovered");
                slot.circuit = Circuit::Healthy;
            }
        }
        self.changed.notify_waiters();
    }

    /// Records a transient failure; may exclude the server.
    pub fn report_failure(&self, server: &SelectedServer) {
        let now = Instant::now();
        {
            let mut slots = self.slots.lock();
            let threshold = self.config.failure_exclusion_threshold;
            let slot = &mut slots[server.index];
            slot.consecutive_failures = slot.consecutive_failures.saturating_add(1);
            slot.total_failures += 1;

            match slot.circuit {
                Circuit::HalfOpen { .. } if server.probe => {
                    slot.circuit = Circuit::Excluded { since: now };
                    warn!(
                        server = slot.endpoint.name(),
                        cool_down_ms = self.config.cool_down.as_millis() as u64,
                        "Probe failed, server excluded again"
                    );
                }
                Circuit::Healthy if slot.consecutive_failures >= threshold => {
                    slot.circuit = Circuit::Excluded { since: now };
                    warn!(
                        server = slot.endpoint.name(),
                        consecutive_failures = slot.consecutive_failures,
                        cool_down_ms = self.config.cool_down.as_millis() as u64,
                        "Server excluded after repeated failures"
                    );
                }
                _ => {}
            }
        }
        self.changed.notify_waiters();
    }

    /// Returns a selection without a health verdict.
    ///
    /// Used for answers that say nothing about server health (absent tiles,
    /// permanent errors) and for abandoned requests. Frees the probe slot if
    /// this selection was the probe.
    pub fn release(&self, server: &SelectedServer) {
        if !server.probe {
            return;
        }
        {
            let mut slots = self.slots.lock();
            let slot = &mut slots[server.index];
            if let Circuit::HalfOpen { probe_in_flight } = &mut slot.circuit {
                *probe_in_flight = false;
            }
        }
        self.changed.notify_waiters();
    }

    /// Snapshot of every server's health, in configuration order.
    pub fn health(&self) -> Vec<ServerHealth> {
        let mut slots = self.slots.lock();
        let now = Instant::now();
        slots
            .iter_mut()
            .map(|slot| {
                slot.refresh(now, self.config.cool_down);
                ServerHealth {
                    name: slot.endpoint.name().to_string(),
                    state: match slot.circuit {
                        Circuit::Healthy => HealthState::Healthy,
                        Circuit::Excluded { .. } => HealthState::Excluded,
                        Circuit::HalfOpen { .. } => HealthState::HalfOpen,
                    },
                    consecutive_failures: slot.consecutive_failures,
                    total_successes: slot.total_successes,
                    total_failures: slot.total_failures,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::UrlTemplate;

    fn server(name: &str, weight: u32) -> ServerEndpoint {
        ServerEndpoint::new(
            UrlTemplate::parse(format!("https://{}.test/{{z}}/{{x}}/{{y}}.png", name)).unwrap(),
        )
        .with_name(name)
        .with_weight(weight)
    }

    fn config(threshold: u32, cool_down_ms: u64) -> PoolConfig {
        PoolConfig {
            failure_exclusion_threshold: threshold,
            cool_down: Duration::from_millis(cool_down_ms),
            wait_timeout: None,
        }
    }

    async fn pick(pool: &ServerPool) -> SelectedServer {
        pool.select().await.unwrap()
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert_eq!(
            ServerPool::new(vec![], PoolConfig::default()).unwrap_err(),
            PoolError::NoServers
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_smooth_weighted_round_robin() {
        let pool = ServerPool::new(vec![server("a", 3), server("b", 1)], config(5, 1000)).unwrap();

        let mut names = Vec::new();
        for _ in 0..8 {
            let selected = pick(&pool).await;
            names.push(selected.name().to_string());
            pool.report_success(&selected);
        }

        assert_eq!(names, vec!["a", "a", "b", "a", "a", "a", "b", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_weights_alternate() {
        let pool = ServerPool::new(vec![server("a", 1), server("b", 1)], config(5, 1000)).unwrap();
        let first = pick(&pool).await;
        let second = pick(&pool).await;
        assert_ne!(first.name(), second.name());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusion_after_threshold() {
        let pool = ServerPool::new(vec![server("bad", 1), server("good", 1)], config(2, 5000)).unwrap();

        // Drive "bad" to the threshold
        let mut failures = 0;
        while failures < 2 {
            let selected = pick(&pool).await;
            if selected.name() == "bad" {
                pool.report_failure(&selected);
                failures += 1;
            } else {
                pool.report_success(&selected);
            }
        }

        assert_eq!(pool.health()[0].state, HealthState::Excluded);
        assert_eq!(pool.health()[0].consecutive_failures, 2);

        // Healthy server keeps being selected during the cool-down
        for _ in 0..5 {
            let selected = pick(&pool).await;
            assert_eq!(selected.name(), "good");
            pool.report_success(&selected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_single_probe() {
        let pool = ServerPool::new(vec![server("a", 1), server("b", 1)], config(1, 1000)).unwrap();

        let first = pick(&pool).await;
        assert_eq!(first.name(), "a");
        pool.report_failure(&first);
        assert_eq!(pool.health()[0].state, HealthState::Excluded);

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(pool.health()[0].state, HealthState::HalfOpen);

        let mut probes = 0;
        let mut held = Vec::new();
        for _ in 0..6 {
            let selected = pick(&pool).await;
            if selected.name() == "a" {
                assert!(selected.is_probe());
                probes += 1;
            }
            held.push(selected);
        }
        assert_eq!(probes, 1, "only one probe may be in flight");

        let probe = held.iter().find(|s| s.is_probe()).unwrap();
        pool.report_success(probe);
        assert_eq!(pool.health()[0].state, HealthState::Healthy);
        assert_eq!(pool.health()[0].consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_restarts_cool_down() {
        let pool = ServerPool::new(vec![server("a", 1)], config(1, 1000)).unwrap();

        let first = pick(&pool).await;
        pool.report_failure(&first);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let probe = pick(&pool).await;
        assert!(probe.is_probe());
        pool.report_failure(&probe);
        assert_eq!(pool.health()[0].state, HealthState::Excluded);

        let before = Instant::now();
        let next = pick(&pool).await;
        assert!(next.is_probe());
        assert!(Instant::now().duration_since(before) >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_waits_for_cool_down() {
        let pool = ServerPool::new(vec![server("a", 1)], config(1, 2000)).unwrap();
        let first = pick(&pool).await;
        pool.report_failure(&first);

        let before = Instant::now();
        let selected = pick(&pool).await;
        assert_eq!(selected.name(), "a");
        assert!(Instant::now().duration_since(before) >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_times_out() {
        let mut cfg = config(1, 10_000);
        cfg.wait_timeout = Some(Duration::from_millis(500));
        let pool = ServerPool::new(vec![server("a", 1)], cfg).unwrap();

        let first = pick(&pool).await;
        pool.report_failure(&first);

        let result = pool.select().await;
        assert!(matches!(result, Err(PoolError::WaitTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_resolution_wakes_waiters() {
        let pool = Arc::new(ServerPool::new(vec![server("a", 1)], config(1, 1000)).unwrap());

        let first = pick(&pool).await;
        pool.report_failure(&first);
        tokio::time::advance(Duration::from_millis(1000)).await;
        let probe = pick(&pool).await;

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.select().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        pool.report_success(&probe);
        let selected = waiter.await.unwrap().unwrap();
        assert_eq!(selected.name(), "a");
        assert!(!selected.is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_frees_probe_without_verdict() {
        let pool = ServerPool::new(vec![server("a", 1)], config(1, 1000)).unwrap();

        let first = pick(&pool).await;
        pool.report_failure(&first);
        tokio::time::advance(Duration::from_millis(1000)).await;

        let probe = pick(&pool).await;
        pool.release(&probe);
        assert_eq!(pool.health()[0].state, HealthState::HalfOpen);

        let again = pick(&pool).await;
        assert!(again.is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failures() {
        let pool = ServerPool::new(vec![server("a", 1)], config(3, 1000)).unwrap();
        for _ in 0..2 {
            let s = pick(&pool).await;
            pool.report_failure(&s);
        }
        let s = pick(&pool).await;
        pool.report_success(&s);

        let health = &pool.health()[0];
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.total_failures, 2);
        assert_eq!(health.total_successes, 1);
        assert_eq!(health.state, HealthState::Healthy);
    }
}
