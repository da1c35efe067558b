//! Circuit breaker wrapped around every outbound runtime call.
//!
//! The breaker has three states:
//!
//! - **Closed**: calls pass through; outcomes fill a rolling window of
//!   `volume_threshold` entries. Once the window is full and the failure
//!   share reaches `failure_ratio`, the breaker opens.
//! - **Open**: calls are rejected without any I/O until `open_delay` has
//!   elapsed since the breaker opened.
//! - **HalfOpen**: exactly one trial call is admitted. Its success closes
//!   the breaker with a clean window; its failure reopens it.
//!
//! One breaker exists per [`CallKind`], not per container.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use podwatch_core::PodwatchConfig;

use crate::error::{ProbeError, ProbeResult};

/// The kind of runtime call a breaker guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `GET /q/dev/<status>`
    Probe,
    /// `PUT /q/upload/<file>`
    Upload,
    /// `GET /q/dev/reload?reload=true`
    Reload,
}

impl CallKind {
    pub const ALL: [CallKind; 3] = [CallKind::Probe, CallKind::Upload, CallKind::Reload];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Probe => "probe",
            CallKind::Upload => "upload",
            CallKind::Reload => "reload",
        }
    }

    fn index(&self) -> usize {
        match self {
            CallKind::Probe => 0,
            CallKind::Upload => 1,
            CallKind::Reload => 2,
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tuning for a circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSettings {
    /// Rolling window size; the breaker cannot open before it fills.
    pub volume_threshold: u32,
    /// Failure share of the window at which the breaker opens.
    pub failure_ratio: f64,
    /// Time spent open before a trial call is admitted.
    pub open_delay: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            volume_threshold: 10,
            failure_ratio: 0.5,
            open_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&PodwatchConfig> for BreakerSettings {
    fn from(config: &PodwatchConfig) -> Self {
        Self {
            volume_threshold: config.circuit_breaker.volume_threshold.max(1),
            failure_ratio: config.circuit_breaker.failure_ratio,
            open_delay: config.open_delay(),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Recent outcomes while closed; `true` is a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped each time the breaker closes after a trial.
    generation: u64,
}

/// Circuit breaker for one call kind.
#[derive(Debug)]
pub struct CircuitBreaker {
    kind: CallKind,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(kind: CallKind, settings: BreakerSettings) -> Self {
        let capacity = settings.volume_threshold as usize;
        Self {
            kind,
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(capacity),
                opened_at: None,
                trial_in_flight: false,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // The state machine stays consistent across a poisoning panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask to make a call. Returns a permit that must be resolved with
    /// the call's outcome, or `CircuitOpen` if the call must fail fast.
    pub fn try_acquire(&self) -> ProbeResult<BreakerPermit<'_>> {
        let mut inner = self.lock();
        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed < self.settings.open_delay {
                    return Err(ProbeError::CircuitOpen(self.kind));
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                info!(kind = %self.kind, "circuit breaker half-open, admitting trial call");
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(ProbeError::CircuitOpen(self.kind));
                }
                inner.trial_in_flight = true;
                true
            }
        };
        Ok(BreakerPermit {
            breaker: self,
            trial,
            generation: inner.generation,
            resolved: false,
        })
    }

    fn on_success(&self, trial: bool, generation: u64) {
        let mut inner = self.lock();
        if trial {
            inner.state = CircuitState::Closed;
            inner.window.clear();
            inner.opened_at = None;
            inner.trial_in_flight = false;
            inner.generation += 1;
            info!(kind = %self.kind, "circuit breaker closed after successful trial");
        } else if self.is_current(&inner, generation) {
            self.push_outcome(&mut inner, false);
        }
    }

    fn on_failure(&self, trial: bool, generation: u64) {
        let mut inner = self.lock();
        if trial {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            warn!(kind = %self.kind, "circuit breaker reopened after failed trial");
            return;
        }
        if !self.is_current(&inner, generation) {
            return;
        }
        self.push_outcome(&mut inner, true);
        let total = inner.window.len();
        let failures = inner.window.iter().filter(|failed| **failed).count();
        if total >= self.settings.volume_threshold as usize
            && failures as f64 / total as f64 >= self.settings.failure_ratio
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(
                kind = %self.kind,
                failures,
                window = total,
                "circuit breaker opened"
            );
        }
    }

    /// Whether a non-trial outcome still belongs to the running closed window.
    ///
    /// Calls admitted before the breaker opened, or in an earlier closed
    /// period, are stale and leave the state untouched.
    fn is_current(&self, inner: &BreakerInner, generation: u64) -> bool {
        inner.state == CircuitState::Closed && inner.generation == generation
    }

    fn push_outcome(&self, inner: &mut BreakerInner, failed: bool) {
        if inner.window.len() >= self.settings.volume_threshold as usize {
            inner.window.pop_front();
        }
        inner.window.push_back(failed);
    }

    /// Current state, without transitioning Open → HalfOpen.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }
}

/// Admission to make one guarded call.
///
/// Dropping an unresolved permit counts as a failure, so a cancelled
/// trial call cannot wedge the breaker in half-open.
#[must_use = "resolve the permit with the call outcome"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Admitted as the half-open trial call.
    trial: bool,
    generation: u64,
    resolved: bool,
}

impl BreakerPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial, self.generation);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.trial, self.generation);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            debug!(kind = %self.breaker.kind, "breaker permit dropped unresolved");
            self.breaker.on_failure(self.trial, self.generation);
        }
    }
}

/// The three per-call-kind breakers used by the runtime client.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: [CircuitBreaker; 3],
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            breakers: CallKind::ALL.map(|kind| CircuitBreaker::new(kind, settings.clone())),
        }
    }

    pub fn get(&self, kind: CallKind) -> &CircuitBreaker {
        &self.breakers[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(volume: u32, ratio: f64, delay_ms: u64) -> BreakerSettings {
        BreakerSettings {
            volume_threshold: volume,
            failure_ratio: ratio,
            open_delay: Duration::from_millis(delay_ms),
        }
    }

    fn fail(cb: &CircuitBreaker, n: usize) {
        for _ in 0..n {
            cb.try_acquire().unwrap().failure();
        }
    }

    fn succeed(cb: &CircuitBreaker, n: usize) {
        for _ in 0..n {
            cb.try_acquire().unwrap().success();
        }
    }

    #[tokio::test]
    async fn starts_closed() {
        let cb = CircuitBreaker::new(CallKind::Probe, BreakerSettings::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn stays_closed_until_window_fills() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(10, 0.5, 1000));
        fail(&cb, 9);
        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&cb, 1);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_breaker_fails_fast() {
        let cb = CircuitBreaker::new(CallKind::Upload, settings(4, 0.5, 1000));
        fail(&cb, 4);

        let err = cb.try_acquire().err().unwrap();
        assert!(matches!(err, ProbeError::CircuitOpen(CallKind::Upload)));
    }

    #[tokio::test]
    async fn ratio_below_threshold_keeps_closed() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(10, 0.5, 1000));
        succeed(&cb, 6);
        fail(&cb, 4);
        assert_eq!(cb.state(), CircuitState::Closed);

        // The window rolls: one more failure pushes out a success (5/10).
        fail(&cb, 1);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_exactly_one_trial() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(2, 0.5, 1000));
        fail(&cb, 2);
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        let trial = cb.try_acquire().expect("trial call admitted");
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Only one trial at a time.
        assert!(cb.try_acquire().is_err());

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_and_restarts_delay() {
        let cb = CircuitBreaker::new(CallKind::Reload, settings(2, 0.5, 1000));
        fail(&cb, 2);

        tokio::time::advance(Duration::from_millis(1000)).await;
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_permit_counts_as_failure() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(1, 1.0, 100));
        fail(&cb, 1);

        tokio::time::advance(Duration::from_millis(100)).await;
        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_window_is_cleared_after_recovery() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(4, 0.5, 10));
        fail(&cb, 4);
        tokio::time::advance(Duration::from_millis(10)).await;
        succeed(&cb, 1);

        // A fresh window needs to fill again before the breaker can reopen.
        fail(&cb, 3);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_success_does_not_close_during_trial() {
        let cb = CircuitBreaker::new(CallKind::Upload, settings(2, 0.5, 1000));
        let slow = cb.try_acquire().unwrap();
        fail(&cb, 2);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let trial = cb.try_acquire().expect("trial call admitted");
        assert!(trial.is_trial());
        assert!(!slow.is_trial());

        slow.success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_err());

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_failure_does_not_reopen_during_trial() {
        let cb = CircuitBreaker::new(CallKind::Reload, settings(2, 0.5, 1000));
        let slow = cb.try_acquire().unwrap();
        fail(&cb, 2);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let trial = cb.try_acquire().unwrap();
        slow.failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn outcome_from_earlier_closed_period_is_ignored() {
        let cb = CircuitBreaker::new(CallKind::Probe, settings(2, 0.5, 10));
        let slow = cb.try_acquire().unwrap();
        fail(&cb, 2);
        tokio::time::advance(Duration::from_millis(10)).await;
        succeed(&cb, 1);

        // Only one failure lands in the fresh window; it needs two to open.
        fail(&cb, 1);
        drop(slow);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb, 1);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn registry_keeps_one_breaker_per_kind() {
        let registry = BreakerRegistry::new(settings(1, 1.0, 1000));
        registry.get(CallKind::Probe).try_acquire().unwrap().failure();

        assert_eq!(registry.get(CallKind::Probe).state(), CircuitState::Open);
        assert_eq!(registry.get(CallKind::Upload).state(), CircuitState::Closed);
        assert_eq!(registry.get(CallKind::Reload).kind(), CallKind::Reload);
    }

    #[test]
    fn settings_from_config() {
        let mut config = PodwatchConfig::default();
        config.circuit_breaker.volume_threshold = 20;
        config.circuit_breaker.open_delay = "2s".to_string();

        let settings = BreakerSettings::from(&config);
        assert_eq!(settings.volume_threshold, 20);
        assert_eq!(settings.failure_ratio, 0.5);
        assert_eq!(settings.open_delay, Duration::from_secs(2));
    }
}
