//! HEALTH PROBE SCHEDULER - signal de santé périodique canonique
//!
//! RÔLE :
//! Possède l'unique sonde de santé de la session (`HEAD /api/health`) et le
//! signal que tout le reste lit : dernier résultat, télémétrie, listeners.
//!
//! FONCTIONNEMENT :
//! - Single-flight : la future de la sonde en cours est mémorisée dans un seul
//!   champ et partagée entre tous les appelants, checks immédiats compris
//! - Filtres côté timer : visible, utilisateur actif dans les 10 dernières min,
//!   5 min depuis la dernière sonde, budget horaire restant. Un cycle refusé
//!   sert le résultat en cache marqué `from_cache`
//! - Intervalle adaptatif : `min(base * min(failures, 2.5), max)`, remis à zéro
//!   au succès. Le timer relit l'intervalle avant chaque sleep
//! - Pairs : chaque résultat est publié sur le canal pair ; les résultats de
//!   pairs de moins de 60s sont adoptés sans requête
//!
//! Le timer ne tourne que si l'app est visible. Redevenir visible compte comme
//! activité utilisateur et relance le timer avec un check immédiat.

use crate::clock::SharedClock;
use crate::config::SchedulerSettings;
use crate::device::DeviceProfile;
use crate::error::TransportError;
use crate::health::{
    AdaptiveConfig, HealthCheckResult, ProbeRateLimiter, SkipReason, Telemetry, TelemetryTracker,
};
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::peer::{PeerMessage, SharedPeerChannel};
use crate::runtime::SharedRuntime;
use crate::transport::{HttpRequest, SharedTransport};
use futures::future::{BoxFuture, Either, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const HEALTH_CHECK_HEADER: &str = "X-Health-Check";

type InFlightProbe = Shared<BoxFuture<'static, HealthCheckResult>>;

/// Handle to the scheduler; clones share the same state
#[derive(Clone)]
pub struct HealthProbeScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    id: Uuid,
    settings: SchedulerSettings,
    transport: SharedTransport,
    runtime: SharedRuntime,
    peers: SharedPeerChannel,
    clock: SharedClock,
    listeners: ListenerRegistry<HealthCheckResult>,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    latest: Option<HealthCheckResult>,
    telemetry: TelemetryTracker,
    config: AdaptiveConfig,
    limiter: ProbeRateLimiter,
    last_activity_ms: i64,
    in_flight: Option<InFlightProbe>,
    timer: Option<JoinHandle<()>>,
    watchers: Vec<JoinHandle<()>>,
    started: bool,
    destroyed: bool,
}

impl HealthProbeScheduler {
    pub fn new(
        profile: &DeviceProfile,
        settings: SchedulerSettings,
        transport: SharedTransport,
        runtime: SharedRuntime,
        peers: SharedPeerChannel,
        clock: SharedClock,
    ) -> Self {
        let base = profile.optimization.probe_interval;
        let max = base * settings.max_interval_factor.max(1);
        let config = AdaptiveConfig::new(base, max, profile.device_class());
        let limiter = ProbeRateLimiter::new(
            settings.min_spacing_ms(),
            settings.hourly_budget,
            crate::health::RATE_WINDOW_MS,
        );
        let now = clock.now_ms();

        info!(
            "health probe scheduler ready (interval {:?}, max {:?}, {:?})",
            config.base_interval, config.max_interval, config.device_class
        );

        Self {
            inner: Arc::new(SchedulerInner {
                id: Uuid::new_v4(),
                settings,
                transport,
                runtime,
                peers,
                clock,
                listeners: ListenerRegistry::new(),
                state: Mutex::new(SchedulerState {
                    latest: None,
                    telemetry: TelemetryTracker::default(),
                    config,
                    limiter,
                    last_activity_ms: now,
                    in_flight: None,
                    timer: None,
                    watchers: Vec::new(),
                    started: false,
                    destroyed: false,
                }),
            }),
        }
    }

    /// Starts the periodic timer (if visible), the visibility watcher and the
    /// peer listener. Must be called inside a tokio runtime. No-op once started.
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.started || state.destroyed {
                return;
            }
            state.started = true;
        }

        let peer_rx = self.inner.peers.subscribe();
        let mut watchers = vec![spawn_visibility_watcher(&self.inner)];
        if let Some(rx) = peer_rx {
            watchers.push(spawn_peer_listener(&self.inner, rx));
        }
        self.inner.state.lock().watchers.extend(watchers);

        if self.inner.runtime.is_visible() {
            self.inner.start_timer();
        } else {
            debug!("document hidden at start, timer deferred");
        }
    }

    pub fn latest_result(&self) -> Option<HealthCheckResult> {
        self.inner.state.lock().latest.clone()
    }

    /// Probe now, skipping every scheduling gate. Joins the in-flight probe
    /// if there is one. The probe is registered when this is called, not
    /// when the returned future is first polled.
    pub fn check_health_immediate(&self) -> impl Future<Output = HealthCheckResult> + Send + 'static {
        if self.inner.state.lock().destroyed {
            return Either::Left(futures::future::ready(self.inner.cached_result()));
        }
        Either::Right(self.inner.probe())
    }

    /// One timer cycle: joins an in-flight probe, otherwise applies the
    /// visibility, activity and rate gates before probing.
    pub async fn run_scheduled_check(&self) -> HealthCheckResult {
        let now = self.inner.clock.now_ms();
        let gate = {
            let mut state = self.inner.state.lock();
            if let Some(in_flight) = &state.in_flight {
                Ok(Some(in_flight.clone()))
            } else if state.destroyed {
                Err(SkipReason::Destroyed)
            } else if !self.inner.runtime.is_visible() {
                Err(SkipReason::Hidden)
            } else if self
                .inner
                .settings
                .inactivity_timeout_ms()
                .is_some_and(|limit| now - state.last_activity_ms > limit)
            {
                Err(SkipReason::Inactive)
            } else {
                state.limiter.admit(now).map(|_| None)
            }
        };

        match gate {
            Ok(Some(in_flight)) => in_flight.await,
            Ok(None) => self.inner.probe().await,
            Err(reason) => {
                debug!("scheduled probe skipped: {:?}", reason);
                self.inner.cached_result()
            }
        }
    }

    /// Input activity (mousedown / keydown / touchstart / scroll analogue)
    pub fn record_user_activity(&self) {
        let now = self.inner.clock.now_ms();
        self.inner.state.lock().last_activity_ms = now;
    }

    /// Adopts a peer's result if it is younger than the freshness window and
    /// newer than the local one. Returns whether it was adopted.
    pub fn adopt_peer_result(&self, result: HealthCheckResult) -> bool {
        self.inner.adopt_peer_result(result)
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&HealthCheckResult) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    pub fn telemetry(&self) -> Telemetry {
        self.inner.state.lock().telemetry.snapshot()
    }

    pub fn adaptive_config(&self) -> AdaptiveConfig {
        self.inner.state.lock().config.clone()
    }

    pub fn is_timer_running(&self) -> bool {
        self.inner
            .state
            .lock()
            .timer
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    /// Cancels the timer and watchers, closes the peer channel and clears
    /// listeners. Safe to call more than once.
    pub fn destroy(&self) {
        let handles = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.in_flight = None;
            let mut handles: Vec<JoinHandle<()>> = state.watchers.drain(..).collect();
            handles.extend(state.timer.take());
            handles
        };

        for handle in handles {
            handle.abort();
        }
        self.inner.peers.close();
        self.inner.listeners.clear();
        info!("health probe scheduler destroyed");
    }
}

impl SchedulerInner {
    fn probe(self: &Arc<Self>) -> InFlightProbe {
        let mut state = self.state.lock();
        if let Some(in_flight) = &state.in_flight {
            return in_flight.clone();
        }

        state.limiter.mark_checked(self.clock.now_ms());
        let inner = Arc::clone(self);
        let probe = async move {
            let result = inner.send_probe().await;
            inner.complete(&result);
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some(probe.clone());
        probe
    }

    async fn send_probe(&self) -> HealthCheckResult {
        let request = HttpRequest::head(self.settings.health_path.clone()).header(HEALTH_CHECK_HEADER, "true");
        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(self.settings.probe_timeout(), self.transport.execute(request)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let now = self.clock.now_ms();

        match outcome {
            Err(_) => HealthCheckResult::unhealthy("Timeout", elapsed_ms, now),
            Ok(Err(TransportError::Timeout)) => HealthCheckResult::unhealthy("Timeout", elapsed_ms, now),
            Ok(Err(e)) => HealthCheckResult::unhealthy(e.to_string(), elapsed_ms, now),
            Ok(Ok(response)) if response.is_success() => HealthCheckResult::healthy(elapsed_ms, now),
            Ok(Ok(response)) => HealthCheckResult::unhealthy(format!("HTTP {}", response.status), elapsed_ms, now),
        }
    }

    fn complete(&self, result: &HealthCheckResult) {
        {
            let mut state = self.state.lock();
            state.in_flight = None;
            if state.destroyed {
                return;
            }
            state.latest = Some(result.clone());
            state.telemetry.record(result);
            state.limiter.record_completion(result.timestamp_ms);
            if result.is_healthy {
                state.config.record_success();
                debug!("health probe ok in {}ms", result.response_time_ms);
            } else {
                let next = state.config.record_failure();
                warn!(
                    "health probe failed: {} ({} consecutive, next in {:?})",
                    result.error.as_deref().unwrap_or("unknown"),
                    state.config.consecutive_failures,
                    next
                );
            }
        }

        let message = PeerMessage::HealthResult { result: result.clone() };
        if let Err(e) = self.peers.publish(self.id, message) {
            debug!("peer publish skipped: {}", e);
        }
        self.listeners.notify(result);
    }

    fn adopt_peer_result(&self, result: HealthCheckResult) -> bool {
        let age_ms = self.clock.now_ms() - result.timestamp_ms;
        if age_ms >= self.settings.peer_freshness_ms() {
            debug!("ignoring stale peer result ({}ms old)", age_ms);
            return false;
        }

        {
            let mut state = self.state.lock();
            if state.destroyed {
                return false;
            }
            if let Some(latest) = &state.latest {
                if latest.timestamp_ms >= result.timestamp_ms {
                    return false;
                }
            }
            state.latest = Some(result.clone());
            state.limiter.mark_checked(result.timestamp_ms);
        }

        debug!("adopted peer health result (healthy={})", result.is_healthy);
        self.listeners.notify(&result);
        true
    }

    /// Last known result tagged as cached; optimistic when nothing is known yet
    fn cached_result(&self) -> HealthCheckResult {
        match &self.state.lock().latest {
            Some(latest) => latest.cached(),
            None => HealthCheckResult::healthy(0, self.clock.now_ms()).cached(),
        }
    }

    fn start_timer(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }
        state.timer = Some(spawn_timer(self));
    }

    fn stop_timer(&self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
            debug!("probe timer stopped");
        }
    }
}

/// Check first, then sleep for whatever the adaptive interval is at that point
fn spawn_timer(inner: &Arc<SchedulerInner>) -> JoinHandle<()> {
    let weak: Weak<SchedulerInner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        loop {
            let Some(inner) = weak.upgrade() else { break };
            let scheduler = HealthProbeScheduler { inner };
            scheduler.run_scheduled_check().await;
            let interval = scheduler.inner.state.lock().config.current_interval;
            drop(scheduler);
            tokio::time::sleep(interval).await;
        }
    })
}

fn spawn_visibility_watcher(inner: &Arc<SchedulerInner>) -> JoinHandle<()> {
    let weak: Weak<SchedulerInner> = Arc::downgrade(inner);
    let mut rx = inner.runtime.on_visibility_change();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let visible = *rx.borrow_and_update();
            let Some(inner) = weak.upgrade() else { break };
            if visible {
                info!("visible again, restarting probe timer");
                // coming back to the app counts as activity
                let now = inner.clock.now_ms();
                inner.state.lock().last_activity_ms = now;
                inner.start_timer();
            } else {
                debug!("hidden, pausing probe timer");
                inner.stop_timer();
            }
        }
    })
}

fn spawn_peer_listener(
    inner: &Arc<SchedulerInner>,
    mut rx: tokio::sync::broadcast::Receiver<crate::peer::PeerEnvelope>,
) -> JoinHandle<()> {
    let weak: Weak<SchedulerInner> = Arc::downgrade(inner);
    let own_id = inner.id;
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) if envelope.origin == own_id => continue,
                Ok(envelope) => {
                    let Some(inner) = weak.upgrade() else { break };
                    match envelope.message {
                        PeerMessage::HealthResult { result } => {
                            inner.adopt_peer_result(result);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("peer listener lagged by {} messages", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::peer::NoopPeerChannel;
    use crate::runtime::NativeRuntime;
    use crate::transport::{HttpResponse, HttpTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StatusTransport {
        status: u16,
        calls: AtomicUsize,
    }

    impl HttpTransport for StatusTransport {
        fn execute(&self, _request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.status;
            async move {
                tokio::task::yield_now().await;
                Ok(HttpResponse { status, body: String::new() })
            }
            .boxed()
        }
    }

    fn scheduler(status: u16) -> (HealthProbeScheduler, Arc<StatusTransport>) {
        let transport = Arc::new(StatusTransport {
            status,
            calls: AtomicUsize::new(0),
        });
        let scheduler = HealthProbeScheduler::new(
            &DeviceProfile::default(),
            SchedulerSettings::default(),
            transport.clone(),
            Arc::new(NativeRuntime::new()),
            Arc::new(NoopPeerChannel),
            Arc::new(SystemClock),
        );
        (scheduler, transport)
    }

    #[tokio::test]
    async fn test_non_2xx_is_unhealthy_with_status() {
        let (scheduler, _) = scheduler(503);
        let result = scheduler.check_health_immediate().await;
        assert!(!result.is_healthy);
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
        assert_eq!(scheduler.adaptive_config().consecutive_failures, 1);
        assert_eq!(scheduler.telemetry().failure_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_immediate_checks_share_one_request() {
        let (scheduler, transport) = scheduler(200);
        let checks: Vec<_> = (0..5).map(|_| scheduler.check_health_immediate()).collect();
        let results = futures::future::join_all(checks).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &results[0]));
        assert!(results[0].is_healthy);
        assert_eq!(scheduler.telemetry().total_checks, 1);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (scheduler, transport) = scheduler(200);
        scheduler.add_listener(|_| {});
        scheduler.start();
        scheduler.destroy();
        scheduler.destroy();

        assert!(scheduler.is_destroyed());
        assert!(!scheduler.is_timer_running());
        let result = scheduler.run_scheduled_check().await;
        assert!(result.from_cache);
        let calls = transport.calls.load(Ordering::SeqCst);
        let _ = scheduler.check_health_immediate().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), calls);
    }
}
