// src/jobs/mod.rs
//! Periodic refresh jobs and the scheduler that owns them
//!
//! One task per registered origin URL, one per internal plugin, plus the
//! expiry sweeper, all keyed by name so the release webhook can poke a
//! specific task. Runs within one task are strictly sequential: a kick
//! or tick is only picked up once the previous run has finished.

mod origin;
mod plugin;
mod sweeper;

pub use sweeper::sweep_expired;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::SchedulerTimings;
use crate::error::{Error, Result};
use crate::fetch::{ManifestFetcher, ReleaseFetcher};
use crate::metrics::ServiceMetrics;
use crate::state::{Registry, ReleaseStore, RepositoryStore};

/// Key of the expiry sweeper's scheduler task
pub const SWEEPER_KEY: &str = "expired-repository-sweeper";

/// Everything a refresh run needs, cloned into each task
#[derive(Clone)]
pub struct JobContext {
    pub repositories: Arc<RepositoryStore>,
    pub releases: Arc<ReleaseStore>,
    pub registry: Arc<Registry>,
    pub manifests: Arc<dyn ManifestFetcher>,
    pub github: Arc<dyn ReleaseFetcher>,
    pub metrics: Arc<ServiceMetrics>,
    /// Public base URL, no trailing slash; private download links hang off it
    pub app_url: String,
}

struct TaskHandle {
    kick: mpsc::UnboundedSender<Duration>,
}

/// Owns every periodic task for the lifetime of the process
pub struct Scheduler {
    tasks: Mutex<HashMap<String, TaskHandle>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Spawn a periodic task under a unique key
    ///
    /// The job closure is invoked once per tick (and once up front when
    /// `run_immediately` is set). Registering a key twice is a
    /// configuration error.
    pub fn register<F, Fut>(
        &self,
        key: &str,
        interval: Duration,
        run_immediately: bool,
        job: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(key) {
            return Err(Error::Config(format!("Task '{}' is already registered", key)));
        }

        let (kick_tx, kick_rx) = mpsc::unbounded_channel();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(run_task(
            key.to_string(),
            interval,
            run_immediately,
            job,
            kick_rx,
            shutdown_rx,
        ));

        tasks.insert(key.to_string(), TaskHandle { kick: kick_tx });
        Ok(())
    }

    /// Ask an existing task for one out-of-band run after `delay`
    ///
    /// Returns whether the key is known. The run queues behind any
    /// in-flight run of the same task.
    pub fn run_now(&self, key: &str, delay: Duration) -> bool {
        match self.tasks.lock().get(key) {
            Some(handle) => handle.kick.send(delay).is_ok(),
            None => false,
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.tasks.lock().contains_key(key)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancel every task's periodic trigger
    ///
    /// Does not wait for in-flight runs; a run that already started
    /// completes and its result still lands in the store.
    pub fn shutdown(&self) {
        info!("Cancelling {} scheduled tasks", self.task_count());
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_task<F, Fut>(
    key: String,
    interval: Duration,
    run_immediately: bool,
    job: F,
    mut kick_rx: mpsc::UnboundedReceiver<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if *shutdown_rx.borrow() {
        return;
    }

    if run_immediately {
        job().await;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the wait starts after it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => job().await,
            Some(delay) = kick_rx.recv() => {
                debug!("Task '{}' kicked, running in {:?}", key, delay);
                tokio::time::sleep(delay).await;
                job().await;
            }
            _ = shutdown_rx.changed() => {
                debug!("Task '{}' cancelled", key);
                return;
            }
        }
    }
}

/// A poll interval drawn uniformly from the configured band
///
/// Origins registered in the same startup loop get different periods,
/// so they drift apart instead of firing together on every cycle.
pub fn jittered_interval(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = (max - min).as_secs();
    min + Duration::from_secs(rand::thread_rng().gen_range(0..=span))
}

/// Register one task per origin, one per internal plugin, and the sweeper
///
/// The skip-immediate decision comes from the loaded state: a source
/// refreshed within its staleness window does not get a startup run.
pub fn register_all(
    scheduler: &Scheduler,
    ctx: &JobContext,
    timings: &SchedulerTimings,
) -> Result<()> {
    let now = Utc::now().timestamp();

    for url in ctx.registry.origins() {
        let interval = jittered_interval(timings.origin_interval_min, timings.origin_interval_max);
        let fresh = ctx
            .repositories
            .last_refreshed_at(url)
            .is_some_and(|at| now - at <= timings.origin_staleness.as_secs() as i64);

        info!(
            "Scheduling origin refresh for {} every {}s (startup run: {})",
            url,
            interval.as_secs(),
            !fresh
        );

        let job_ctx = ctx.clone();
        let job_url = url.clone();
        scheduler.register(url, interval, !fresh, move || {
            let ctx = job_ctx.clone();
            let url = job_url.clone();
            async move { origin::refresh_origin(&url, &ctx).await }
        })?;
    }

    for plugin in ctx.registry.plugins() {
        let github_url = format!("https://github.com/{}", plugin.name);
        let fresh = ctx
            .repositories
            .last_refreshed_at(&github_url)
            .is_some_and(|at| now - at <= timings.release_staleness.as_secs() as i64);

        info!(
            "Scheduling release refresh for {} every {}s (startup run: {})",
            plugin.name,
            timings.release_interval.as_secs(),
            !fresh
        );

        let job_ctx = ctx.clone();
        let job_plugin = plugin.clone();
        scheduler.register(&plugin.name, timings.release_interval, !fresh, move || {
            let ctx = job_ctx.clone();
            let plugin = job_plugin.clone();
            async move { plugin::refresh_plugin(&plugin, &ctx).await }
        })?;
    }

    let sweep_store = ctx.repositories.clone();
    let sweep_metrics = ctx.metrics.clone();
    let ttl = timings.repository_ttl;
    scheduler.register(SWEEPER_KEY, timings.sweep_interval, false, move || {
        let store = sweep_store.clone();
        let metrics = sweep_metrics.clone();
        async move {
            sweeper::sweep_expired(&store, ttl, &metrics);
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> impl Fn() -> futures::future::BoxFuture<'static, ()> {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_key() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("https://one.example.com", Duration::from_secs(60), false, counting_job(counter.clone()))
            .unwrap();

        let err = scheduler
            .register("https://one.example.com", Duration::from_secs(60), false, counting_job(counter))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(scheduler.task_count(), 1);
    }

    #[tokio::test]
    async fn test_immediate_run_fires_once_up_front() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("origin", Duration::from_secs(300), true, counting_job(counter.clone()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_periodic_ticks() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("origin", Duration::from_millis(40), false, counting_job(counter.clone()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(170)).await;
        let ticks = counter.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected at least 2 ticks, got {ticks}");

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_run_now_unknown_key() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.run_now("missing", Duration::ZERO));
    }

    #[tokio::test]
    async fn test_run_now_triggers_out_of_band_run() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("acme/sample", Duration::from_secs(300), false, counting_job(counter.clone()))
            .unwrap();

        assert!(scheduler.run_now("acme/sample", Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_ticking() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("origin", Duration::from_millis(30), false, counting_job(counter.clone()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let after_shutdown = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_shutdown);
    }

    #[test]
    fn test_jittered_interval_stays_in_band() {
        let min = Duration::from_secs(55 * 60);
        let max = Duration::from_secs(70 * 60);

        for _ in 0..100 {
            let interval = jittered_interval(min, max);
            assert!(interval >= min && interval <= max);
        }

        assert_eq!(jittered_interval(max, min), max);
        assert_eq!(jittered_interval(min, min), min);
    }
}
