//! Fetch-and-store scheduler

use crate::{MonitorError, MonitorResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wxmon_config::MonitorSettings;
use wxmon_db::{BatchReport, DbClient};
use wxmon_fetch::{FetchClient, FetchResult, ObservationSource};

/// One running polling loop and its counters
pub struct MonitorInstance {
    settings: MonitorSettings,
    source: Arc<dyn ObservationSource>,
    started_at: DateTime<Utc>,
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
    saved: AtomicU64,
}

impl MonitorInstance {
    fn new(settings: MonitorSettings, source: Arc<dyn ObservationSource>) -> Self {
        Self {
            settings,
            source,
            started_at: Utc::now(),
            cycles: AtomicU64::new(0),
            failed_cycles: AtomicU64::new(0),
            saved: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Cycles attempted so far, failed ones included
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::Relaxed)
    }

    /// Observations newly stored by this instance
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    async fn cycle(&self, db: &DbClient) {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(cycle, source = self.source.name(), "Monitor cycle starting");

        match run_cycle(db, self.source.as_ref()).await {
            Ok(report) => {
                self.saved.fetch_add(report.saved() as u64, Ordering::Relaxed);
                if report.saved() > 0 {
                    self.log_latest(db).await;
                }
            }
            Err(err) => {
                if let MonitorError::Store(report) = &err {
                    self.saved.fetch_add(report.saved() as u64, Ordering::Relaxed);
                }
                self.failed_cycles.fetch_add(1, Ordering::Relaxed);
                error!(cycle, source = self.source.name(), error = %err, "Monitor cycle failed");
            }
        }
    }

    async fn log_latest(&self, db: &DbClient) {
        let Some(station_id) = self.settings.station_id.as_deref() else {
            return;
        };
        match db.latest_observation(station_id).await {
            Ok(Some(latest)) => info!(
                station_id,
                local_time = %latest.obs_time_local,
                temp_avg = ?latest.temp_avg,
                "Latest observation"
            ),
            Ok(None) => {}
            Err(err) => warn!(station_id, error = %err, "Could not read latest observation"),
        }
    }
}

impl fmt::Debug for MonitorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorInstance")
            .field("settings", &self.settings)
            .field("source", &self.source.name())
            .field("started_at", &self.started_at)
            .field("cycles", &self.cycles())
            .field("failed_cycles", &self.failed_cycles())
            .field("saved", &self.saved())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum MonitorState {
    Stopped,
    Running(Arc<MonitorInstance>),
}

impl MonitorState {
    pub fn is_running(&self) -> bool {
        matches!(self, MonitorState::Running(_))
    }
}

struct ActiveMonitor {
    instance: Arc<MonitorInstance>,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the polling loop lifecycle: `Stopped -> Running -> Stopped`
pub struct MonitorScheduler {
    db: DbClient,
    active: Mutex<Option<ActiveMonitor>>,
}

impl MonitorScheduler {
    pub fn new(db: DbClient) -> Self {
        Self {
            db,
            active: Mutex::new(None),
        }
    }

    pub fn db(&self) -> &DbClient {
        &self.db
    }

    /// Start polling the remote API
    ///
    /// When a loop is already running its instance is returned unchanged and
    /// `settings` is ignored.
    pub async fn start(&self, settings: MonitorSettings) -> MonitorResult<Arc<MonitorInstance>> {
        self.start_with(settings, |settings| {
            let client = FetchClient::from_settings(settings)?;
            Ok(Arc::new(client) as Arc<dyn ObservationSource>)
        })
        .await
    }

    /// Start polling with a caller-supplied observation source
    pub async fn start_with<F>(
        &self,
        settings: MonitorSettings,
        make_source: F,
    ) -> MonitorResult<Arc<MonitorInstance>>
    where
        F: FnOnce(&MonitorSettings) -> FetchResult<Arc<dyn ObservationSource>>,
    {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if !current.handle.is_finished() {
                info!(
                    started_at = %current.instance.started_at,
                    "Monitor already running"
                );
                return Ok(Arc::clone(&current.instance));
            }
        }

        settings.validate()?;
        let source = make_source(&settings)?;
        let instance = Arc::new(MonitorInstance::new(settings, source));

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.db.clone(),
            Arc::clone(&instance),
            stop_rx,
        ));

        info!(
            source = instance.source_name(),
            interval_seconds = instance.settings.interval_seconds,
            station_id = ?instance.settings.station_id,
            "Monitor started"
        );

        *active = Some(ActiveMonitor {
            instance: Arc::clone(&instance),
            stop_tx,
            handle,
        });
        Ok(instance)
    }

    /// Request the loop to stop
    ///
    /// The idle wait returns at once; a cycle already in flight runs to
    /// completion. Returns false if nothing was running.
    pub async fn stop(&self) -> bool {
        match self.active.lock().await.take() {
            Some(current) => {
                let _ = current.stop_tx.send(true);
                info!("Monitor stop requested");
                true
            }
            None => false,
        }
    }

    /// Stop the loop and wait for its task to exit
    pub async fn shutdown(&self) {
        let Some(current) = self.active.lock().await.take() else {
            return;
        };
        let _ = current.stop_tx.send(true);
        if let Err(err) = current.handle.await {
            error!(error = %err, "Monitor task ended abnormally");
        }
        info!("Monitor shut down");
    }

    pub async fn status(&self) -> MonitorState {
        match self.active.lock().await.as_ref() {
            Some(current) if !current.handle.is_finished() => {
                MonitorState::Running(Arc::clone(&current.instance))
            }
            _ => MonitorState::Stopped,
        }
    }

    /// Run one fetch-and-store cycle immediately, outside the timer
    ///
    /// Safe to overlap with a scheduled cycle: the store's dedup decides
    /// which of the two writes a given observation.
    pub async fn fetch_now(&self, source: &dyn ObservationSource) -> MonitorResult<BatchReport> {
        info!(source = source.name(), "Manual fetch");
        run_cycle(&self.db, source).await
    }
}

/// Fetch one envelope and store it
///
/// Rejected records are not a cycle failure; records the store failed to
/// write are.
pub async fn run_cycle(db: &DbClient, source: &dyn ObservationSource) -> MonitorResult<BatchReport> {
    let envelope = source.fetch().await?;
    let report = db.save_batch(&envelope).await;
    if report.store_failures > 0 {
        return Err(MonitorError::Store(report));
    }
    Ok(report)
}

async fn run_loop(db: DbClient, instance: Arc<MonitorInstance>, mut stop_rx: watch::Receiver<bool>) {
    // The first tick completes immediately, so the loop fetches once on start.
    let mut ticker = tokio::time::interval(instance.settings.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        if *stop_rx.borrow() {
            break;
        }
        instance.cycle(&db).await;
    }

    info!(
        cycles = instance.cycles(),
        failed_cycles = instance.failed_cycles(),
        saved = instance.saved(),
        "Monitor stopped"
    );
}
