//! Update orchestrator implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::database::QueryEngine;
use crate::decompress::{DecoderFactory, XzDecompressor};
use crate::fetch::Fetcher;
use crate::metrics;
use crate::mirror::{choose_mirror, parse_mirror_list};
use crate::settings::SettingsStore;

use super::config::UpdateConfig;
use super::types::{CycleOutcome, TimedEvent, UpdateError, UpdateEvent, UpdateState, UpdateStatus};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Clears the busy flag and returns the state to idle when a cycle ends,
/// including when the cycle future is dropped midway.
struct CycleGuard {
    busy: Arc<AtomicBool>,
    state: Arc<Mutex<UpdateState>>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = UpdateState::Idle;
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// The update orchestrator - keeps the mirror list and the catalog fresh.
pub struct UpdateOrchestrator {
    config: UpdateConfig,
    fetcher: Arc<dyn Fetcher>,
    settings: Arc<dyn SettingsStore>,
    engine: Arc<dyn QueryEngine>,
    decoder_factory: DecoderFactory,

    // Runtime state
    state: Arc<Mutex<UpdateState>>,
    last_event: Mutex<Option<TimedEvent>>,
    busy: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    events_tx: broadcast::Sender<UpdateEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl UpdateOrchestrator {
    pub fn new(
        config: UpdateConfig,
        fetcher: Arc<dyn Fetcher>,
        settings: Arc<dyn SettingsStore>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            fetcher,
            settings,
            engine,
            decoder_factory: XzDecompressor::boxed,
            state: Arc::new(Mutex::new(UpdateState::Idle)),
            last_event: Mutex::new(None),
            busy: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            events_tx,
            shutdown_tx,
        }
    }

    /// Use a different catalog decoder.
    pub fn with_decoder_factory(mut self, factory: DecoderFactory) -> Self {
        self.decoder_factory = factory;
        self
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Subscribe to update events.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events_tx.subscribe()
    }

    pub fn state(&self) -> UpdateState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Result<UpdateStatus, UpdateError> {
        let snapshot = self.settings.snapshot()?;
        let last_event = self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Ok(UpdateStatus {
            state: self.state(),
            running: self.running.load(Ordering::Relaxed),
            mirrors: snapshot.mirror_list.len(),
            mirror_list_updated_on: snapshot.mirror_list_updated_on,
            catalog_updated_on: snapshot.catalog_updated_on,
            last_event,
        })
    }

    /// Run one staleness-driven cycle.
    pub async fn check_for_updates(&self) -> Result<CycleOutcome, UpdateError> {
        let _guard = self.begin_cycle()?;
        self.run_cycle(false).await
    }

    /// Refresh the catalog now, regardless of its age.
    ///
    /// Any stored mirror list is used as is, however old. Only an absent
    /// list is fetched first.
    pub async fn update_catalog(&self) -> Result<CycleOutcome, UpdateError> {
        let _guard = self.begin_cycle()?;
        self.run_cycle(true).await
    }

    /// Start a forced catalog refresh in the background.
    ///
    /// Fails immediately with [`UpdateError::Busy`] if a cycle is in flight;
    /// otherwise the cycle is already claimed when this returns.
    pub fn spawn_update_catalog(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<CycleOutcome, UpdateError>>, UpdateError> {
        let guard = self.begin_cycle()?;
        let orchestrator = Arc::clone(self);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run_cycle(true).await
        }))
    }

    /// Start the periodic staleness check (spawns a background task).
    ///
    /// The first check runs immediately.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Update loop already running");
            return;
        }

        let orchestrator = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.config.update_interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Update loop started");
            loop {
                match orchestrator.check_for_updates().await {
                    Ok(outcome) => debug!(outcome = ?outcome, "Update check finished"),
                    Err(UpdateError::Busy) => debug!("Update already in progress, skipping check"),
                    Err(e) => warn!(error = %e, "Update check failed"),
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Update loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
            info!("Update loop stopped");
        });
    }

    /// Stop the periodic check.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Update loop not running");
            return;
        }

        info!("Stopping update loop");
        let _ = self.shutdown_tx.send(());
    }

    fn begin_cycle(&self) -> Result<CycleGuard, UpdateError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(UpdateError::Busy);
        }
        Ok(CycleGuard {
            busy: Arc::clone(&self.busy),
            state: Arc::clone(&self.state),
        })
    }

    async fn run_cycle(&self, force_catalog: bool) -> Result<CycleOutcome, UpdateError> {
        let snapshot = self.settings.snapshot()?;
        let now = Utc::now();

        // A manual update draws from any stored list; only an absent list
        // has to be fetched first.
        let refresh_mirrors = snapshot.mirror_list.is_empty()
            || (!force_catalog
                && is_stale(snapshot.mirror_list_updated_on, self.config.mirror_list_max_age(), now));

        let mirrors = if refresh_mirrors {
            self.set_state(UpdateState::CheckingMirrorList);
            debug!(
                mirrors = snapshot.mirror_list.len(),
                updated_on = ?snapshot.mirror_list_updated_on,
                "Mirror list is stale"
            );

            match self.refresh_mirror_list().await {
                Some(mirrors) => mirrors,
                None => return Ok(CycleOutcome::MirrorListFailed),
            }
        } else {
            snapshot.mirror_list
        };

        self.set_state(UpdateState::CheckingCatalog);

        if !force_catalog
            && !is_stale(snapshot.catalog_updated_on, self.config.catalog_max_age(), now)
        {
            debug!(updated_on = ?snapshot.catalog_updated_on, "Catalog is up to date");
            return Ok(CycleOutcome::UpToDate);
        }

        Ok(match self.refresh_catalog(&mirrors).await {
            Some(shows) => CycleOutcome::CatalogUpdated { shows },
            None => CycleOutcome::CatalogFailed,
        })
    }

    /// Fetch, parse and store the mirror list. Emits exactly one terminal event.
    async fn refresh_mirror_list(&self) -> Option<Vec<String>> {
        self.set_state(UpdateState::FetchingMirrorList);
        self.emit(UpdateEvent::MirrorListUpdateStarted);

        match self.fetch_mirror_list().await {
            Ok(mirrors) => {
                self.emit(UpdateEvent::MirrorListUpdateCompleted {
                    mirrors: mirrors.len(),
                });
                Some(mirrors)
            }
            Err(reason) => {
                self.emit(UpdateEvent::MirrorListUpdateFailed { reason });
                None
            }
        }
    }

    async fn fetch_mirror_list(&self) -> Result<Vec<String>, String> {
        let url = &self.config.mirror_list_url;
        let response = self.fetcher.get(url).await.map_err(|e| e.to_string())?;

        let mut document = Vec::new();
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            document.extend_from_slice(&chunk.map_err(|e| e.to_string())?);
        }

        let mirrors = parse_mirror_list(&document).map_err(|e| e.to_string())?;

        self.settings
            .set_mirror_list(&mirrors, Utc::now())
            .map_err(|e| format!("Failed to store mirror list: {}", e))?;

        Ok(mirrors)
    }

    /// Stream the catalog from one mirror into the query engine. Emits exactly
    /// one terminal event.
    async fn refresh_catalog(&self, mirrors: &[String]) -> Option<usize> {
        self.set_state(UpdateState::FetchingCatalog);

        let mirror = match choose_mirror(mirrors) {
            Ok(mirror) => mirror.to_string(),
            Err(e) => {
                self.emit(UpdateEvent::CatalogUpdateFailed {
                    reason: e.to_string(),
                });
                return None;
            }
        };

        self.emit(UpdateEvent::CatalogUpdateStarted {
            mirror: mirror.clone(),
        });

        match self.fetch_catalog(&mirror).await {
            Ok(shows) => {
                metrics::CATALOG_SHOWS.set(shows as i64);
                self.emit(UpdateEvent::CatalogUpdateCompleted { shows });
                Some(shows)
            }
            Err(reason) => {
                self.emit(UpdateEvent::CatalogUpdateFailed { reason });
                None
            }
        }
    }

    async fn fetch_catalog(&self, mirror: &str) -> Result<usize, String> {
        let mut decoder = (self.decoder_factory)().map_err(|e| e.to_string())?;
        let response = self.fetcher.get(mirror).await.map_err(|e| e.to_string())?;

        debug!(
            mirror = %mirror,
            content_length = ?response.content_length,
            "Catalog transfer started"
        );

        let mut received = 0usize;
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            received += chunk.len();
            decoder.feed(&chunk).map_err(|e| e.to_string())?;
        }

        let payload = decoder.finish().map_err(|e| e.to_string())?;
        info!(
            received = received,
            decoded = payload.len(),
            "Catalog transfer finished, applying update"
        );

        let engine = Arc::clone(&self.engine);
        let shows = tokio::task::spawn_blocking(move || engine.apply_update(&payload))
            .await
            .map_err(|e| format!("Catalog update task failed: {}", e))?
            .map_err(|e| e.to_string())?;

        if let Err(e) = self.settings.set_catalog_updated_on(Utc::now()) {
            warn!(error = %e, "Failed to record catalog update time");
        }

        Ok(shows)
    }

    fn set_state(&self, state: UpdateState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*current, to = ?state, "Update state transition");
        *current = state;
    }

    fn emit(&self, event: UpdateEvent) {
        if event.is_failure() {
            warn!(event = ?event, "Update step failed");
        } else {
            info!(event = ?event, "Update event");
        }

        metrics::UPDATE_EVENTS
            .with_label_values(&[event.kind()])
            .inc();

        *self.last_event.lock().unwrap_or_else(PoisonError::into_inner) = Some(TimedEvent {
            at: Utc::now(),
            event: event.clone(),
        });

        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}

/// Absent, or strictly older than `max_age`. Without a max age only an
/// absent resource is stale.
fn is_stale(
    updated_on: Option<DateTime<Utc>>,
    max_age: Option<chrono::Duration>,
    now: DateTime<Utc>,
) -> bool {
    match (updated_on, max_age) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(updated_on), Some(max_age)) => now - updated_on > max_age,
    }
}
