use std::sync::Arc;

use tokio::sync::Mutex;

use mediathek_core::{
    Config, Downloader, ResultWindow, SettingsStore, UpdateOrchestrator, UrlQuality,
};

use crate::downloads::DownloadRegistry;

/// Shared application state
pub struct AppState {
    config: Config,
    window: Mutex<ResultWindow>,
    orchestrator: Arc<UpdateOrchestrator>,
    settings: Arc<dyn SettingsStore>,
    downloader: Arc<Downloader>,
    downloads: Arc<DownloadRegistry>,
}

impl AppState {
    pub fn new(
        config: Config,
        window: ResultWindow,
        orchestrator: Arc<UpdateOrchestrator>,
        settings: Arc<dyn SettingsStore>,
        downloader: Arc<Downloader>,
    ) -> Self {
        Self {
            config,
            window: Mutex::new(window),
            orchestrator,
            settings,
            downloader,
            downloads: Arc::new(DownloadRegistry::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The result window. All row access is serialized through this lock.
    pub fn window(&self) -> &Mutex<ResultWindow> {
        &self.window
    }

    pub fn orchestrator(&self) -> &Arc<UpdateOrchestrator> {
        &self.orchestrator
    }

    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    pub fn downloader(&self) -> &Arc<Downloader> {
        &self.downloader
    }

    pub fn downloads(&self) -> &Arc<DownloadRegistry> {
        &self.downloads
    }

    /// Stored quality preference, `Default` if it cannot be read.
    pub fn preferred_quality(&self) -> UrlQuality {
        self.settings
            .snapshot()
            .map(|snapshot| snapshot.preferred_url)
            .unwrap_or_default()
    }
}
