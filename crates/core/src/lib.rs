pub mod cache;
pub mod config;
pub mod database;
pub mod decompress;
pub mod download;
pub mod fetch;
pub mod metrics;
pub mod mirror;
pub mod orchestrator;
pub mod settings;
pub mod testing;
pub mod window;

pub use cache::{CacheStats, ObjectCache, DEFAULT_CACHE_CAPACITY};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    DownloadConfig, ServerConfig, ViewConfig,
};
pub use database::{
    parse_catalog, Column, DatabaseError, ParseError, QueryEngine, QueryFilter, Show, ShowId,
    SortOrder, SqliteDatabase, UrlQuality,
};
pub use decompress::{
    DecoderFactory, DecoderState, DecompressError, Decompressor, XzDecompressor,
};
pub use download::{DownloadError, DownloadProgress, Downloader};
pub use fetch::{FetchError, FetchResponse, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use mirror::{
    choose_mirror, parse_mirror_list, MirrorListError, DEFAULT_MIRROR_LIST_URL,
};
pub use orchestrator::{
    CycleOutcome, TimedEvent, UpdateConfig, UpdateError, UpdateEvent, UpdateOrchestrator,
    UpdateState, UpdateStatus,
};
pub use settings::{SettingsError, SettingsSnapshot, SettingsStore, SqliteSettings};
pub use window::{ResultWindow, WindowError, WindowEvent, WindowQuery, DEFAULT_WINDOW_SIZE};
