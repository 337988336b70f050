//! Update orchestrator for the mirror list and the catalog.
//!
//! A cycle refreshes the mirror list if it is stale, then refreshes the
//! catalog from a randomly chosen mirror if that is stale:
//! - **Mirror list**: fetched whole, parsed, stored only if usable
//! - **Catalog**: streamed through the decoder chunk by chunk, applied to the
//!   query engine only once the stream ended cleanly
//!
//! Every step reports through [`UpdateEvent`]s. Nothing is retried; the next
//! periodic check or a manual request starts over.

mod config;
mod runner;
mod types;

pub use config::UpdateConfig;
pub use runner::UpdateOrchestrator;
pub use types::{CycleOutcome, TimedEvent, UpdateError, UpdateEvent, UpdateState, UpdateStatus};
