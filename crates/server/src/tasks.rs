//! Background tasks that connect the update orchestrator to the result window.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mediathek_core::UpdateEvent;

use crate::state::AppState;

/// Listen for update events and refresh the result window after each
/// successful catalog update.
///
/// Ends when the orchestrator is dropped.
pub fn spawn_event_listener(state: Arc<AppState>) -> JoinHandle<()> {
    let mut events = state.orchestrator().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(event = ?event, "Update event received");
                    if let UpdateEvent::CatalogUpdateCompleted { shows } = event {
                        refresh_window(&state, shows).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // A completion may have been among the skipped events.
                    warn!(skipped = skipped, "Update event listener lagged, refreshing window");
                    refresh_window(&state, 0).await;
                }
                Err(RecvError::Closed) => {
                    info!("Update event channel closed, listener stopped");
                    break;
                }
            }
        }
    })
}

async fn refresh_window(state: &AppState, shows: usize) {
    let mut window = state.window().lock().await;
    match window.refresh() {
        Ok(_) => info!(
            shows = shows,
            total = window.total(),
            "Result window refreshed after catalog update"
        ),
        Err(e) => error!(error = %e, "Failed to refresh result window"),
    }
}
