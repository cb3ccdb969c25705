//! services/studio/src/web/state.rs
//!
//! Defines the application's shared state.

use curriculum_core::store::DraftStore;
use curriculum_core::upload::UploadOrchestrator;

/// The shared application state, created once at startup and passed to all handlers.
///
/// There is exactly one `DraftStore`; every REST call and every WebSocket view
/// works on it, so all views observe the same draft.
#[derive(Clone)]
pub struct AppState {
    pub store: DraftStore,
    pub uploads: UploadOrchestrator,
}
