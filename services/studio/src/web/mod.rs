pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Upload bodies carry whole video files.
const MAX_BODY_BYTES: usize = 512 * 1024 * 1024;

/// Builds the bridge's routes over the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/courses", post(rest::create_course_handler))
        .route("/courses/{course_id}/open", post(rest::open_course_handler))
        .route(
            "/draft",
            get(rest::get_draft_handler)
                .put(rest::put_draft_handler)
                .delete(rest::clear_draft_handler),
        )
        .route("/draft/flush", post(rest::flush_handler))
        .route("/draft/validate", post(rest::validate_handler))
        .route("/draft/submit", post(rest::submit_handler))
        .route("/draft/sections", post(rest::add_section_handler))
        .route("/draft/sections/reorder", post(rest::reorder_sections_handler))
        .route(
            "/draft/sections/{index}",
            delete(rest::remove_section_handler).patch(rest::rename_section_handler),
        )
        .route("/draft/sections/{index}/items", post(rest::add_item_handler))
        .route("/draft/items/reorder", post(rest::reorder_items_handler))
        .route("/draft/items/move", post(rest::move_item_handler))
        .route(
            "/draft/items/{item_id}",
            delete(rest::remove_item_handler).patch(rest::edit_item_text_handler),
        )
        .route("/draft/items/{item_id}/files", post(rest::upload_files_handler))
        .route(
            "/draft/items/{item_id}/files/{file_id}",
            delete(rest::remove_file_handler),
        )
        .route(
            "/draft/items/{item_id}/files/{file_id}/retry",
            post(rest::retry_file_handler),
        )
        .route("/draft/items/{item_id}/duration", post(rest::detect_duration_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
