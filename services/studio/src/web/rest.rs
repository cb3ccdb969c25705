//! services/studio/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use curriculum_core::domain::{CourseId, FileSlot};
use curriculum_core::snapshot::{item_from_storable, to_storable, DraftSnapshot, ItemSnapshot};
use curriculum_core::store::{
    DraftSource, DraftView, Phase, SaveOutcome, StoreError, SubmitOutcome, TextPatch,
};
use curriculum_core::upload::UploadError;
use curriculum_core::validation::{validate, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_course_handler,
        open_course_handler,
        get_draft_handler,
        put_draft_handler,
        clear_draft_handler,
        flush_handler,
        validate_handler,
        submit_handler,
        add_section_handler,
        remove_section_handler,
        rename_section_handler,
        reorder_sections_handler,
        add_item_handler,
        remove_item_handler,
        edit_item_text_handler,
        reorder_items_handler,
        move_item_handler,
        upload_files_handler,
        retry_file_handler,
        remove_file_handler,
        detect_duration_handler,
    ),
    components(
        schemas(
            CreateCourseRequest, CourseCreatedResponse, OpenCourseResponse, DraftResponse,
            SaveResponse, ValidationResponse, SubmitResponse, AddSectionRequest, CreatedResponse,
            RenameSectionRequest, ReorderRequest, ReorderItemsRequest, MoveItemRequest,
            AddItemRequest, TextEditRequest,
            UploadAcceptedResponse, DurationResponse, Slot,
        )
    ),
    tags(
        (name = "Course Studio API", description = "Local bridge over the curriculum draft of the open course.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct CourseCreatedResponse {
    pub course_id: String,
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct OpenCourseResponse {
    pub course_id: String,
    /// One of `memory`, `cache`, `remote`, `default`.
    #[schema(value_type = String)]
    pub source: DraftSource,
    /// Set when the course could not be fetched and a fresh draft was started.
    pub fetch_error: Option<String>,
}

/// The current draft in its storable form.
#[derive(Serialize, ToSchema)]
pub struct DraftResponse {
    pub course_id: Option<String>,
    /// One of `uninitialized`, `loading`, `ready`.
    #[schema(value_type = String)]
    pub phase: Phase,
    pub dirty: bool,
    pub auto_saving: bool,
    #[schema(value_type = Object)]
    pub curriculum: DraftSnapshot,
}

impl From<DraftView> for DraftResponse {
    fn from(view: DraftView) -> Self {
        Self {
            course_id: view.course_id.map(|id| id.to_string()),
            phase: view.phase,
            dirty: view.dirty,
            auto_saving: view.auto_saving,
            curriculum: to_storable(&view.draft),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    /// One of `saved`, `unchanged`, `discarded`.
    pub outcome: String,
    pub message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ValidationResponse {
    pub valid: bool,
    #[schema(value_type = Vec<Object>)]
    pub errors: Vec<ValidationError>,
}

impl From<ValidationResult> for ValidationResponse {
    fn from(result: ValidationResult) -> Self {
        match result {
            ValidationResult::Valid => Self {
                valid: true,
                errors: Vec::new(),
            },
            ValidationResult::Invalid(errors) => Self {
                valid: false,
                errors,
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmitResponse {
    pub submitted: bool,
    pub message: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub errors: Vec<ValidationError>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddSectionRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RenameSectionRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderItemsRequest {
    pub section: usize,
    pub from: usize,
    pub to: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct MoveItemRequest {
    pub from_section: usize,
    pub to_section: usize,
    pub from: usize,
    pub to: usize,
}

/// An item in its storable form, e.g. `{ "type": "quiz", "quizTitle": "..." }`.
#[derive(Deserialize, ToSchema)]
pub struct AddItemRequest {
    #[schema(value_type = Object)]
    pub item: ItemSnapshot,
}

/// Prose fields of an item. Absent fields are left as they are; `body` only
/// applies to lectures.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TextEditRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl From<TextEditRequest> for TextPatch {
    fn from(request: TextEditRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            body: request.body,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadAcceptedResponse {
    pub file_ids: Vec<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct DurationResponse {
    pub duration_secs: u32,
}

/// Which file list of a lecture a request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    #[default]
    Media,
    Resource,
}

impl From<Slot> for FileSlot {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Media => FileSlot::Media,
            Slot::Resource => FileSlot::Resource,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotQuery {
    /// `media` (default) or `resource`.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub slot: Slot,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotReady | StoreError::Superseded(_) => StatusCode::CONFLICT,
        StoreError::SectionNotFound(_)
        | StoreError::ItemNotFound(_)
        | StoreError::FileNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Ordering(_) => StatusCode::BAD_REQUEST,
        StoreError::RemoteSave(_) | StoreError::RemoteCreate(_) => StatusCode::BAD_GATEWAY,
        StoreError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn store_error(e: StoreError) -> HandlerError {
    let status = store_status(&e);
    if status.is_server_error() {
        error!("Draft store request failed: {}", e);
    }
    (status, e.to_string())
}

pub(crate) fn upload_error(e: UploadError) -> HandlerError {
    let status = match &e {
        UploadError::Store(inner) => store_status(inner),
        UploadError::Host { .. } => StatusCode::BAD_GATEWAY,
        UploadError::MissingData(_)
        | UploadError::NotRetryable(_)
        | UploadError::NoContentKind(_) => StatusCode::CONFLICT,
        UploadError::NotALecture(_) => StatusCode::BAD_REQUEST,
        UploadError::QueueClosed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Upload request failed: {}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// Create a course on the remote API and open it with a fresh draft.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created and opened", body = CourseCreatedResponse),
        (status = 502, description = "The course API rejected the request")
    )
)]
pub async fn create_course_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "A course title is required".to_string()));
    }
    let record = app_state
        .store
        .create_course(title)
        .await
        .map_err(store_error)?;
    Ok((
        StatusCode::CREATED,
        Json(CourseCreatedResponse {
            course_id: record.id,
            title: record.title,
        }),
    ))
}

/// Open a course for editing: local cache first, then the course API.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/open",
    params(("course_id" = String, Path, description = "The remote course identifier.")),
    responses(
        (status = 200, description = "Course opened", body = OpenCourseResponse),
        (status = 409, description = "Another course was opened meanwhile")
    )
)]
pub async fn open_course_handler(
    State(app_state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let course_id = CourseId::new(course_id);
    let outcome = app_state
        .store
        .init(course_id.clone())
        .await
        .map_err(store_error)?;
    Ok(Json(OpenCourseResponse {
        course_id: course_id.to_string(),
        source: outcome.source,
        fetch_error: outcome.fetch_error.map(|e| e.to_string()),
    }))
}

//=========================================================================================
// Draft Handlers
//=========================================================================================

/// Read the current draft.
#[utoipa::path(
    get,
    path = "/draft",
    responses((status = 200, description = "The current draft", body = DraftResponse))
)]
pub async fn get_draft_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DraftResponse::from(app_state.store.state().await))
}

/// Replace the draft with the given curriculum.
///
/// Selected files that are still uploading keep their data if their ids are kept.
#[utoipa::path(
    put,
    path = "/draft",
    request_body(content = Object, description = "A curriculum in its storable form."),
    responses(
        (status = 200, description = "Draft replaced", body = DraftResponse),
        (status = 409, description = "No course is open")
    )
)]
pub async fn put_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Json(snapshot): Json<DraftSnapshot>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .replace_snapshot(&snapshot)
        .await
        .map_err(store_error)?;
    Ok(Json(DraftResponse::from(app_state.store.state().await)))
}

/// Discard the draft of the open course, locally and in the cache.
#[utoipa::path(
    delete,
    path = "/draft",
    responses((status = 204, description = "Draft cleared"))
)]
pub async fn clear_draft_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state.store.clear().await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Push the draft to the course API now instead of waiting for the autosave.
#[utoipa::path(
    post,
    path = "/draft/flush",
    responses(
        (status = 200, description = "Save evaluated", body = SaveResponse),
        (status = 502, description = "The course API rejected the save")
    )
)]
pub async fn flush_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = match app_state.store.flush().await.map_err(store_error)? {
        SaveOutcome::Saved { message } => SaveResponse {
            outcome: "saved".to_string(),
            message: Some(message),
        },
        SaveOutcome::Unchanged => SaveResponse {
            outcome: "unchanged".to_string(),
            message: None,
        },
        SaveOutcome::Discarded => SaveResponse {
            outcome: "discarded".to_string(),
            message: None,
        },
    };
    Ok(Json(response))
}

/// Validate the draft without saving it.
#[utoipa::path(
    post,
    path = "/draft/validate",
    responses((status = 200, description = "Validation result", body = ValidationResponse))
)]
pub async fn validate_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = app_state.store.read(validate).await;
    Json(ValidationResponse::from(result))
}

/// Validate the draft and, when valid, submit the course for review.
#[utoipa::path(
    post,
    path = "/draft/submit",
    responses(
        (status = 200, description = "Course submitted", body = SubmitResponse),
        (status = 422, description = "The draft has validation errors", body = SubmitResponse),
        (status = 502, description = "The course API rejected the submission")
    )
)]
pub async fn submit_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, HandlerError> {
    let response = match app_state.store.submit().await.map_err(store_error)? {
        SubmitOutcome::Submitted { message } => {
            info!("Course submitted for review");
            (
                StatusCode::OK,
                Json(SubmitResponse {
                    submitted: true,
                    message: Some(message),
                    errors: Vec::new(),
                }),
            )
        }
        SubmitOutcome::Rejected(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SubmitResponse {
                submitted: false,
                message: None,
                errors,
            }),
        ),
    };
    Ok(response.into_response())
}

//=========================================================================================
// Structure Handlers
//=========================================================================================

/// Append a section.
#[utoipa::path(
    post,
    path = "/draft/sections",
    request_body = AddSectionRequest,
    responses((status = 201, description = "Section added", body = CreatedResponse))
)]
pub async fn add_section_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<AddSectionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = app_state
        .store
        .add_section(&request.name)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Remove a section and everything in it.
#[utoipa::path(
    delete,
    path = "/draft/sections/{index}",
    params(("index" = usize, Path, description = "Zero-based section position.")),
    responses(
        (status = 204, description = "Section removed"),
        (status = 404, description = "No section at that position")
    )
)]
pub async fn remove_section_handler(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .remove_section(index)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rename a section. Under the `structural_only` autosave policy this stays
/// local until the next structural edit or flush.
#[utoipa::path(
    patch,
    path = "/draft/sections/{index}",
    params(("index" = usize, Path, description = "Zero-based section position.")),
    request_body = RenameSectionRequest,
    responses(
        (status = 204, description = "Section renamed"),
        (status = 404, description = "No section at that position")
    )
)]
pub async fn rename_section_handler(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<RenameSectionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .rename_section(index, &request.name)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a section to another position.
#[utoipa::path(
    post,
    path = "/draft/sections/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Sections reordered", body = DraftResponse),
        (status = 400, description = "Index out of range")
    )
)]
pub async fn reorder_sections_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ReorderRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .reorder_sections(request.from, request.to)
        .await
        .map_err(store_error)?;
    Ok(Json(DraftResponse::from(app_state.store.state().await)))
}

/// Append an item to a section.
#[utoipa::path(
    post,
    path = "/draft/sections/{index}/items",
    params(("index" = usize, Path, description = "Zero-based section position.")),
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added", body = CreatedResponse),
        (status = 404, description = "No section at that position")
    )
)]
pub async fn add_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<AddItemRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let item = item_from_storable(&request.item);
    let id = app_state
        .store
        .add_item(index, item)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Remove an item from the curriculum.
#[utoipa::path(
    delete,
    path = "/draft/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "The item's client-side id.")),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "No such item")
    )
)]
pub async fn remove_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .remove_item(item_id)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change an item's name, description or lecture body.
#[utoipa::path(
    patch,
    path = "/draft/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "The item's client-side id.")),
    request_body = TextEditRequest,
    responses(
        (status = 204, description = "Item text updated"),
        (status = 404, description = "No such item")
    )
)]
pub async fn edit_item_text_handler(
    State(app_state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(request): Json<TextEditRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .edit_item_text(item_id, request.into())
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move an item within its section.
#[utoipa::path(
    post,
    path = "/draft/items/reorder",
    request_body = ReorderItemsRequest,
    responses(
        (status = 200, description = "Items reordered", body = DraftResponse),
        (status = 400, description = "Index out of range")
    )
)]
pub async fn reorder_items_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ReorderItemsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .reorder_items(request.section, request.from, request.to)
        .await
        .map_err(store_error)?;
    Ok(Json(DraftResponse::from(app_state.store.state().await)))
}

/// Move an item into another section.
#[utoipa::path(
    post,
    path = "/draft/items/move",
    request_body = MoveItemRequest,
    responses(
        (status = 200, description = "Item moved", body = DraftResponse),
        (status = 400, description = "Index out of range")
    )
)]
pub async fn move_item_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<MoveItemRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .store
        .move_item(request.from_section, request.to_section, request.from, request.to)
        .await
        .map_err(store_error)?;
    Ok(Json(DraftResponse::from(app_state.store.state().await)))
}

//=========================================================================================
// File Handlers
//=========================================================================================

/// Attach files to a lecture and upload them in the background.
///
/// Every file part of the multipart form is queued in form order. Progress and
/// results arrive as events on `/ws`.
#[utoipa::path(
    post,
    path = "/draft/items/{item_id}/files",
    params(
        ("item_id" = Uuid, Path, description = "The lecture's client-side id."),
        SlotQuery
    ),
    request_body(content_type = "multipart/form-data", description = "One or more files."),
    responses(
        (status = 202, description = "Uploads queued", body = UploadAcceptedResponse),
        (status = 400, description = "No file in the form"),
        (status = 409, description = "The lecture cannot take media yet")
    )
)]
pub async fn upload_files_handler(
    State(app_state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        files.push((name, data));
    }
    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    }

    let file_ids = app_state
        .uploads
        .start_upload(item_id, query.slot.into(), files)
        .await
        .map_err(upload_error)?;
    Ok((StatusCode::ACCEPTED, Json(UploadAcceptedResponse { file_ids })))
}

/// Upload a failed file again.
#[utoipa::path(
    post,
    path = "/draft/items/{item_id}/files/{file_id}/retry",
    params(
        ("item_id" = Uuid, Path, description = "The lecture's client-side id."),
        ("file_id" = Uuid, Path, description = "The file's client-side id."),
        SlotQuery
    ),
    responses(
        (status = 200, description = "File uploaded", body = CreatedResponse),
        (status = 409, description = "The file has not failed, or its data is gone"),
        (status = 502, description = "The media host rejected the file")
    )
)]
pub async fn retry_file_handler(
    State(app_state): State<Arc<AppState>>,
    Path((item_id, file_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = app_state
        .uploads
        .retry(item_id, query.slot.into(), file_id)
        .await
        .map_err(upload_error)?;
    Ok(Json(CreatedResponse { id }))
}

/// Remove a file from a lecture, deleting the hosted copy when possible.
#[utoipa::path(
    delete,
    path = "/draft/items/{item_id}/files/{file_id}",
    params(
        ("item_id" = Uuid, Path, description = "The lecture's client-side id."),
        ("file_id" = Uuid, Path, description = "The file's client-side id."),
        SlotQuery
    ),
    responses(
        (status = 204, description = "File removed"),
        (status = 404, description = "No such file")
    )
)]
pub async fn remove_file_handler(
    State(app_state): State<Arc<AppState>>,
    Path((item_id, file_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .uploads
        .remove_file(item_id, query.slot.into(), file_id)
        .await
        .map_err(upload_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Look up the duration of a linked video and store it on the lecture.
#[utoipa::path(
    post,
    path = "/draft/items/{item_id}/duration",
    params(("item_id" = Uuid, Path, description = "The lecture's client-side id.")),
    responses(
        (status = 200, description = "Duration stored; 0 when unknown", body = DurationResponse),
        (status = 400, description = "The item is not a lecture")
    )
)]
pub async fn detect_duration_handler(
    State(app_state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let duration_secs = app_state
        .uploads
        .detect_link_duration(item_id)
        .await
        .map_err(upload_error)?;
    Ok(Json(DurationResponse { duration_secs }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{media_host::HttpMediaHost, video_metadata::OEmbedVideoMetadata};
    use async_trait::async_trait;
    use curriculum_core::ordering::OrderingError;
    use curriculum_core::ports::{CourseApiService, LocalCacheService, PortError, PortResult};
    use curriculum_core::snapshot::CourseRecord;
    use curriculum_core::store::{AutosavePolicy, DraftStore, StoreConfig};
    use curriculum_core::upload::UploadOrchestrator;
    use curriculum_core::validation::{Field, Location};
    use reqwest::Client;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    /// A course API holding one empty course that counts saves.
    #[derive(Default)]
    struct CountingCourseApi {
        updates: AtomicUsize,
    }

    #[async_trait]
    impl CourseApiService for CountingCourseApi {
        async fn get_course_by_id(&self, course_id: &CourseId) -> PortResult<CourseRecord> {
            Ok(CourseRecord {
                id: course_id.to_string(),
                title: "Rust basics".to_string(),
                status: None,
                curriculum: None,
                extra: Default::default(),
            })
        }

        async fn update_course(&self, _record: &CourseRecord) -> PortResult<String> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok("Course updated".to_string())
        }

        async fn create_course(&self, title: &str) -> PortResult<CourseRecord> {
            Err(PortError::Rejected(format!("cannot create {}", title)))
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        entries: std::sync::Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl LocalCacheService for MemoryCache {
        async fn get(&self, key: &str) -> PortResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> PortResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> PortResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    async fn structural_only_state(api: Arc<CountingCourseApi>) -> Arc<AppState> {
        let store = DraftStore::new(
            api,
            Arc::new(MemoryCache::default()),
            StoreConfig {
                autosave_debounce: Duration::from_secs(1),
                autosave_policy: AutosavePolicy::StructuralOnly,
            },
        );
        store.init(CourseId::from("c1")).await.unwrap();
        let client = Client::new();
        let host = HttpMediaHost::new(
            client.clone(),
            Url::parse("https://media.example.com/v1_1/demo/upload").unwrap(),
            "unsigned".to_string(),
            None,
        );
        let uploads = UploadOrchestrator::new(
            store.clone(),
            Arc::new(host),
            Arc::new(OEmbedVideoMetadata::new(client).unwrap()),
            1,
        );
        Arc::new(AppState { store, uploads })
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(store_error(StoreError::NotReady).0, StatusCode::CONFLICT);
        assert_eq!(
            store_error(StoreError::ItemNotFound(Uuid::nil())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            store_error(StoreError::Ordering(OrderingError::InvalidIndex { index: 3, len: 1 })).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            store_error(StoreError::RemoteSave(PortError::Unexpected("down".to_string()))).0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn upload_errors_unwrap_store_errors() {
        assert_eq!(
            upload_error(UploadError::Store(StoreError::FileNotFound(Uuid::nil()))).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            upload_error(UploadError::MissingData(Uuid::nil())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            upload_error(UploadError::NotRetryable(Uuid::nil())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            upload_error(UploadError::Host {
                file: "a.mp4".to_string(),
                source: PortError::Rejected("too large".to_string()),
            })
            .0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn slot_query_defaults_to_media() {
        let query: SlotQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.slot, Slot::Media);
        let query: SlotQuery = serde_json::from_str(r#"{"slot":"resource"}"#).unwrap();
        assert_eq!(FileSlot::from(query.slot), FileSlot::Resource);
    }

    #[test]
    fn validation_response_lists_errors_in_order() {
        let error = ValidationError {
            location: Location {
                section: 0,
                item: None,
                field: Field::Items,
            },
            message: "Section needs at least one item".to_string(),
        };
        let response = ValidationResponse::from(ValidationResult::Invalid(vec![error]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["location"]["section"], 0);

        assert!(ValidationResponse::from(ValidationResult::Valid).valid);
    }

    #[test]
    fn add_item_request_accepts_storable_items() {
        let request: AddItemRequest = serde_json::from_str(
            r#"{"item":{"type":"quiz","name":"Q","quizTitle":"Check","quizDuration":5}}"#,
        )
        .unwrap();
        let item = item_from_storable(&request.item);
        assert_eq!(item.kind(), "quiz");
        assert_eq!(item.display_name(), "Check");
    }

    #[tokio::test(start_paused = true)]
    async fn text_edits_wait_for_flush_under_structural_only() {
        let api = Arc::new(CountingCourseApi::default());
        let app_state = structural_only_state(api.clone()).await;

        let request: AddItemRequest =
            serde_json::from_str(r#"{"item":{"type":"lecture","name":"Intro"}}"#).unwrap();
        assert!(add_item_handler(State(app_state.clone()), Path(0), Json(request))
            .await
            .is_ok());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);

        let item_id = app_state
            .store
            .read(|draft| draft.sections[0].items[0].id())
            .await;
        let edit = TextEditRequest {
            name: Some("Welcome".to_string()),
            body: Some("Hello".to_string()),
            ..Default::default()
        };
        assert!(edit_item_text_handler(State(app_state.clone()), Path(item_id), Json(edit))
            .await
            .is_ok());
        let rename = RenameSectionRequest {
            name: "Getting started".to_string(),
        };
        assert!(rename_section_handler(State(app_state.clone()), Path(0), Json(rename))
            .await
            .is_ok());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(api.updates.load(Ordering::SeqCst), 1);
        let view = app_state.store.state().await;
        assert!(view.dirty);
        assert_eq!(view.draft.sections[0].name, "Getting started");
        assert_eq!(view.draft.sections[0].items[0].display_name(), "Welcome");

        assert!(flush_handler(State(app_state.clone())).await.is_ok());
        assert_eq!(api.updates.load(Ordering::SeqCst), 2);
        assert!(!app_state.store.state().await.dirty);
    }

    #[tokio::test]
    async fn text_edits_report_unknown_targets() {
        let app_state = structural_only_state(Arc::new(CountingCourseApi::default())).await;

        let missing = edit_item_text_handler(
            State(app_state.clone()),
            Path(Uuid::nil()),
            Json(TextEditRequest::default()),
        )
        .await;
        assert_eq!(missing.err().map(|e| e.0), Some(StatusCode::NOT_FOUND));

        let rename = RenameSectionRequest {
            name: "Later".to_string(),
        };
        let missing = rename_section_handler(State(app_state), Path(3), Json(rename)).await;
        assert_eq!(missing.err().map(|e| e.0), Some(StatusCode::NOT_FOUND));
    }
}
