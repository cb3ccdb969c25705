//! crates/curriculum_core/src/store.rs
//!
//! `DraftStore` owns the one authoritative draft of the course being edited.
//!
//! Every edit is applied in memory, written to the local cache straight away and
//! schedules a debounced remote save. When the quiet window elapses the storable
//! form is compared with the last snapshot the API accepted and only sent when
//! it differs. Remote saves never overlap, and any result that resolves after
//! the active course changed is discarded.
//!
//! Observers subscribe to a broadcast channel of `DraftEvent`s; all of them see
//! the same state because all mutations go through this store.

use crate::domain::{CourseId, Draft, FileSlot, FileStatus, Item, MediaFile, Section};
use crate::ordering::{self, OrderingError};
use crate::ports::{cache_keys, CourseApiService, LocalCacheService, PortError, PortResult};
use crate::snapshot::{from_storable, to_storable, CourseRecord, DraftSnapshot};
use crate::validation::{validate, ValidationError, ValidationResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Quiet window before an edit is pushed to the remote API.
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(2500);

/// Course status sent when a course is submitted for review.
pub const SUBMITTED_STATUS: &str = "pending";

const EVENT_CAPACITY: usize = 64;

//=========================================================================================
// Configuration, Events and Errors
//=========================================================================================

/// Which edits schedule a remote save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutosavePolicy {
    /// Every edit is save-worthy.
    #[default]
    AnyChange,
    /// Edits made through `edit_text` stay local until a structural edit.
    StructuralOnly,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub autosave_debounce: Duration,
    pub autosave_policy: AutosavePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            autosave_policy: AutosavePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

/// Where the draft of a freshly opened course came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    /// The course was already open.
    Memory,
    Cache,
    Remote,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub source: DraftSource,
    /// Set when the remote fetch failed and the default draft was used instead.
    pub fetch_error: Option<PortError>,
}

/// Advisory signals coming from other contexts (another window, another view).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftSignal {
    CourseChanged(CourseId),
    Clear,
}

/// Messages published to every observer of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DraftEvent {
    CourseChanged { course_id: CourseId },
    Loading { course_id: CourseId },
    Ready { course_id: CourseId, source: DraftSource },
    Changed { course_id: CourseId },
    FileProgress { course_id: CourseId, item_id: Uuid, file_id: Uuid, progress: u8 },
    AutosaveStarted { course_id: CourseId },
    AutosaveFinished { course_id: CourseId, saved: bool },
    Submitted { course_id: CourseId },
    Cleared { course_id: Option<CourseId> },
    Notice { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("No course is open for editing")]
    NotReady,
    #[error("Course {0} is no longer the active course")]
    Superseded(CourseId),
    #[error("Section {0} does not exist")]
    SectionNotFound(usize),
    #[error("Item {0} does not exist")]
    ItemNotFound(Uuid),
    #[error("File {0} does not exist")]
    FileNotFound(Uuid),
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    #[error("Failed to save the course: {0}")]
    RemoteSave(PortError),
    #[error("Failed to create the course: {0}")]
    RemoteCreate(PortError),
    #[error("Local cache error: {0}")]
    Cache(PortError),
}

/// What a save attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The storable form matched the last accepted snapshot.
    Unchanged,
    Saved { message: String },
    /// The save resolved after the active course changed.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { message: String },
    Rejected(Vec<ValidationError>),
}

/// Prose fields of an item. `None` leaves a field as it is; `body` only
/// applies to lectures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

/// A read-only copy of the store's state.
#[derive(Debug, Clone)]
pub struct DraftView {
    pub course_id: Option<CourseId>,
    pub phase: Phase,
    pub draft: Draft,
    pub dirty: bool,
    pub auto_saving: bool,
    pub last_saved: Option<DraftSnapshot>,
}

/// Identifies the course an asynchronous operation started against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditContext {
    pub course_id: CourseId,
    epoch: u64,
}

/// The local cache entry for one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedDraft {
    course_id: CourseId,
    saved_at: DateTime<Utc>,
    curriculum: DraftSnapshot,
}

//=========================================================================================
// Store
//=========================================================================================

struct StoreState {
    phase: Phase,
    course_id: Option<CourseId>,
    /// Bumped whenever the active course changes or the draft is cleared.
    epoch: u64,
    draft: Draft,
    record: Option<CourseRecord>,
    last_saved: Option<DraftSnapshot>,
    dirty: bool,
    auto_saving: bool,
    /// Bumped for every scheduled save; only the latest timer may fire.
    save_ticket: u64,
}

impl StoreState {
    fn reset(&mut self, course_id: Option<CourseId>, phase: Phase) {
        self.phase = phase;
        self.course_id = course_id;
        self.epoch += 1;
        self.draft = Draft::default();
        self.record = None;
        self.last_saved = None;
        self.dirty = false;
        self.auto_saving = false;
    }

    fn ready_context(&self) -> Result<EditContext, StoreError> {
        match (&self.course_id, self.phase) {
            (Some(course_id), Phase::Ready) => Ok(EditContext {
                course_id: course_id.clone(),
                epoch: self.epoch,
            }),
            _ => Err(StoreError::NotReady),
        }
    }
}

struct Inner {
    api: Arc<dyn CourseApiService>,
    cache: Arc<dyn LocalCacheService>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    /// Held for the whole duration of a remote save.
    save_lock: Mutex<()>,
    events: broadcast::Sender<DraftEvent>,
    shutdown: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Structural,
    Text,
}

/// The draft service shared by every view of the course being edited.
#[derive(Clone)]
pub struct DraftStore {
    inner: Arc<Inner>,
}

impl DraftStore {
    pub fn new(
        api: Arc<dyn CourseApiService>,
        cache: Arc<dyn LocalCacheService>,
        config: StoreConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                cache,
                config,
                state: Mutex::new(StoreState {
                    phase: Phase::Uninitialized,
                    course_id: None,
                    epoch: 0,
                    draft: Draft::default(),
                    record: None,
                    last_saved: None,
                    dirty: false,
                    auto_saving: false,
                    save_ticket: 0,
                }),
                save_lock: Mutex::new(()),
                events,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: DraftEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    pub async fn state(&self) -> DraftView {
        let state = self.inner.state.lock().await;
        DraftView {
            course_id: state.course_id.clone(),
            phase: state.phase,
            draft: state.draft.clone(),
            dirty: state.dirty,
            auto_saving: state.auto_saving,
            last_saved: state.last_saved.clone(),
        }
    }

    /// Runs `f` against the current draft without changing it.
    pub async fn read<R>(&self, f: impl FnOnce(&Draft) -> R) -> R {
        f(&self.inner.state.lock().await.draft)
    }

    /// Like `read`, but only while `context` is still the active course.
    pub async fn read_in<R>(
        &self,
        context: &EditContext,
        f: impl FnOnce(&Draft) -> R,
    ) -> Result<R, StoreError> {
        let state = self.inner.state.lock().await;
        if state.epoch != context.epoch {
            return Err(StoreError::Superseded(context.course_id.clone()));
        }
        Ok(f(&state.draft))
    }

    pub async fn snapshot(&self) -> DraftSnapshot {
        to_storable(&self.inner.state.lock().await.draft)
    }

    /// The context edits from asynchronous work must be applied against.
    pub async fn current_context(&self) -> Result<EditContext, StoreError> {
        self.inner.state.lock().await.ready_context()
    }

    /// Stops pending autosave timers. In-flight saves still complete.
    pub fn dispose(&self) {
        self.inner.shutdown.cancel();
    }

    //-------------------------------------------------------------------------------------
    // Lifecycle
    //-------------------------------------------------------------------------------------

    /// Opens a course: local cache first, then the remote API, then a default draft.
    pub async fn init(&self, course_id: CourseId) -> Result<InitOutcome, StoreError> {
        let (epoch, switched) = {
            let mut state = self.inner.state.lock().await;
            if state.course_id.as_ref() == Some(&course_id) && state.phase == Phase::Ready {
                return Ok(InitOutcome {
                    source: DraftSource::Memory,
                    fetch_error: None,
                });
            }
            let switched = state.course_id.as_ref() != Some(&course_id);
            state.reset(Some(course_id.clone()), Phase::Loading);
            (state.epoch, switched)
        };

        if switched {
            info!("Active course changed to {}", course_id);
            self.emit(DraftEvent::CourseChanged {
                course_id: course_id.clone(),
            });
        }
        self.emit(DraftEvent::Loading {
            course_id: course_id.clone(),
        });

        if let Err(e) = self.inner.cache.set(cache_keys::COURSE_ID, course_id.as_str()).await {
            warn!("Failed to remember the active course: {}", e);
        }

        let mut fetch_error = None;
        let mut record = None;
        let mut last_saved = None;
        let (mut draft, source) = match self.read_cached(&course_id).await {
            Some(snapshot) => (from_storable(&snapshot), DraftSource::Cache),
            None => match self.inner.api.get_course_by_id(&course_id).await {
                Ok(fetched) => {
                    let loaded = match &fetched.curriculum {
                        Some(curriculum) => {
                            let draft = from_storable(curriculum);
                            last_saved = Some(to_storable(&draft));
                            (draft, DraftSource::Remote)
                        }
                        None => (Draft::default(), DraftSource::Default),
                    };
                    record = Some(fetched);
                    loaded
                }
                Err(e) => {
                    warn!("Failed to fetch course {}: {}", course_id, e);
                    self.emit(DraftEvent::Notice {
                        message: format!("Could not load the course from the server: {}", e),
                    });
                    fetch_error = Some(e);
                    (Draft::default(), DraftSource::Default)
                }
            },
        };

        let interrupted = draft.fail_interrupted_uploads();
        if interrupted > 0 {
            info!("Marked {} interrupted upload(s) as failed", interrupted);
        }

        {
            let mut state = self.inner.state.lock().await;
            if state.epoch != epoch {
                debug!("Discarding load of {}; another course was opened", course_id);
                return Err(StoreError::Superseded(course_id));
            }
            state.phase = Phase::Ready;
            state.draft = draft;
            state.record = record;
            state.last_saved = last_saved;
            state.dirty = source == DraftSource::Cache;
            if interrupted > 0 {
                self.write_cache(&course_id, &state.draft).await;
            }
        }

        info!("Course {} ready (source: {:?})", course_id, source);
        self.emit(DraftEvent::Ready {
            course_id: course_id.clone(),
            source,
        });

        // Cached drafts may hold edits the API never received.
        if source == DraftSource::Cache {
            self.schedule_autosave().await;
        }

        Ok(InitOutcome {
            source,
            fetch_error,
        })
    }

    /// Creates a course remotely and opens it.
    pub async fn create_course(&self, title: &str) -> Result<CourseRecord, StoreError> {
        let record = self
            .inner
            .api
            .create_course(title)
            .await
            .map_err(StoreError::RemoteCreate)?;
        info!("Created course {}", record.id);
        self.init(record.course_id()).await?;
        Ok(record)
    }

    /// Reopens the course the author last worked on, if any.
    pub async fn resume(&self) -> Result<Option<InitOutcome>, StoreError> {
        let pointer = self
            .inner
            .cache
            .get(cache_keys::COURSE_ID)
            .await
            .map_err(StoreError::Cache)?;
        match pointer {
            Some(course_id) if !course_id.trim().is_empty() => {
                self.init(CourseId::new(course_id)).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Forgets the current course: in memory and in the local cache.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let course_id = {
            let mut state = self.inner.state.lock().await;
            let course_id = state.course_id.take();
            state.reset(None, Phase::Uninitialized);
            course_id
        };

        if let Some(course_id) = &course_id {
            self.inner
                .cache
                .remove(&cache_keys::curriculum(course_id))
                .await
                .map_err(StoreError::Cache)?;
            self.inner
                .cache
                .remove(cache_keys::COURSE_ID)
                .await
                .map_err(StoreError::Cache)?;
            info!("Cleared draft of course {}", course_id);
        }

        self.emit(DraftEvent::Cleared { course_id });
        Ok(())
    }

    /// Applies a signal observed from another context.
    pub async fn observe(&self, signal: DraftSignal) -> Result<(), StoreError> {
        match signal {
            DraftSignal::CourseChanged(course_id) => {
                let current = self.inner.state.lock().await.course_id.clone();
                if current.as_ref() != Some(&course_id) {
                    self.init(course_id).await?;
                }
                Ok(())
            }
            DraftSignal::Clear => self.clear().await,
        }
    }

    //-------------------------------------------------------------------------------------
    // Edits
    //-------------------------------------------------------------------------------------

    /// Applies a structural edit. If `f` fails the draft is left as it was.
    pub async fn edit<R>(
        &self,
        f: impl FnOnce(&mut Draft) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.apply(None, ChangeKind::Structural, f).await
    }

    /// Applies an edit that only changes prose (names, descriptions, bodies).
    pub async fn edit_text<R>(
        &self,
        f: impl FnOnce(&mut Draft) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.apply(None, ChangeKind::Text, f).await
    }

    /// Applies an edit only if `context` is still the active course.
    pub async fn edit_in<R>(
        &self,
        context: &EditContext,
        f: impl FnOnce(&mut Draft) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.apply(Some(context), ChangeKind::Structural, f).await
    }

    async fn apply<R>(
        &self,
        context: Option<&EditContext>,
        kind: ChangeKind,
        f: impl FnOnce(&mut Draft) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let (result, course_id) = {
            let mut state = self.inner.state.lock().await;
            let current = state.ready_context()?;
            if let Some(context) = context {
                if context.epoch != current.epoch {
                    return Err(StoreError::Superseded(context.course_id.clone()));
                }
            }

            let before = state.draft.clone();
            let result = match f(&mut state.draft) {
                Ok(result) => result,
                Err(e) => {
                    state.draft = before;
                    return Err(e);
                }
            };
            state.draft.renumber_all();
            state.dirty = true;
            self.write_cache(&current.course_id, &state.draft).await;
            (result, current.course_id)
        };

        self.emit(DraftEvent::Changed { course_id });
        if kind == ChangeKind::Structural
            || self.inner.config.autosave_policy == AutosavePolicy::AnyChange
        {
            self.schedule_autosave().await;
        }
        Ok(result)
    }

    /// Records upload progress in memory only.
    pub async fn set_file_progress(
        &self,
        context: &EditContext,
        item_id: Uuid,
        slot: FileSlot,
        file_id: Uuid,
        progress: u8,
    ) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.lock().await;
            if state.epoch != context.epoch {
                return Err(StoreError::Superseded(context.course_id.clone()));
            }
            let lecture = state
                .draft
                .lecture_mut(item_id)
                .ok_or(StoreError::ItemNotFound(item_id))?;
            let file = lecture
                .files_mut(slot)
                .iter_mut()
                .find(|file| file.id == file_id)
                .ok_or(StoreError::FileNotFound(file_id))?;
            file.progress = progress.min(100);
        }
        self.emit(DraftEvent::FileProgress {
            course_id: context.course_id.clone(),
            item_id,
            file_id,
            progress: progress.min(100),
        });
        Ok(())
    }

    /// Replaces the whole draft, e.g. with the state of a form.
    pub async fn replace(&self, draft: Draft) -> Result<(), StoreError> {
        self.edit(|current| {
            *current = draft;
            Ok(())
        })
        .await
    }

    /// Replaces the draft with the content of `snapshot`, keeping the selected
    /// bytes and progress of files that are still present.
    pub async fn replace_snapshot(&self, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        let mut incoming = from_storable(snapshot);
        self.edit(move |current| {
            let transient: HashMap<Uuid, (Bytes, u8)> = lecture_files(current)
                .filter_map(|file| file.local.clone().map(|data| (file.id, (data, file.progress))))
                .collect();
            for file in lecture_files_mut(&mut incoming) {
                if let Some((data, progress)) = transient.get(&file.id) {
                    file.local = Some(data.clone());
                    if file.status == FileStatus::Uploading {
                        file.progress = *progress;
                    }
                }
            }
            *current = incoming;
            Ok(())
        })
        .await
    }

    pub async fn add_section(&self, name: &str) -> Result<Uuid, StoreError> {
        let name = name.to_string();
        self.edit(move |draft| {
            let section = Section::new(name, draft.sections.len() as u32 + 1);
            let id = section.id;
            draft.sections.push(section);
            Ok(id)
        })
        .await
    }

    pub async fn rename_section(&self, index: usize, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.edit_text(move |draft| {
            draft
                .sections
                .get_mut(index)
                .ok_or(StoreError::SectionNotFound(index))?
                .name = name;
            Ok(())
        })
        .await
    }

    /// Changes the name, description or lecture body of an item.
    pub async fn edit_item_text(&self, item_id: Uuid, patch: TextPatch) -> Result<(), StoreError> {
        self.edit_text(move |draft| {
            let item = draft
                .item_mut(item_id)
                .ok_or(StoreError::ItemNotFound(item_id))?;
            let TextPatch {
                name,
                description,
                body,
            } = patch;
            let (title, about) = match item {
                Item::Lecture(lecture) => {
                    if body.is_some() {
                        lecture.body = body;
                    }
                    (&mut lecture.name, &mut lecture.description)
                }
                Item::Quiz(quiz) => (&mut quiz.title, &mut quiz.description),
                Item::Assignment(assignment) => (&mut assignment.title, &mut assignment.description),
            };
            if let Some(name) = name {
                *title = name;
            }
            if let Some(description) = description {
                *about = description;
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_section(&self, index: usize) -> Result<Section, StoreError> {
        self.edit(|draft| {
            if index >= draft.sections.len() {
                return Err(StoreError::SectionNotFound(index));
            }
            Ok(draft.sections.remove(index))
        })
        .await
    }

    pub async fn reorder_sections(&self, from: usize, to: usize) -> Result<(), StoreError> {
        self.edit(|draft| Ok(ordering::reorder(&mut draft.sections, from, to)?))
            .await
    }

    /// Appends an item to a section and returns its id.
    pub async fn add_item(&self, section: usize, item: Item) -> Result<Uuid, StoreError> {
        self.edit(|draft| {
            let items = &mut draft
                .sections
                .get_mut(section)
                .ok_or(StoreError::SectionNotFound(section))?
                .items;
            let id = item.id();
            items.push(item);
            Ok(id)
        })
        .await
    }

    pub async fn remove_item(&self, item_id: Uuid) -> Result<Item, StoreError> {
        self.edit(|draft| {
            let (section, index) = draft
                .find_item(item_id)
                .ok_or(StoreError::ItemNotFound(item_id))?;
            Ok(draft.sections[section].items.remove(index))
        })
        .await
    }

    pub async fn reorder_items(
        &self,
        section: usize,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        self.edit(|draft| {
            let items = &mut draft
                .sections
                .get_mut(section)
                .ok_or(StoreError::SectionNotFound(section))?
                .items;
            Ok(ordering::reorder(items, from, to)?)
        })
        .await
    }

    /// Drags an item from one section into another.
    pub async fn move_item(
        &self,
        from_section: usize,
        to_section: usize,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        if from_section == to_section {
            return self.reorder_items(from_section, from, to).await;
        }
        self.edit(|draft| {
            for section in [from_section, to_section] {
                if section >= draft.sections.len() {
                    return Err(StoreError::SectionNotFound(section));
                }
            }
            let mut source = std::mem::take(&mut draft.sections[from_section].items);
            let moved =
                ordering::move_between(&mut source, &mut draft.sections[to_section].items, from, to);
            draft.sections[from_section].items = source;
            Ok(moved?)
        })
        .await
    }

    //-------------------------------------------------------------------------------------
    // Saving
    //-------------------------------------------------------------------------------------

    /// Runs the autosave evaluation immediately.
    pub async fn flush(&self) -> Result<SaveOutcome, StoreError> {
        let context = self.current_context().await?;
        self.save(&context, None).await
    }

    /// Validates the draft and, when valid, sends it for review.
    pub async fn submit(&self) -> Result<SubmitOutcome, StoreError> {
        let (context, result) = {
            let state = self.inner.state.lock().await;
            (state.ready_context()?, validate(&state.draft))
        };
        if let ValidationResult::Invalid(errors) = result {
            info!("Submission blocked by {} validation error(s)", errors.len());
            return Ok(SubmitOutcome::Rejected(errors));
        }

        match self.save(&context, Some(SUBMITTED_STATUS)).await? {
            SaveOutcome::Saved { message } => {
                self.emit(DraftEvent::Submitted {
                    course_id: context.course_id,
                });
                Ok(SubmitOutcome::Submitted { message })
            }
            SaveOutcome::Unchanged => Ok(SubmitOutcome::Submitted {
                message: String::new(),
            }),
            SaveOutcome::Discarded => Err(StoreError::Superseded(context.course_id)),
        }
    }

    async fn schedule_autosave(&self) {
        let ticket = {
            let mut state = self.inner.state.lock().await;
            state.save_ticket += 1;
            state.save_ticket
        };
        let Ok(context) = self.current_context().await else {
            return;
        };

        let store = self.clone();
        let delay = self.inner.config.autosave_debounce;
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            store.debounce_elapsed(context, ticket).await;
        });
    }

    async fn debounce_elapsed(&self, context: EditContext, ticket: u64) {
        {
            let state = self.inner.state.lock().await;
            if state.epoch != context.epoch || state.save_ticket != ticket {
                debug!("Autosave timer superseded by a newer edit");
                return;
            }
        }
        // Autosave failures are not surfaced; the local cache still holds the draft.
        if let Err(e) = self.save(&context, None).await {
            warn!("Autosave of course {} failed: {}", context.course_id, e);
        }
    }

    /// Sends the draft when it differs from the last accepted snapshot, or
    /// unconditionally when a status is given.
    async fn save(
        &self,
        context: &EditContext,
        status: Option<&str>,
    ) -> Result<SaveOutcome, StoreError> {
        let _saving = self.inner.save_lock.lock().await;

        let (snapshot, record) = {
            let mut state = self.inner.state.lock().await;
            if state.epoch != context.epoch {
                return Ok(SaveOutcome::Discarded);
            }
            let snapshot = to_storable(&state.draft);
            if status.is_none() && state.last_saved.as_ref() == Some(&snapshot) {
                debug!("Draft unchanged since last save; skipping remote call");
                state.dirty = false;
                // Edits since the last save wrote the same tree back to the cache.
                self.remove_cached(&context.course_id).await;
                return Ok(SaveOutcome::Unchanged);
            }
            state.auto_saving = true;
            (snapshot, state.record.clone())
        };
        self.emit(DraftEvent::AutosaveStarted {
            course_id: context.course_id.clone(),
        });

        let result = self
            .push_remote(&context.course_id, record, &snapshot, status)
            .await;

        let outcome = {
            let mut state = self.inner.state.lock().await;
            if state.epoch != context.epoch {
                info!(
                    "Discarding save result for {}; the active course changed",
                    context.course_id
                );
                return Ok(SaveOutcome::Discarded);
            }
            state.auto_saving = false;
            match result {
                Ok((record, message)) => {
                    state.record = Some(record);
                    state.last_saved = Some(snapshot.clone());
                    if to_storable(&state.draft) == snapshot {
                        state.dirty = false;
                        // The API now holds everything the cache did.
                        self.remove_cached(&context.course_id).await;
                    } else {
                        self.write_cache(&context.course_id, &state.draft).await;
                    }
                    info!("Saved course {}", context.course_id);
                    Ok(SaveOutcome::Saved { message })
                }
                Err(e) => Err(StoreError::RemoteSave(e)),
            }
        };

        self.emit(DraftEvent::AutosaveFinished {
            course_id: context.course_id.clone(),
            saved: outcome.is_ok(),
        });
        outcome
    }

    /// Sends the full course record carrying the given curriculum.
    async fn push_remote(
        &self,
        course_id: &CourseId,
        record: Option<CourseRecord>,
        snapshot: &DraftSnapshot,
        status: Option<&str>,
    ) -> PortResult<(CourseRecord, String)> {
        let mut record = match record {
            Some(record) => record,
            None => self.inner.api.get_course_by_id(course_id).await?,
        };
        record.curriculum = Some(snapshot.clone());
        if let Some(status) = status {
            record.status = Some(status.to_string());
        }
        let message = self.inner.api.update_course(&record).await?;
        Ok((record, message))
    }

    //-------------------------------------------------------------------------------------
    // Local cache
    //-------------------------------------------------------------------------------------

    async fn read_cached(&self, course_id: &CourseId) -> Option<DraftSnapshot> {
        let raw = match self.inner.cache.get(&cache_keys::curriculum(course_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read cached draft: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CachedDraft>(&raw) {
            Ok(cached) if cached.course_id == *course_id => Some(cached.curriculum),
            Ok(cached) => {
                warn!(
                    "Cached draft belongs to {} instead of {}; ignoring it",
                    cached.course_id, course_id
                );
                None
            }
            // Entries written before the envelope existed hold the bare tree.
            Err(_) => match serde_json::from_str::<DraftSnapshot>(&raw) {
                Ok(snapshot) if !snapshot.sections.is_empty() => Some(snapshot),
                _ => {
                    warn!("Ignoring unreadable cached draft for {}", course_id);
                    None
                }
            },
        }
    }

    async fn remove_cached(&self, course_id: &CourseId) {
        if let Err(e) = self.inner.cache.remove(&cache_keys::curriculum(course_id)).await {
            warn!("Failed to clear cached draft: {}", e);
        }
    }

    async fn write_cache(&self, course_id: &CourseId, draft: &Draft) {
        let cached = CachedDraft {
            course_id: course_id.clone(),
            saved_at: Utc::now(),
            curriculum: to_storable(draft),
        };
        let result = match serde_json::to_string(&cached) {
            Ok(json) => {
                self.inner
                    .cache
                    .set(&cache_keys::curriculum(course_id), &json)
                    .await
            }
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        };
        if let Err(e) = result {
            warn!("Failed to cache draft of {}: {}", course_id, e);
        }
    }
}

fn lecture_files(draft: &Draft) -> impl Iterator<Item = &MediaFile> {
    draft
        .sections
        .iter()
        .flat_map(|section| section.items.iter())
        .filter_map(|item| match item {
            Item::Lecture(lecture) => Some(lecture.media.iter().chain(lecture.resources.iter())),
            _ => None,
        })
        .flatten()
}

fn lecture_files_mut(draft: &mut Draft) -> impl Iterator<Item = &mut MediaFile> {
    draft
        .sections
        .iter_mut()
        .flat_map(|section| section.items.iter_mut())
        .filter_map(|item| match item {
            Item::Lecture(lecture) => {
                Some(lecture.media.iter_mut().chain(lecture.resources.iter_mut()))
            }
            _ => None,
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lecture, Quiz};
    use crate::ports::MockCourseApiService;
    use crate::testing::{course, FakeCourseApi, InMemoryCache};
    use crate::validation::{Field, Location};

    const WINDOW: Duration = Duration::from_secs(3);

    fn store_with(api: Arc<FakeCourseApi>, cache: Arc<InMemoryCache>) -> DraftStore {
        DraftStore::new(api, cache, StoreConfig::default())
    }

    async fn rename_first_section(store: &DraftStore, name: &str) {
        let name = name.to_string();
        store
            .edit(move |draft| {
                draft.sections[0].name = name;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loads_remote_curriculum_when_cache_is_empty() {
        let mut record = course("c1");
        let mut draft = Draft::default();
        draft.sections[0].name = "From server".to_string();
        record.curriculum = Some(to_storable(&draft));
        let api = Arc::new(FakeCourseApi::with_courses([record]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));

        let outcome = store.init(CourseId::from("c1")).await.unwrap();

        assert_eq!(outcome.source, DraftSource::Remote);
        let view = store.state().await;
        assert_eq!(view.phase, Phase::Ready);
        assert_eq!(view.draft.sections[0].name, "From server");
        assert!(!view.dirty);
        assert!(view.last_saved.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cached_draft_wins_over_remote() {
        let cache = Arc::new(InMemoryCache::default());
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), cache.clone());
        store.init(CourseId::from("c1")).await.unwrap();
        rename_first_section(&store, "Unsynced").await;

        let reopened = store_with(api.clone(), cache.clone());
        let outcome = reopened.init(CourseId::from("c1")).await.unwrap();
        assert_eq!(outcome.source, DraftSource::Cache);
        assert_eq!(reopened.state().await.draft.sections[0].name, "Unsynced");
        assert_eq!(api.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_falls_back_to_default() {
        let api = Arc::new(FakeCourseApi::default());
        let store = store_with(api, Arc::new(InMemoryCache::default()));
        let mut events = store.subscribe();

        let outcome = store.init(CourseId::from("missing")).await.unwrap();

        assert_eq!(outcome.source, DraftSource::Default);
        assert!(matches!(outcome.fetch_error, Some(PortError::NotFound(_))));
        assert_eq!(store.state().await.phase, Phase::Ready);

        let mut saw_notice = false;
        while let Ok(event) = events.try_recv() {
            saw_notice |= matches!(event, DraftEvent::Notice { .. });
        }
        assert!(saw_notice);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_are_cached_immediately() {
        let cache = Arc::new(InMemoryCache::default());
        let store = store_with(
            Arc::new(FakeCourseApi::with_courses([course("c1")])),
            cache.clone(),
        );
        store.init(CourseId::from("c1")).await.unwrap();
        rename_first_section(&store, "Basics").await;

        let raw = cache.value("curriculum_c1").expect("cached draft");
        assert!(raw.contains("Basics"));
        assert_eq!(cache.value("courseId").as_deref(), Some("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_skips_when_nothing_changed() {
        let cache = Arc::new(InMemoryCache::default());
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), cache.clone());
        store.init(CourseId::from("c1")).await.unwrap();

        rename_first_section(&store, "Basics").await;
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);
        assert!(cache.value("curriculum_c1").is_none());

        rename_first_section(&store, "Basics").await;
        assert!(cache.value("curriculum_c1").is_some());
        tokio::time::sleep(WINDOW).await;
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);
        assert!(!store.state().await.dirty);
        assert!(cache.value("curriculum_c1").is_none());

        // Another session opens the synced course from the API, not the cache.
        let other = store_with(api.clone(), cache.clone());
        let outcome = other.init(CourseId::from("c1")).await.unwrap();
        assert_eq!(outcome.source, DraftSource::Remote);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_save() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));
        store.init(CourseId::from("c1")).await.unwrap();

        for name in ["A", "AB", "ABC"] {
            rename_first_section(&store, name).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(api.update_count(), 0);

        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);
        let sent = api.last_update().unwrap();
        assert_eq!(sent.curriculum.unwrap().sections[0].name, "ABC");
        assert_eq!(sent.extra.get("price"), Some(&serde_json::json!(25)));
    }

    #[tokio::test(start_paused = true)]
    async fn text_edits_wait_for_structural_change_when_configured() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let config = StoreConfig {
            autosave_policy: AutosavePolicy::StructuralOnly,
            ..StoreConfig::default()
        };
        let store = DraftStore::new(api.clone(), Arc::new(InMemoryCache::default()), config);
        store.init(CourseId::from("c1")).await.unwrap();

        store
            .edit_text(|draft| {
                draft.sections[0].name = "Typed".to_string();
                Ok(())
            })
            .await
            .unwrap();
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 0);

        store.add_section("Next").await.unwrap();
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn item_and_section_text_edits_stay_local_when_configured() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let config = StoreConfig {
            autosave_policy: AutosavePolicy::StructuralOnly,
            ..StoreConfig::default()
        };
        let store = DraftStore::new(api.clone(), Arc::new(InMemoryCache::default()), config);
        store.init(CourseId::from("c1")).await.unwrap();
        let lecture_id = store
            .add_item(0, Item::Lecture(Lecture::new("Draft")))
            .await
            .unwrap();
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);

        store
            .edit_item_text(
                lecture_id,
                TextPatch {
                    name: Some("Welcome".to_string()),
                    body: Some("Hello".to_string()),
                    ..TextPatch::default()
                },
            )
            .await
            .unwrap();
        store.rename_section(0, "Getting started").await.unwrap();
        tokio::time::sleep(WINDOW).await;
        assert_eq!(api.update_count(), 1);

        let view = store.state().await;
        assert!(view.dirty);
        assert_eq!(view.draft.sections[0].name, "Getting started");
        let Item::Lecture(lecture) = &view.draft.sections[0].items[0] else {
            panic!("expected a lecture");
        };
        assert_eq!(lecture.name, "Welcome");
        assert_eq!(lecture.body.as_deref(), Some("Hello"));
        assert_eq!(lecture.description, "");

        let missing = Uuid::new_v4();
        assert_eq!(
            store.edit_item_text(missing, TextPatch::default()).await,
            Err(StoreError::ItemNotFound(missing))
        );
        assert_eq!(
            store.rename_section(4, "Nope").await,
            Err(StoreError::SectionNotFound(4))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_failure_keeps_cache() {
        let cache = Arc::new(InMemoryCache::default());
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        api.fail_updates(true);
        let store = store_with(api.clone(), cache.clone());
        store.init(CourseId::from("c1")).await.unwrap();

        rename_first_section(&store, "Offline").await;
        tokio::time::sleep(WINDOW).await;

        assert!(cache.value("curriculum_c1").is_some());
        let view = store.state().await;
        assert!(view.dirty);
        assert!(!view.auto_saving);
        assert!(view.last_saved.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edit_leaves_draft_untouched() {
        let store = store_with(
            Arc::new(FakeCourseApi::with_courses([course("c1")])),
            Arc::new(InMemoryCache::default()),
        );
        store.init(CourseId::from("c1")).await.unwrap();
        let before = store.state().await.draft;

        let result = store
            .edit(|draft| {
                draft.sections[0].name = "half-done".to_string();
                Err::<(), _>(StoreError::SectionNotFound(9))
            })
            .await;

        assert_eq!(result, Err(StoreError::SectionNotFound(9)));
        assert_eq!(store.state().await.draft, before);
        assert_eq!(
            store.reorder_sections(0, 4).await,
            Err(StoreError::Ordering(OrderingError::InvalidIndex { index: 4, len: 1 }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cross_section_drag_renumbers_both_sections() {
        let store = store_with(
            Arc::new(FakeCourseApi::with_courses([course("c1")])),
            Arc::new(InMemoryCache::default()),
        );
        store.init(CourseId::from("c1")).await.unwrap();
        store.add_section("B").await.unwrap();
        let x = store.add_item(0, Item::Lecture(Lecture::new("X"))).await.unwrap();
        let y = store.add_item(0, Item::Lecture(Lecture::new("Y"))).await.unwrap();
        let z = store.add_item(1, Item::Quiz(Quiz::new("Z"))).await.unwrap();

        store.move_item(0, 1, 0, 1).await.unwrap();

        let draft = store.state().await.draft;
        let ids = |s: usize| draft.sections[s].items.iter().map(Item::id).collect::<Vec<_>>();
        assert_eq!(ids(0), vec![y]);
        assert_eq!(ids(1), vec![z, x]);
        assert_eq!(draft.sections[0].items[0].seq_no(), 1);
        assert_eq!(draft.sections[1].items[0].seq_no(), 1);
        assert_eq!(draft.sections[1].items[1].seq_no(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_from_snapshot_keeps_selected_bytes() {
        let store = store_with(
            Arc::new(FakeCourseApi::with_courses([course("c1")])),
            Arc::new(InMemoryCache::default()),
        );
        store.init(CourseId::from("c1")).await.unwrap();
        let lecture = Lecture {
            content_kind: crate::domain::ContentKind::Video,
            ..Lecture::new("Clip")
        };
        let item_id = store.add_item(0, Item::Lecture(lecture)).await.unwrap();
        store
            .edit(|draft| {
                let mut file = MediaFile::pending("clip.mp4", Bytes::from_static(b"video"));
                file.progress = 40;
                draft.lecture_mut(item_id).unwrap().media.push(file);
                Ok(())
            })
            .await
            .unwrap();

        let mut snapshot = store.snapshot().await;
        snapshot.sections[0].name = "Renamed elsewhere".to_string();
        store.replace_snapshot(&snapshot).await.unwrap();

        let mut draft = store.state().await.draft;
        assert_eq!(draft.sections[0].name, "Renamed elsewhere");
        let file = &draft.lecture_mut(item_id).unwrap().media[0];
        assert_eq!(file.local.as_deref(), Some(&b"video"[..]));
        assert_eq!(file.progress, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_course_discards_stale_save() {
        let api = Arc::new(FakeCourseApi::with_courses([course("A"), course("B")]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));
        store.init(CourseId::from("A")).await.unwrap();
        rename_first_section(&store, "Edited A").await;

        let release = api.hold_next_update();
        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.flush().await }
        });
        api.update_started().await;

        store.init(CourseId::from("B")).await.unwrap();
        rename_first_section(&store, "Edited B").await;
        release.send(()).unwrap();

        assert_eq!(pending.await.unwrap(), Ok(SaveOutcome::Discarded));
        let view = store.state().await;
        assert_eq!(view.course_id, Some(CourseId::from("B")));
        assert_eq!(view.draft.sections[0].name, "Edited B");
        assert!(view.last_saved.is_none());
        assert!(view.dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_rejects_invalid_draft_without_remote_call() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));
        store.init(CourseId::from("c1")).await.unwrap();

        let outcome = store.submit().await.unwrap();

        let SubmitOutcome::Rejected(errors) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(
            errors[0].location,
            Location {
                section: 0,
                item: None,
                field: Field::Items
            }
        );
        assert_eq!(api.update_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_sends_full_record_with_pending_status() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));
        store.init(CourseId::from("c1")).await.unwrap();
        store
            .add_item(0, Item::Quiz(crate::testing::valid_quiz()))
            .await
            .unwrap();

        let outcome = store.submit().await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Submitted { .. }));
        let sent = api.last_update().unwrap();
        assert_eq!(sent.status.as_deref(), Some(SUBMITTED_STATUS));
        assert_eq!(sent.title, "Course c1");
        assert!(sent.curriculum.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_failure_keeps_draft() {
        let api = Arc::new(FakeCourseApi::with_courses([course("c1")]));
        let store = store_with(api.clone(), Arc::new(InMemoryCache::default()));
        store.init(CourseId::from("c1")).await.unwrap();
        store
            .add_item(0, Item::Quiz(crate::testing::valid_quiz()))
            .await
            .unwrap();
        api.fail_updates(true);

        let result = store.submit().await;

        assert!(matches!(result, Err(StoreError::RemoteSave(_))));
        assert_eq!(store.state().await.draft.sections[0].items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_wipes_cache_and_notifies_observers() {
        let cache = Arc::new(InMemoryCache::default());
        let store = store_with(
            Arc::new(FakeCourseApi::with_courses([course("c1")])),
            cache.clone(),
        );
        store.init(CourseId::from("c1")).await.unwrap();
        rename_first_section(&store, "Soon gone").await;
        let mut observer = store.subscribe();

        store.clear().await.unwrap();

        assert_eq!(store.state().await.phase, Phase::Uninitialized);
        assert!(cache.value("curriculum_c1").is_none());
        assert!(cache.value("courseId").is_none());
        assert_eq!(
            observer.recv().await.unwrap(),
            DraftEvent::Cleared {
                course_id: Some(CourseId::from("c1"))
            }
        );
        assert_eq!(
            store.add_section("late").await,
            Err(StoreError::NotReady)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn signals_switch_course_and_resume_uses_pointer() {
        let cache = Arc::new(InMemoryCache::default());
        let api = Arc::new(FakeCourseApi::with_courses([course("A"), course("B")]));
        let store = store_with(api.clone(), cache.clone());
        store.init(CourseId::from("A")).await.unwrap();

        store
            .observe(DraftSignal::CourseChanged(CourseId::from("B")))
            .await
            .unwrap();
        assert_eq!(store.state().await.course_id, Some(CourseId::from("B")));

        let other_view = store_with(api, cache);
        let outcome = other_view.resume().await.unwrap().unwrap();
        assert_eq!(outcome.source, DraftSource::Default);
        assert_eq!(other_view.state().await.course_id, Some(CourseId::from("B")));
    }

    #[tokio::test(start_paused = true)]
    async fn restored_uploads_are_marked_failed() {
        let cache = Arc::new(InMemoryCache::default());
        let mut lecture = Lecture::new("Clip");
        lecture.content_kind = crate::domain::ContentKind::Video;
        lecture
            .media
            .push(crate::domain::MediaFile::pending("clip.mp4", bytes::Bytes::from_static(b"v")));
        let mut draft = Draft::default();
        draft.sections[0].items.push(Item::Lecture(lecture));
        let cached = CachedDraft {
            course_id: CourseId::from("c1"),
            saved_at: Utc::now(),
            curriculum: to_storable(&draft),
        };
        cache.insert("curriculum_c1", &serde_json::to_string(&cached).unwrap());

        let store = store_with(Arc::new(FakeCourseApi::with_courses([course("c1")])), cache);
        store.init(CourseId::from("c1")).await.unwrap();

        let Item::Lecture(lecture) = &store.state().await.draft.sections[0].items[0] else {
            panic!("expected a lecture");
        };
        assert_eq!(lecture.media[0].status, crate::domain::FileStatus::Failed);
    }

    #[tokio::test]
    async fn create_course_opens_default_draft() {
        let mut api = MockCourseApiService::new();
        api.expect_create_course()
            .withf(|title| title == "Rust for Beginners")
            .times(1)
            .returning(|_| Ok(course("new-1")));
        api.expect_get_course_by_id()
            .times(1)
            .returning(|id| Ok(course(id.as_str())));
        let store = DraftStore::new(
            Arc::new(api),
            Arc::new(InMemoryCache::default()),
            StoreConfig::default(),
        );

        let record = store.create_course("Rust for Beginners").await.unwrap();

        assert_eq!(record.id, "new-1");
        let view = store.state().await;
        assert_eq!(view.course_id, Some(CourseId::from("new-1")));
        assert_eq!(view.draft.sections.len(), 1);
    }

    #[tokio::test]
    async fn create_course_failure_is_normalized() {
        let mut api = MockCourseApiService::new();
        api.expect_create_course()
            .returning(|_| Err(PortError::Rejected("title taken".to_string())));
        let store = DraftStore::new(
            Arc::new(api),
            Arc::new(InMemoryCache::default()),
            StoreConfig::default(),
        );

        assert_eq!(
            store.create_course("Dup").await,
            Err(StoreError::RemoteCreate(PortError::Rejected("title taken".to_string())))
        );
        assert_eq!(store.state().await.phase, Phase::Uninitialized);
    }
}
