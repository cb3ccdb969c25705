//! crates/curriculum_core/src/upload.rs
//!
//! Drives file uploads to the media host and folds the results back into the
//! draft through the `DraftStore`.
//!
//! Each lecture has its own queue. By default one file is in flight at a time
//! so progress readouts stay meaningful; files leave the queue in the order the
//! author selected them. A placeholder entry is added to the draft before any
//! network call, and every completion is checked against the course that was
//! active when the upload started.

use crate::domain::{ContentKind, Draft, FileSlot, FileStatus, Item, MediaFile, SourceMode};
use crate::ports::{MediaHostService, MediaUpload, PortError, ProgressFn, VideoMetadataService};
use crate::store::{DraftStore, EditContext, StoreError};
use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Files per lecture uploaded at the same time unless configured otherwise.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("The media host rejected {file}: {source}")]
    Host { file: String, source: PortError },
    #[error("File {0} has no local data left to upload; select it again")]
    MissingData(Uuid),
    #[error("Item {0} is not a lecture")]
    NotALecture(Uuid),
    #[error("Choose a content type for lecture {0} before adding media")]
    NoContentKind(Uuid),
    #[error("File {0} is not a failed upload; only failed uploads can be retried")]
    NotRetryable(Uuid),
    #[error("Upload queue closed")]
    QueueClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct Inner {
    store: DraftStore,
    host: Arc<dyn MediaHostService>,
    metadata: Arc<dyn VideoMetadataService>,
    concurrency: usize,
    lanes: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

fn file_mut(
    draft: &mut Draft,
    item_id: Uuid,
    slot: FileSlot,
    file_id: Uuid,
) -> Result<&mut MediaFile, StoreError> {
    draft
        .lecture_mut(item_id)
        .ok_or(StoreError::ItemNotFound(item_id))?
        .files_mut(slot)
        .iter_mut()
        .find(|file| file.id == file_id)
        .ok_or(StoreError::FileNotFound(file_id))
}

impl UploadOrchestrator {
    pub fn new(
        store: DraftStore,
        host: Arc<dyn MediaHostService>,
        metadata: Arc<dyn VideoMetadataService>,
        concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                host,
                metadata,
                concurrency: concurrency.max(1),
                lanes: Mutex::new(HashMap::new()),
            }),
        }
    }

    async fn lane(&self, item_id: Uuid) -> Arc<Semaphore> {
        self.inner
            .lanes
            .lock()
            .await
            .entry(item_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.inner.concurrency)))
            .clone()
    }

    #[cfg(test)]
    async fn lane_count(&self) -> usize {
        self.inner.lanes.lock().await.len()
    }

    /// Adds one `uploading` placeholder per file, in selection order.
    pub async fn enqueue(
        &self,
        item_id: Uuid,
        slot: FileSlot,
        files: Vec<(String, Bytes)>,
    ) -> Result<(EditContext, Vec<Uuid>), UploadError> {
        let context = self.inner.store.current_context().await?;
        let mut rejection = None;
        let result = self
            .inner
            .store
            .edit_in(&context, |draft| {
                let Some(lecture) = draft.lecture_mut(item_id) else {
                    rejection = Some(UploadError::NotALecture(item_id));
                    return Err(StoreError::ItemNotFound(item_id));
                };
                // Media files of a lecture without a content type are never stored.
                if slot == FileSlot::Media && lecture.content_kind == ContentKind::Unset {
                    rejection = Some(UploadError::NoContentKind(item_id));
                    return Err(StoreError::ItemNotFound(item_id));
                }
                let target = lecture.files_mut(slot);
                Ok(files
                    .into_iter()
                    .map(|(name, data)| {
                        let placeholder = MediaFile::pending(name, data);
                        let id = placeholder.id;
                        target.push(placeholder);
                        id
                    })
                    .collect::<Vec<_>>())
            })
            .await;
        let ids = result.map_err(|e| rejection.take().unwrap_or(UploadError::Store(e)))?;
        Ok((context, ids))
    }

    /// Uploads every selected file and waits for all of them.
    ///
    /// The outer error covers the selection as a whole; each inner result
    /// belongs to one file and never stops the others.
    pub async fn upload_files(
        &self,
        item_id: Uuid,
        slot: FileSlot,
        files: Vec<(String, Bytes)>,
    ) -> Result<Vec<Result<Uuid, UploadError>>, UploadError> {
        let (context, ids) = self.enqueue(item_id, slot, files).await?;
        let runs = ids
            .into_iter()
            .map(|file_id| self.run(context.clone(), item_id, slot, file_id));
        Ok(join_all(runs).await)
    }

    /// Adds placeholders and uploads in the background. Returns the placeholder ids.
    pub async fn start_upload(
        &self,
        item_id: Uuid,
        slot: FileSlot,
        files: Vec<(String, Bytes)>,
    ) -> Result<Vec<Uuid>, UploadError> {
        let (context, ids) = self.enqueue(item_id, slot, files).await?;
        let orchestrator = self.clone();
        let queued = ids.clone();
        tokio::spawn(async move {
            let runs = queued
                .into_iter()
                .map(|file_id| orchestrator.run(context.clone(), item_id, slot, file_id));
            for result in join_all(runs).await {
                if let Err(e) = result {
                    warn!("Upload failed: {}", e);
                }
            }
        });
        Ok(ids)
    }

    /// Re-sends a failed file that still holds its selected bytes.
    pub async fn retry(
        &self,
        item_id: Uuid,
        slot: FileSlot,
        file_id: Uuid,
    ) -> Result<Uuid, UploadError> {
        let context = self.inner.store.current_context().await?;
        let mut rejection = None;
        let result = self
            .inner
            .store
            .edit_in(&context, |draft| {
                let file = file_mut(draft, item_id, slot, file_id)?;
                if file.status != FileStatus::Failed {
                    rejection = Some(UploadError::NotRetryable(file_id));
                    return Err(StoreError::FileNotFound(file_id));
                }
                if file.local.is_none() {
                    rejection = Some(UploadError::MissingData(file_id));
                    return Err(StoreError::FileNotFound(file_id));
                }
                file.status = FileStatus::Uploading;
                file.progress = 0;
                Ok(())
            })
            .await;
        result.map_err(|e| rejection.take().unwrap_or(UploadError::Store(e)))?;
        self.run(context, item_id, slot, file_id).await
    }

    /// Waits for a slot in the lecture's lane, uploads, then drops the lane
    /// once nobody else is queued on it.
    async fn run(
        &self,
        context: EditContext,
        item_id: Uuid,
        slot: FileSlot,
        file_id: Uuid,
    ) -> Result<Uuid, UploadError> {
        let lane = self.lane(item_id).await;
        let result = match lane.acquire().await {
            Ok(_permit) => self.upload_one(context, item_id, slot, file_id).await,
            Err(_) => Err(UploadError::QueueClosed),
        };
        self.release_lane(item_id, lane).await;
        result
    }

    async fn release_lane(&self, item_id: Uuid, lane: Arc<Semaphore>) {
        let mut lanes = self.inner.lanes.lock().await;
        drop(lane);
        // Every queued or running upload holds a clone of its lane.
        if lanes
            .get(&item_id)
            .is_some_and(|lane| Arc::strong_count(lane) == 1)
        {
            lanes.remove(&item_id);
        }
    }

    async fn upload_one(
        &self,
        context: EditContext,
        item_id: Uuid,
        slot: FileSlot,
        file_id: Uuid,
    ) -> Result<Uuid, UploadError> {
        let upload = self
            .inner
            .store
            .read_in(&context, |draft| {
                let (section, index) = draft.find_item(item_id)?;
                let Item::Lecture(lecture) = &draft.sections[section].items[index]
                else {
                    return None;
                };
                let file = lecture.files(slot).iter().find(|file| file.id == file_id)?;
                Some((file.name.clone(), file.local.clone(), lecture.media_kind(slot)))
            })
            .await?;
        let (file_name, data, kind) = upload.ok_or(StoreError::FileNotFound(file_id))?;
        let data = data.ok_or(UploadError::MissingData(file_id))?;

        debug!("Uploading {} ({} bytes)", file_name, data.len());
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let progress: ProgressFn = Arc::new(move |percent| {
            let _ = progress_tx.send(percent);
        });
        let request = MediaUpload {
            file_name: file_name.clone(),
            kind,
            data,
        };
        let upload = self.inner.host.upload(request, Some(progress));
        tokio::pin!(upload);
        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                Some(percent) = progress_rx.recv() => {
                    if let Err(e) = self
                        .inner
                        .store
                        .set_file_progress(&context, item_id, slot, file_id, percent)
                        .await
                    {
                        debug!("Dropping progress update: {}", e);
                    }
                }
            }
        };

        match result {
            Ok(hosted) => {
                let applied = self
                    .inner
                    .store
                    .edit_in(&context, |draft| {
                        let file = file_mut(draft, item_id, slot, file_id)?;
                        file.status = FileStatus::Uploaded;
                        file.progress = 100;
                        file.local = None;
                        file.remote_url = Some(hosted.url.clone());
                        file.remote_id = Some(hosted.remote_id.clone());
                        file.duration_secs = hosted.duration_secs;
                        file.uploaded_at = Some(Utc::now());
                        if let Some(lecture) = draft.lecture_mut(item_id) {
                            if slot == FileSlot::Media && lecture.content_kind == ContentKind::Video {
                                lecture.duration_secs = lecture
                                    .media
                                    .iter()
                                    .filter_map(|file| file.duration_secs)
                                    .sum();
                            }
                        }
                        Ok(())
                    })
                    .await;
                match applied {
                    Ok(()) => {
                        info!("Uploaded {} to {}", file_name, hosted.url);
                        Ok(file_id)
                    }
                    Err(e) => {
                        // Nobody references the asset any more.
                        info!("Discarding upload of {}: {}", file_name, e);
                        if let Err(e) = self.inner.host.delete(&hosted.remote_id, kind).await {
                            warn!("Failed to delete orphaned asset {}: {}", hosted.remote_id, e);
                        }
                        Err(e.into())
                    }
                }
            }
            Err(source) => {
                warn!("Upload of {} failed: {}", file_name, source);
                let marked = self
                    .inner
                    .store
                    .edit_in(&context, |draft| {
                        let file = file_mut(draft, item_id, slot, file_id)?;
                        file.status = FileStatus::Failed;
                        file.progress = 0;
                        Ok(())
                    })
                    .await;
                if let Err(e) = marked {
                    debug!("Could not mark {} as failed: {}", file_name, e);
                }
                Err(UploadError::Host {
                    file: file_name,
                    source,
                })
            }
        }
    }

    /// Deletes the hosted asset, if any, then drops the entry from the draft.
    /// The remote delete is best-effort.
    pub async fn remove_file(
        &self,
        item_id: Uuid,
        slot: FileSlot,
        file_id: Uuid,
    ) -> Result<MediaFile, UploadError> {
        let context = self.inner.store.current_context().await?;
        let hosted = self
            .inner
            .store
            .read(|draft| {
                let (section, index) = draft.find_item(item_id)?;
                let Item::Lecture(lecture) = &draft.sections[section].items[index]
                else {
                    return None;
                };
                let file = lecture.files(slot).iter().find(|file| file.id == file_id)?;
                Some((file.remote_id.clone(), lecture.media_kind(slot)))
            })
            .await;
        let (remote_id, kind) = hosted.ok_or(StoreError::FileNotFound(file_id))?;

        if let Some(remote_id) = remote_id {
            match self.inner.host.delete(&remote_id, kind).await {
                Ok(true) => debug!("Deleted hosted asset {}", remote_id),
                Ok(false) => info!("Media host kept asset {}", remote_id),
                Err(e) => warn!("Failed to delete hosted asset {}: {}", remote_id, e),
            }
        }

        let removed = self
            .inner
            .store
            .edit_in(&context, |draft| {
                let lecture = draft
                    .lecture_mut(item_id)
                    .ok_or(StoreError::ItemNotFound(item_id))?;
                let files = lecture.files_mut(slot);
                let index = files
                    .iter()
                    .position(|file| file.id == file_id)
                    .ok_or(StoreError::FileNotFound(file_id))?;
                Ok(files.remove(index))
            })
            .await?;
        Ok(removed)
    }

    /// Looks up the length of a linked video and stores it on the lecture.
    /// Falls back to 0 when the host cannot tell.
    pub async fn detect_link_duration(&self, item_id: Uuid) -> Result<u32, UploadError> {
        let context = self.inner.store.current_context().await?;
        let url = self
            .inner
            .store
            .read(|draft| {
                let (section, index) = draft.find_item(item_id)?;
                match &draft.sections[section].items[index] {
                    Item::Lecture(lecture) => Some(
                        (lecture.content_kind == ContentKind::Video
                            && lecture.source_mode == SourceMode::Link)
                            .then(|| lecture.url.clone())
                            .flatten(),
                    ),
                    _ => None,
                }
            })
            .await
            .ok_or(UploadError::NotALecture(item_id))?;

        let duration = match url {
            Some(url) => match self.inner.metadata.lookup_duration(&url).await {
                Ok(Some(seconds)) => seconds,
                Ok(None) => {
                    info!("No duration available for {}", url);
                    0
                }
                Err(e) => {
                    warn!("Duration lookup for {} failed: {}", url, e);
                    0
                }
            },
            None => 0,
        };

        self.inner
            .store
            .edit_in(&context, |draft| {
                let lecture = draft
                    .lecture_mut(item_id)
                    .ok_or(StoreError::ItemNotFound(item_id))?;
                lecture.duration_secs = duration;
                Ok(())
            })
            .await?;
        Ok(duration)
    }
}
