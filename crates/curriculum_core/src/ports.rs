//! crates/curriculum_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the collaborators the draft engine
//! talks to: the remote course API, the local key/value cache and the media host.
//! Adapters implement these; the engine never sees a transport error directly.

use crate::domain::{CourseId, MediaKind};
use crate::snapshot::CourseRecord;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, SQLite).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("The remote service rejected the request: {0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Local cache keys
//=========================================================================================

pub mod cache_keys {
    use crate::domain::CourseId;

    /// Pointer to the course the author last worked on.
    pub const COURSE_ID: &str = "courseId";

    /// Key holding the unsynced curriculum of one course.
    pub fn curriculum(course_id: &CourseId) -> String {
        format!("curriculum_{}", course_id)
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseApiService: Send + Sync {
    async fn get_course_by_id(&self, course_id: &CourseId) -> PortResult<CourseRecord>;

    /// Replaces the whole course record. Returns the API's confirmation message.
    async fn update_course(&self, record: &CourseRecord) -> PortResult<String>;

    async fn create_course(&self, title: &str) -> PortResult<CourseRecord>;
}

/// String-keyed storage for JSON blobs that survives restarts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalCacheService: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// Receives upload progress as a percentage in 0..=100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A file handed to the media host.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub kind: MediaKind,
    pub data: Bytes,
}

/// What the media host reports for a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedMedia {
    pub url: String,
    pub remote_id: String,
    pub duration_secs: Option<u32>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaHostService: Send + Sync {
    async fn upload(
        &self,
        upload: MediaUpload,
        progress: Option<ProgressFn>,
    ) -> PortResult<HostedMedia>;

    /// Returns whether the host actually removed the asset.
    async fn delete(&self, remote_id: &str, kind: MediaKind) -> PortResult<bool>;
}

/// Looks up metadata for videos hosted elsewhere and linked by URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoMetadataService: Send + Sync {
    /// The video's length in seconds, if the host exposes it.
    async fn lookup_duration(&self, url: &str) -> PortResult<Option<u32>>;
}
