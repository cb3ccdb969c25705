pub mod domain;
pub mod ordering;
pub mod ports;
pub mod snapshot;
pub mod store;
pub mod upload;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    Assignment, AssignmentQuestion, ContentKind, CourseId, Draft, FileSlot, FileStatus, Item,
    Lecture, MediaFile, MediaKind, Quiz, QuizQuestion, Section, SourceMode,
};
pub use ports::{
    CourseApiService, HostedMedia, LocalCacheService, MediaHostService, MediaUpload, PortError,
    PortResult, ProgressFn, VideoMetadataService,
};
pub use snapshot::{from_storable, to_storable, CourseRecord, DraftSnapshot};
pub use store::{
    AutosavePolicy, DraftEvent, DraftSignal, DraftSource, DraftStore, DraftView, InitOutcome,
    Phase, SaveOutcome, StoreConfig, StoreError, SubmitOutcome, TextPatch,
};
pub use upload::{UploadError, UploadOrchestrator};
pub use validation::{validate, Field, Location, ValidationError, ValidationResult};
