//! crates/curriculum_core/src/domain.rs
//!
//! Defines the in-memory curriculum draft: sections, their heterogeneous items
//! and the media files attached to lectures.
//! These structs carry no storage concerns; `snapshot` owns the serialized
//! shape. Only the small closed enums derive serde so snapshots can reuse them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Name given to the single section of a brand-new draft.
pub const DEFAULT_SECTION_NAME: &str = "Introduction";

//=========================================================================================
// Identifiers
//=========================================================================================

/// The remote identifier of a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CourseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CourseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

//=========================================================================================
// Draft and Section
//=========================================================================================

/// The root aggregate for one course's curriculum.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub sections: Vec<Section>,
}

impl Default for Draft {
    /// A new course starts with one empty section.
    fn default() -> Self {
        Self {
            sections: vec![Section::new(DEFAULT_SECTION_NAME, 1)],
        }
    }
}

impl Draft {
    /// A draft with no sections at all.
    pub fn empty() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Renumbers every section, and every item inside each section, from 1.
    pub fn renumber_all(&mut self) {
        crate::ordering::renumber(&mut self.sections);
        for section in &mut self.sections {
            crate::ordering::renumber(&mut section.items);
        }
    }

    /// Finds an item anywhere in the draft by its client-side id.
    pub fn find_item(&self, item_id: Uuid) -> Option<(usize, usize)> {
        self.sections.iter().enumerate().find_map(|(s, section)| {
            section
                .items
                .iter()
                .position(|item| item.id() == item_id)
                .map(|i| (s, i))
        })
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut Item> {
        self.sections
            .iter_mut()
            .flat_map(|section| section.items.iter_mut())
            .find(|item| item.id() == item_id)
    }

    pub fn lecture_mut(&mut self, item_id: Uuid) -> Option<&mut Lecture> {
        match self.item_mut(item_id) {
            Some(Item::Lecture(lecture)) => Some(lecture),
            _ => None,
        }
    }

    /// Marks every file left in `uploading` without local data as `failed`.
    ///
    /// A restored draft cannot resume an upload whose bytes were dropped on
    /// serialization. Returns how many files were marked.
    pub fn fail_interrupted_uploads(&mut self) -> usize {
        let mut marked = 0;
        for section in &mut self.sections {
            for item in &mut section.items {
                if let Item::Lecture(lecture) = item {
                    for file in lecture.media.iter_mut().chain(lecture.resources.iter_mut()) {
                        if file.status == FileStatus::Uploading && file.local.is_none() {
                            file.status = FileStatus::Failed;
                            file.progress = 0;
                            marked += 1;
                        }
                    }
                }
            }
        }
        marked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: Uuid,
    pub name: String,
    pub published: bool,
    pub seq_no: u32,
    pub items: Vec<Item>,
}

impl Section {
    pub fn new(name: impl Into<String>, seq_no: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            published: false,
            seq_no,
            items: Vec::new(),
        }
    }
}

//=========================================================================================
// Items
//=========================================================================================

/// A curriculum entry inside a section.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Lecture(Lecture),
    Quiz(Quiz),
    Assignment(Assignment),
}

impl Item {
    pub fn id(&self) -> Uuid {
        match self {
            Item::Lecture(l) => l.id,
            Item::Quiz(q) => q.id,
            Item::Assignment(a) => a.id,
        }
    }

    pub fn seq_no(&self) -> u32 {
        match self {
            Item::Lecture(l) => l.seq_no,
            Item::Quiz(q) => q.seq_no,
            Item::Assignment(a) => a.seq_no,
        }
    }

    /// The label shown in the curriculum outline.
    pub fn display_name(&self) -> &str {
        match self {
            Item::Lecture(l) => &l.name,
            Item::Quiz(q) => &q.title,
            Item::Assignment(a) => &a.title,
        }
    }

    /// The discriminant as it appears in snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Lecture(_) => "lecture",
            Item::Quiz(_) => "quiz",
            Item::Assignment(_) => "assignment",
        }
    }
}

/// What a lecture delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Unset,
    Video,
    Article,
}

/// Where a lecture's content comes from. `Write` only applies to articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Upload,
    Link,
    Write,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lecture {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub content_kind: ContentKind,
    pub source_mode: SourceMode,
    /// Uploaded video or article files.
    pub media: Vec<MediaFile>,
    pub url: Option<String>,
    pub body: Option<String>,
    /// Supplementary downloads.
    pub resources: Vec<MediaFile>,
    pub published: bool,
    pub free_preview: bool,
    pub duration_secs: u32,
    pub seq_no: u32,
}

impl Lecture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn files(&self, slot: FileSlot) -> &Vec<MediaFile> {
        match slot {
            FileSlot::Media => &self.media,
            FileSlot::Resource => &self.resources,
        }
    }

    pub fn files_mut(&mut self, slot: FileSlot) -> &mut Vec<MediaFile> {
        match slot {
            FileSlot::Media => &mut self.media,
            FileSlot::Resource => &mut self.resources,
        }
    }

    /// The host resource type used for files in the given slot.
    pub fn media_kind(&self, slot: FileSlot) -> MediaKind {
        match (slot, self.content_kind) {
            (FileSlot::Media, ContentKind::Video) => MediaKind::Video,
            _ => MediaKind::Raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub questions: Vec<QuizQuestion>,
    pub seq_no: u32,
}

impl Quiz {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    /// Zero-based indices into `options`.
    pub correct_options: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub total_marks: u32,
    pub questions: Vec<AssignmentQuestion>,
    pub seq_no: u32,
}

impl Assignment {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssignmentQuestion {
    pub prompt: String,
    pub marks: u32,
    pub model_answer: Option<String>,
    pub max_words: Option<u32>,
}

//=========================================================================================
// Media files
//=========================================================================================

/// Which file list of a lecture a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSlot {
    Media,
    Resource,
}

/// The resource type the media host stores a file under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Raw,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Uploading,
    Uploaded,
    Failed,
}

/// A file attached to a lecture, from selection through upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaFile {
    pub id: Uuid,
    pub name: String,
    pub status: FileStatus,
    /// 0-100, only meaningful while `Uploading`.
    pub progress: u8,
    /// The selected bytes, held until the upload succeeds. Never serialized.
    pub local: Option<Bytes>,
    /// Permanent URL on the media host.
    pub remote_url: Option<String>,
    /// Any other URL known for the file (legacy records, previews).
    pub fallback_url: Option<String>,
    pub remote_id: Option<String>,
    pub duration_secs: Option<u32>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl MediaFile {
    /// A placeholder for a file that is about to be uploaded.
    pub fn pending(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: FileStatus::Uploading,
            progress: 0,
            local: Some(data),
            ..Default::default()
        }
    }

    /// An already hosted file.
    pub fn hosted(name: impl Into<String>, url: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: FileStatus::Uploaded,
            progress: 100,
            remote_url: Some(url.into()),
            remote_id: Some(remote_id.into()),
            ..Default::default()
        }
    }

    /// The URL a snapshot should carry for this file.
    pub fn canonical_url(&self) -> Option<&str> {
        self.remote_url.as_deref().or(self.fallback_url.as_deref())
    }
}
