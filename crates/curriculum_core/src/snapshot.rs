//! crates/curriculum_core/src/snapshot.rs
//!
//! The storable form of a draft. A `DraftSnapshot` is what gets written to the
//! local cache and embedded in the course record sent to the remote API.
//!
//! `to_storable` drops transient data (selected file bytes, upload progress),
//! keeps only the fields relevant to each item variant and recomputes every
//! sequence number from position. Reading a snapshot back is lenient: legacy
//! items without a `type` are lectures, and items that cannot be interpreted
//! are skipped instead of failing the whole curriculum.

use crate::domain::{
    Assignment, AssignmentQuestion, ContentKind, CourseId, Draft, FileStatus, Item, Lecture,
    MediaFile, Quiz, QuizQuestion, Section, SourceMode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// Snapshot Structs
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct DraftSnapshot {
    pub sections: Vec<SectionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "isPublished")]
    pub published: bool,
    #[serde(default, deserialize_with = "lenient_count")]
    pub seq_no: u32,
    #[serde(default)]
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemSnapshot {
    Lecture(LectureSnapshot),
    Quiz(QuizSnapshot),
    Assignment(AssignmentSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_unset")]
    pub content_type: ContentKind,
    #[serde(default)]
    pub source_mode: SourceMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<FileSnapshot>,
    #[serde(default, rename = "isPublished")]
    pub published: bool,
    #[serde(default, rename = "isFreePreview")]
    pub free_preview: bool,
    #[serde(default, deserialize_with = "lenient_count")]
    pub duration: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub seq_no: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quiz_title: String,
    #[serde(default)]
    pub quiz_description: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quiz_duration: u32,
    #[serde(default)]
    pub questions: Vec<QuizQuestionSnapshot>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub seq_no: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionSnapshot {
    #[serde(default, alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_option: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignment_title: String,
    #[serde(default)]
    pub assignment_description: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub assignment_duration: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_marks: u32,
    #[serde(default)]
    pub questions: Vec<AssignmentQuestionSnapshot>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub seq_no: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuestionSnapshot {
    #[serde(default, alias = "question")]
    pub prompt: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub marks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_words: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "secureUrl")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "publicId")]
    pub remote_id: Option<String>,
    #[serde(default = "hosted_status")]
    pub status: FileStatus,
    #[serde(
        default,
        deserialize_with = "lenient_optional_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

fn is_unset(kind: &ContentKind) -> bool {
    *kind == ContentKind::Unset
}

/// Reads a count from an integer, a float (rounded) or a numeric string.
/// Anything else reads as absent.
fn count_from_value(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number >= 0.0).then(|| number.round().min(u32::MAX as f64) as u32)
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(count_from_value(&Value::deserialize(deserializer)?).unwrap_or(0))
}

fn lenient_optional_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u32>, D::Error> {
    Ok(count_from_value(&Value::deserialize(deserializer)?))
}

// Files stored before statuses existed were always hosted.
fn hosted_status() -> FileStatus {
    FileStatus::Uploaded
}

//=========================================================================================
// Course Record
//=========================================================================================

/// The full course document exchanged with the remote API.
///
/// Only the fields this crate reads or writes are typed; everything else the
/// API returns is kept in `extra` and sent back untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curriculum: Option<DraftSnapshot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CourseRecord {
    pub fn course_id(&self) -> CourseId {
        CourseId::new(self.id.clone())
    }
}

//=========================================================================================
// Draft -> Snapshot
//=========================================================================================

/// Produces the storable form of a draft. Never fails.
pub fn to_storable(draft: &Draft) -> DraftSnapshot {
    let sections = draft
        .sections
        .iter()
        .enumerate()
        .map(|(index, section)| section_to_storable(section, index))
        .collect();
    DraftSnapshot { sections }
}

fn position(index: usize) -> u32 {
    index as u32 + 1
}

fn section_to_storable(section: &Section, index: usize) -> SectionSnapshot {
    SectionSnapshot {
        id: section.id,
        name: section.name.clone(),
        published: section.published,
        seq_no: position(index),
        items: section
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| item_to_storable(item, position(i)))
            .collect(),
    }
}

fn item_to_storable(item: &Item, seq_no: u32) -> ItemSnapshot {
    match item {
        Item::Lecture(lecture) => ItemSnapshot::Lecture(lecture_to_storable(lecture, seq_no)),
        Item::Quiz(quiz) => ItemSnapshot::Quiz(QuizSnapshot {
            id: quiz.id,
            name: quiz.title.clone(),
            quiz_title: quiz.title.clone(),
            quiz_description: quiz.description.clone(),
            quiz_duration: quiz.duration_minutes,
            questions: quiz
                .questions
                .iter()
                .map(|q| QuizQuestionSnapshot {
                    prompt: q.prompt.clone(),
                    options: q.options.clone(),
                    correct_option: q.correct_options.iter().copied().collect(),
                })
                .collect(),
            seq_no,
        }),
        Item::Assignment(assignment) => ItemSnapshot::Assignment(AssignmentSnapshot {
            id: assignment.id,
            name: assignment.title.clone(),
            assignment_title: assignment.title.clone(),
            assignment_description: assignment.description.clone(),
            assignment_duration: assignment.duration_minutes,
            total_marks: assignment.total_marks,
            questions: assignment
                .questions
                .iter()
                .map(|q| AssignmentQuestionSnapshot {
                    prompt: q.prompt.clone(),
                    marks: q.marks,
                    answer: q.model_answer.clone(),
                    max_words: q.max_words,
                })
                .collect(),
            seq_no,
        }),
    }
}

fn lecture_to_storable(lecture: &Lecture, seq_no: u32) -> LectureSnapshot {
    // Content fields only survive for the content kind they belong to.
    let (files, url, body) = match lecture.content_kind {
        ContentKind::Unset => (Vec::new(), None, None),
        ContentKind::Video => (files_to_storable(&lecture.media), lecture.url.clone(), None),
        ContentKind::Article => (
            files_to_storable(&lecture.media),
            lecture.url.clone(),
            lecture.body.clone(),
        ),
    };

    LectureSnapshot {
        id: lecture.id,
        name: lecture.name.clone(),
        description: lecture.description.clone(),
        content_type: lecture.content_kind,
        source_mode: lecture.source_mode,
        files,
        url,
        body,
        resources: files_to_storable(&lecture.resources),
        published: lecture.published,
        free_preview: lecture.free_preview,
        duration: lecture.duration_secs,
        seq_no,
    }
}

fn files_to_storable(files: &[MediaFile]) -> Vec<FileSnapshot> {
    files
        .iter()
        .map(|file| FileSnapshot {
            id: file.id,
            name: file.name.clone(),
            url: file.canonical_url().map(str::to_string),
            remote_id: file.remote_id.clone(),
            status: file.status,
            duration: file.duration_secs,
            uploaded_at: file.uploaded_at,
        })
        .collect()
}

//=========================================================================================
// Snapshot -> Draft
//=========================================================================================

/// Rebuilds an editable draft from a snapshot.
pub fn from_storable(snapshot: &DraftSnapshot) -> Draft {
    let mut draft = Draft {
        sections: snapshot
            .sections
            .iter()
            .map(|section| Section {
                id: section.id,
                name: section.name.clone(),
                published: section.published,
                seq_no: section.seq_no,
                items: section.items.iter().map(item_from_storable).collect(),
            })
            .collect(),
    };
    draft.renumber_all();
    draft
}

/// Rebuilds a single item, e.g. one added through an outer interface.
pub fn item_from_storable(item: &ItemSnapshot) -> Item {
    match item {
        ItemSnapshot::Lecture(l) => Item::Lecture(Lecture {
            id: l.id,
            name: l.name.clone(),
            description: l.description.clone(),
            content_kind: l.content_type,
            source_mode: l.source_mode,
            media: files_from_storable(&l.files),
            url: l.url.clone(),
            body: l.body.clone(),
            resources: files_from_storable(&l.resources),
            published: l.published,
            free_preview: l.free_preview,
            duration_secs: l.duration,
            seq_no: l.seq_no,
        }),
        ItemSnapshot::Quiz(q) => Item::Quiz(Quiz {
            id: q.id,
            title: title_or_name(&q.quiz_title, &q.name),
            description: q.quiz_description.clone(),
            duration_minutes: q.quiz_duration,
            questions: q
                .questions
                .iter()
                .map(|question| QuizQuestion {
                    prompt: question.prompt.clone(),
                    options: question.options.clone(),
                    correct_options: question.correct_option.iter().copied().collect(),
                })
                .collect(),
            seq_no: q.seq_no,
        }),
        ItemSnapshot::Assignment(a) => Item::Assignment(Assignment {
            id: a.id,
            title: title_or_name(&a.assignment_title, &a.name),
            description: a.assignment_description.clone(),
            duration_minutes: a.assignment_duration,
            total_marks: a.total_marks,
            questions: a
                .questions
                .iter()
                .map(|question| AssignmentQuestion {
                    prompt: question.prompt.clone(),
                    marks: question.marks,
                    model_answer: question.answer.clone(),
                    max_words: question.max_words,
                })
                .collect(),
            seq_no: a.seq_no,
        }),
    }
}

fn title_or_name(title: &str, name: &str) -> String {
    if title.is_empty() {
        name.to_string()
    } else {
        title.to_string()
    }
}

fn files_from_storable(files: &[FileSnapshot]) -> Vec<MediaFile> {
    files
        .iter()
        .map(|file| MediaFile {
            id: file.id,
            name: file.name.clone(),
            status: file.status,
            progress: if file.status == FileStatus::Uploaded { 100 } else { 0 },
            local: None,
            remote_url: file.url.clone(),
            fallback_url: None,
            remote_id: file.remote_id.clone(),
            duration_secs: file.duration,
            uploaded_at: file.uploaded_at,
        })
        .collect()
}

//=========================================================================================
// Lenient Parsing
//=========================================================================================

impl From<Value> for DraftSnapshot {
    /// Accepts `{ "sections": [...] }` or a bare array of sections.
    fn from(value: Value) -> Self {
        let sections = match value {
            Value::Object(mut map) => map.remove("sections").unwrap_or(Value::Null),
            other => other,
        };
        let Value::Array(sections) = sections else {
            return DraftSnapshot::default();
        };

        DraftSnapshot {
            sections: sections.into_iter().filter_map(parse_section).collect(),
        }
    }
}

fn parse_section(value: Value) -> Option<SectionSnapshot> {
    let Value::Object(mut map) = value else {
        warn!("Skipping a curriculum section that is not an object.");
        return None;
    };
    let items = match map.remove("items") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let mut section: SectionSnapshot = match serde_json::from_value(Value::Object(map)) {
        Ok(section) => section,
        Err(e) => {
            warn!("Skipping an unreadable curriculum section: {}", e);
            return None;
        }
    };
    section.items = items.into_iter().filter_map(parse_item).collect();
    Some(section)
}

fn parse_item(value: Value) -> Option<ItemSnapshot> {
    let Value::Object(mut map) = value else {
        warn!("Skipping a curriculum item that is not an object.");
        return None;
    };
    map.entry("type")
        .or_insert_with(|| Value::String("lecture".to_string()));

    match serde_json::from_value(Value::Object(map)) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!("Skipping an unreadable curriculum item: {}", e);
            None
        }
    }
}
