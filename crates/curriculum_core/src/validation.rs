//! crates/curriculum_core/src/validation.rs
//!
//! Checks a draft before it can be submitted. Errors are collected in scan
//! order: sections top to bottom, within a section its own fields first and
//! then its items in order, within an item its fields in the order below.
//! `ValidationResult::first_error` relies on that order.

use crate::domain::{
    Assignment, ContentKind, Draft, FileStatus, Item, Lecture, MediaFile, Quiz, Section,
    SourceMode,
};
use serde::Serialize;
use std::fmt;
use url::Url;

//=========================================================================================
// Result Types
//=========================================================================================

/// The field an error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "index", rename_all = "snake_case")]
pub enum Field {
    Name,
    Title,
    Description,
    Items,
    Body,
    Url,
    Files,
    /// A file in the lecture's media list.
    MediaFile(usize),
    /// A file in the lecture's resource list.
    ResourceFile(usize),
    Duration,
    TotalMarks,
    Questions,
    QuestionPrompt(usize),
    QuestionOptions(usize),
    CorrectOptions(usize),
    QuestionMarks(usize),
}

/// Where an error sits in the draft. Indices are zero-based; `item` is
/// `None` for errors on the section itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub section: usize,
    pub item: Option<usize>,
    pub field: Field,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(item) => write!(f, "section {} item {} {:?}", self.section + 1, item + 1, self.field),
            None => write!(f, "section {} {:?}", self.section + 1, self.field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub location: Location,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// The location the presentation layer should reveal first.
    pub fn first_error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(errors) => errors.first(),
        }
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(errors) => errors,
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

/// Validates every section and item of the draft.
pub fn validate(draft: &Draft) -> ValidationResult {
    let mut errors = Vec::new();
    for (index, section) in draft.sections.iter().enumerate() {
        validate_section(section, index, &mut errors);
    }

    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(errors)
    }
}

struct Collector<'a> {
    section: usize,
    item: Option<usize>,
    errors: &'a mut Vec<ValidationError>,
}

impl Collector<'_> {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(ValidationError {
            location: Location {
                section: self.section,
                item: self.item,
                field,
            },
            message: message.into(),
        });
    }

    fn require_text(&mut self, value: &str, field: Field, message: &str) {
        if is_blank(value) {
            self.push(field, message);
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_well_formed_url(value: &str) -> bool {
    Url::parse(value.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

fn validate_section(section: &Section, index: usize, errors: &mut Vec<ValidationError>) {
    let mut collector = Collector {
        section: index,
        item: None,
        errors,
    };
    collector.require_text(&section.name, Field::Name, "Section name is required");
    if section.items.is_empty() {
        collector.push(Field::Items, "Section must contain at least one item");
    }

    for (item_index, item) in section.items.iter().enumerate() {
        let mut collector = Collector {
            section: index,
            item: Some(item_index),
            errors: &mut *collector.errors,
        };
        match item {
            Item::Lecture(lecture) => validate_lecture(lecture, &mut collector),
            Item::Quiz(quiz) => validate_quiz(quiz, &mut collector),
            Item::Assignment(assignment) => validate_assignment(assignment, &mut collector),
        }
    }
}

fn validate_lecture(lecture: &Lecture, c: &mut Collector<'_>) {
    c.require_text(&lecture.name, Field::Name, "Lecture name is required");
    c.require_text(&lecture.description, Field::Description, "Lecture description is required");

    let url = lecture.url.as_deref().unwrap_or_default();
    match (lecture.content_kind, lecture.source_mode) {
        (ContentKind::Article, SourceMode::Write) => {
            c.require_text(
                lecture.body.as_deref().unwrap_or_default(),
                Field::Body,
                "Article text is required",
            );
        }
        (ContentKind::Article | ContentKind::Video, SourceMode::Link) => {
            if is_blank(url) {
                c.push(Field::Url, "A link is required");
            } else if !is_well_formed_url(url) {
                c.push(Field::Url, "The link is not a valid URL");
            }
        }
        (ContentKind::Article | ContentKind::Video, SourceMode::Upload) => {
            if lecture.media.is_empty() {
                c.push(Field::Files, "At least one file must be uploaded");
            }
        }
        (ContentKind::Video, SourceMode::Write) => {
            c.push(Field::Files, "Upload a video or link to one");
        }
        // No content type chosen yet, so there is no content to check.
        (ContentKind::Unset, _) => {}
    }

    check_file_statuses(&lecture.media, Field::MediaFile, c);
    check_file_statuses(&lecture.resources, Field::ResourceFile, c);
}

fn check_file_statuses(files: &[MediaFile], field: fn(usize) -> Field, c: &mut Collector<'_>) {
    for (index, file) in files.iter().enumerate() {
        match file.status {
            FileStatus::Failed => c.push(
                field(index),
                format!("Upload of '{}' failed; retry or remove it", file.name),
            ),
            FileStatus::Uploading => c.push(
                field(index),
                format!("'{}' is still uploading", file.name),
            ),
            FileStatus::Uploaded => {}
        }
    }
}

fn validate_quiz(quiz: &Quiz, c: &mut Collector<'_>) {
    c.require_text(&quiz.title, Field::Title, "Quiz title is required");
    c.require_text(&quiz.description, Field::Description, "Quiz description is required");
    if quiz.duration_minutes < 1 {
        c.push(Field::Duration, "Quiz duration must be at least 1 minute");
    }
    if quiz.questions.is_empty() {
        c.push(Field::Questions, "Quiz needs at least one question");
    }

    for (index, question) in quiz.questions.iter().enumerate() {
        c.require_text(&question.prompt, Field::QuestionPrompt(index), "Question text is required");

        let filled = question.options.iter().filter(|o| !is_blank(o)).count();
        if filled < 2 {
            c.push(
                Field::QuestionOptions(index),
                "Each question needs at least two non-empty options",
            );
        }

        if question.correct_options.is_empty() {
            c.push(Field::CorrectOptions(index), "Select at least one correct option");
        } else if question
            .correct_options
            .iter()
            .any(|&option| option >= question.options.len())
        {
            c.push(Field::CorrectOptions(index), "A correct option does not exist");
        }
    }
}

fn validate_assignment(assignment: &Assignment, c: &mut Collector<'_>) {
    c.require_text(&assignment.title, Field::Title, "Assignment title is required");
    c.require_text(
        &assignment.description,
        Field::Description,
        "Assignment description is required",
    );
    if assignment.duration_minutes < 1 {
        c.push(Field::Duration, "Assignment duration must be at least 1 minute");
    }
    if assignment.total_marks < 1 {
        c.push(Field::TotalMarks, "Total marks must be at least 1");
    }
    if assignment.questions.is_empty() {
        c.push(Field::Questions, "Assignment needs at least one question");
    }

    for (index, question) in assignment.questions.iter().enumerate() {
        c.require_text(&question.prompt, Field::QuestionPrompt(index), "Question text is required");
        if question.marks < 1 {
            c.push(Field::QuestionMarks(index), "Question marks must be at least 1");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssignmentQuestion, MediaFile, QuizQuestion};
    use crate::snapshot::{to_storable, ItemSnapshot};

    fn draft_with(items: Vec<Item>) -> Draft {
        let mut draft = Draft::default();
        draft.sections[0].items = items;
        draft.renumber_all();
        draft
    }

    fn intro_quiz() -> Quiz {
        let mut quiz = Quiz::new("Intro Quiz");
        quiz.description = "Warm up".to_string();
        quiz.duration_minutes = 10;
        quiz.questions.push(QuizQuestion {
            prompt: "2+2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_options: [1].into_iter().collect(),
        });
        quiz
    }

    fn complete_video_lecture() -> Lecture {
        let mut lecture = Lecture::new("Welcome");
        lecture.description = "Course overview".to_string();
        lecture.content_kind = ContentKind::Video;
        lecture.source_mode = SourceMode::Upload;
        lecture
            .media
            .push(MediaFile::hosted("intro.mp4", "https://cdn/intro.mp4", "intro"));
        lecture
    }

    fn locations(result: &ValidationResult) -> Vec<Location> {
        result.errors().iter().map(|e| e.location).collect()
    }

    #[test]
    fn new_quiz_lifecycle_is_valid_and_storable() {
        let draft = draft_with(vec![Item::Quiz(intro_quiz())]);
        assert_eq!(validate(&draft), ValidationResult::Valid);

        let snapshot = to_storable(&draft);
        let ItemSnapshot::Quiz(quiz) = &snapshot.sections[0].items[0] else {
            panic!("expected a quiz");
        };
        assert_eq!(quiz.quiz_title, "Intro Quiz");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].correct_option, vec![1]);
    }

    #[test]
    fn video_link_without_url_points_at_url_field() {
        let mut lecture = complete_video_lecture();
        lecture.source_mode = SourceMode::Link;
        lecture.media.clear();
        lecture.url = Some(String::new());
        let draft = draft_with(vec![Item::Quiz(intro_quiz()), Item::Lecture(lecture)]);

        let result = validate(&draft);
        assert!(!result.is_valid());
        assert_eq!(
            result.first_error().map(|e| e.location),
            Some(Location {
                section: 0,
                item: Some(1),
                field: Field::Url
            })
        );
    }

    #[test]
    fn written_video_lectures_are_rejected() {
        let mut lecture = complete_video_lecture();
        lecture.source_mode = SourceMode::Write;
        lecture.media.clear();
        lecture.body = Some("A transcript instead of a video".to_string());
        let draft = draft_with(vec![Item::Lecture(lecture)]);

        let result = validate(&draft);
        assert_eq!(
            locations(&result),
            vec![Location {
                section: 0,
                item: Some(0),
                field: Field::Files
            }]
        );
    }

    #[test]
    fn malformed_links_are_rejected() {
        let mut lecture = complete_video_lecture();
        lecture.content_kind = ContentKind::Article;
        lecture.source_mode = SourceMode::Link;
        lecture.url = Some("not a url".to_string());
        let result = validate(&draft_with(vec![Item::Lecture(lecture.clone())]));
        assert_eq!(result.errors()[0].message, "The link is not a valid URL");

        lecture.url = Some("ftp://files.example.com/a".to_string());
        assert!(!validate(&draft_with(vec![Item::Lecture(lecture.clone())])).is_valid());

        lecture.url = Some("https://example.com/article".to_string());
        assert!(validate(&draft_with(vec![Item::Lecture(lecture)])).is_valid());
    }

    #[test]
    fn failed_or_pending_uploads_block_submission() {
        let mut lecture = complete_video_lecture();
        let mut failed = MediaFile::hosted("b.mp4", "https://cdn/b.mp4", "b");
        failed.status = FileStatus::Failed;
        lecture.media.push(failed);
        let draft = draft_with(vec![Item::Lecture(lecture.clone())]);

        let result = validate(&draft);
        assert_eq!(
            locations(&result),
            vec![Location {
                section: 0,
                item: Some(0),
                field: Field::MediaFile(1)
            }]
        );

        lecture.media.truncate(1);
        lecture.resources.push(MediaFile::pending("notes.pdf", bytes::Bytes::new()));
        let result = validate(&draft_with(vec![Item::Lecture(lecture)]));
        assert_eq!(locations(&result)[0].field, Field::ResourceFile(0));
    }

    #[test]
    fn article_modes_require_their_content() {
        let mut lecture = complete_video_lecture();
        lecture.content_kind = ContentKind::Article;
        lecture.source_mode = SourceMode::Write;
        lecture.body = Some("   ".to_string());
        let result = validate(&draft_with(vec![Item::Lecture(lecture.clone())]));
        assert_eq!(locations(&result)[0].field, Field::Body);

        lecture.source_mode = SourceMode::Upload;
        lecture.media.clear();
        let result = validate(&draft_with(vec![Item::Lecture(lecture)]));
        assert_eq!(locations(&result)[0].field, Field::Files);
    }

    #[test]
    fn sections_need_a_name_and_items() {
        let mut draft = Draft::default();
        draft.sections[0].name = " ".to_string();
        let result = validate(&draft);
        assert_eq!(
            locations(&result),
            vec![
                Location { section: 0, item: None, field: Field::Name },
                Location { section: 0, item: None, field: Field::Items },
            ]
        );
    }

    #[test]
    fn quiz_question_rules() {
        let mut quiz = intro_quiz();
        quiz.duration_minutes = 0;
        quiz.questions.push(QuizQuestion {
            prompt: String::new(),
            options: vec!["only".to_string()],
            correct_options: Default::default(),
        });
        quiz.questions.push(QuizQuestion {
            prompt: "Pick".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_options: [2].into_iter().collect(),
        });
        let result = validate(&draft_with(vec![Item::Quiz(quiz)]));
        let fields: Vec<Field> = locations(&result).iter().map(|l| l.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Duration,
                Field::QuestionPrompt(1),
                Field::QuestionOptions(1),
                Field::CorrectOptions(1),
                Field::CorrectOptions(2),
            ]
        );
    }

    #[test]
    fn assignment_rules() {
        let mut assignment = Assignment::new("Essay");
        assignment.description = "Write".to_string();
        assignment.duration_minutes = 5;
        let result = validate(&draft_with(vec![Item::Assignment(assignment.clone())]));
        let fields: Vec<Field> = locations(&result).iter().map(|l| l.field).collect();
        assert_eq!(fields, vec![Field::TotalMarks, Field::Questions]);

        assignment.total_marks = 10;
        assignment.questions.push(AssignmentQuestion {
            prompt: "Why?".to_string(),
            marks: 0,
            model_answer: None,
            max_words: None,
        });
        let result = validate(&draft_with(vec![Item::Assignment(assignment)]));
        assert_eq!(locations(&result)[0].field, Field::QuestionMarks(0));
    }

    #[test]
    fn first_error_is_deterministic() {
        let mut lecture = complete_video_lecture();
        lecture.name.clear();
        lecture.description.clear();
        let mut draft = draft_with(vec![Item::Quiz(intro_quiz()), Item::Lecture(lecture)]);
        draft.sections.push(crate::domain::Section::new("", 2));

        let first = validate(&draft).first_error().cloned();
        for _ in 0..5 {
            assert_eq!(validate(&draft).first_error().cloned(), first);
        }
        assert_eq!(
            first.map(|e| e.location),
            Some(Location {
                section: 0,
                item: Some(1),
                field: Field::Name
            })
        );
    }

    #[test]
    fn link_duration_is_not_required() {
        let mut lecture = complete_video_lecture();
        lecture.source_mode = SourceMode::Link;
        lecture.media.clear();
        lecture.url = Some("https://vimeo.com/76979871".to_string());
        lecture.duration_secs = 0;
        assert!(validate(&draft_with(vec![Item::Lecture(lecture)])).is_valid());
    }
}
