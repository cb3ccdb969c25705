//! In-memory collaborators shared by the store and upload tests.

use crate::domain::{CourseId, Quiz, QuizQuestion};
use crate::ports::{CourseApiService, LocalCacheService, PortError, PortResult};
use crate::snapshot::CourseRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

pub fn course(id: &str) -> CourseRecord {
    let mut record = CourseRecord {
        id: id.to_string(),
        title: format!("Course {id}"),
        ..CourseRecord::default()
    };
    record.extra.insert("price".to_string(), serde_json::json!(25));
    record
}

pub fn valid_quiz() -> Quiz {
    Quiz {
        description: "Checks the basics".to_string(),
        duration_minutes: 10,
        questions: vec![QuizQuestion {
            prompt: "2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_options: [1].into_iter().collect(),
        }],
        ..Quiz::new("Warm-up")
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl LocalCacheService for InMemoryCache {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A course API backed by a map, able to hold an update until released.
#[derive(Default)]
pub struct FakeCourseApi {
    courses: Mutex<HashMap<String, CourseRecord>>,
    updates: Mutex<Vec<CourseRecord>>,
    fetches: AtomicUsize,
    fail_updates: AtomicBool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    started: Notify,
}

impl FakeCourseApi {
    pub fn with_courses(records: impl IntoIterator<Item = CourseRecord>) -> Self {
        let api = Self::default();
        {
            let mut courses = api.courses.lock().unwrap();
            for record in records {
                courses.insert(record.id.clone(), record);
            }
        }
        api
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<CourseRecord> {
        self.updates.lock().unwrap().last().cloned()
    }

    /// Blocks the next `update_course` call until the returned sender fires.
    pub fn hold_next_update(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Resolves once an `update_course` call has started.
    pub async fn update_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl CourseApiService for FakeCourseApi {
    async fn get_course_by_id(&self, course_id: &CourseId) -> PortResult<CourseRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.courses
            .lock()
            .unwrap()
            .get(course_id.as_str())
            .cloned()
            .ok_or_else(|| PortError::NotFound(course_id.to_string()))
    }

    async fn update_course(&self, record: &CourseRecord) -> PortResult<String> {
        self.started.notify_one();
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.updates.lock().unwrap().push(record.clone());
        self.courses
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok("Course updated successfully".to_string())
    }

    async fn create_course(&self, title: &str) -> PortResult<CourseRecord> {
        let id = format!("course-{}", self.courses.lock().unwrap().len() + 1);
        let record = CourseRecord {
            title: title.to_string(),
            ..course(&id)
        };
        self.courses.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }
}
