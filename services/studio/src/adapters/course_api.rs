//! services/studio/src/adapters/course_api.rs
//!
//! This module contains the adapter for the remote course REST API, the concrete
//! implementation of the `CourseApiService` port. Records are exchanged as JSON;
//! fields this crate does not model travel in `CourseRecord::extra` untouched.

use super::{error_from_response, transport_error};
use async_trait::async_trait;
use curriculum_core::domain::CourseId;
use curriculum_core::ports::{CourseApiService, PortError, PortResult};
use curriculum_core::snapshot::CourseRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the `CourseApiService` port.
#[derive(Clone)]
pub struct HttpCourseApi {
    client: Client,
    base_url: Url,
}

impl HttpCourseApi {
    /// Creates a new `HttpCourseApi` rooted at `base_url`.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn course_url(&self, course_id: Option<&CourseId>) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PortError::Unexpected(format!("{} cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty().push("courses");
            if let Some(course_id) = course_id {
                segments.push(course_id.as_str());
            }
        }
        Ok(url)
    }
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Serialize)]
struct CreateCourseRequest<'a> {
    title: &'a str,
}

#[derive(Deserialize)]
struct UpdateCourseResponse {
    #[serde(default)]
    message: Option<String>,
}

/// The API answers either with the record itself or with `{ "course": record }`.
fn unwrap_course(value: Value) -> PortResult<CourseRecord> {
    let record = match value {
        Value::Object(mut object) if object.contains_key("course") => {
            object.remove("course").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(record)
        .map_err(|e| PortError::Unexpected(format!("Malformed course record: {}", e)))
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl CourseApiService for HttpCourseApi {
    async fn get_course_by_id(&self, course_id: &CourseId) -> PortResult<CourseRecord> {
        let url = self.course_url(Some(course_id))?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: Value = response.json().await.map_err(transport_error)?;
        unwrap_course(body)
    }

    async fn update_course(&self, record: &CourseRecord) -> PortResult<String> {
        let url = self.course_url(Some(&record.course_id()))?;
        debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        // Some deployments answer 204 with no body.
        let text = response.text().await.map_err(transport_error)?;
        let message = serde_json::from_str::<UpdateCourseResponse>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "Course updated".to_string());
        Ok(message)
    }

    async fn create_course(&self, title: &str) -> PortResult<CourseRecord> {
        let url = self.course_url(None)?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(&CreateCourseRequest { title })
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: Value = response.json().await.map_err(transport_error)?;
        unwrap_course(body)
    }
}
