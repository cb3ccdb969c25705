//! services/studio/src/adapters/media_host.rs
//!
//! Adapter for an unsigned-upload media host (Cloudinary style). Files are posted
//! as multipart forms to `{upload_url}/{resource_type}/upload` with the configured
//! upload preset. The body is streamed in chunks so progress can be reported as
//! bytes leave the process.
//!
//! Deleting needs credentials the studio does not hold, so deletes go through an
//! optional endpoint of the course backend.

use super::{error_from_response, transport_error};
use async_trait::async_trait;
use bytes::Bytes;
use curriculum_core::domain::MediaKind;
use curriculum_core::ports::{
    HostedMedia, MediaHostService, MediaUpload, PortError, PortResult, ProgressFn,
};
use reqwest::{multipart, Body, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct HttpMediaHost {
    client: Client,
    upload_url: Url,
    upload_preset: String,
    delete_url: Option<Url>,
}

impl HttpMediaHost {
    pub fn new(
        client: Client,
        upload_url: Url,
        upload_preset: String,
        delete_url: Option<Url>,
    ) -> Self {
        Self {
            client,
            upload_url,
            upload_preset,
            delete_url,
        }
    }

    fn endpoint(&self, kind: MediaKind) -> PortResult<Url> {
        let mut url = self.upload_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected(format!("{} cannot be a base URL", self.upload_url)))?
            .pop_if_empty()
            .push(kind.as_str())
            .push("upload");
        Ok(url)
    }
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    duration: Option<f64>,
}

impl From<UploadResponse> for HostedMedia {
    fn from(response: UploadResponse) -> Self {
        Self {
            url: response.secure_url,
            remote_id: response.public_id,
            duration_secs: response
                .duration
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds.round() as u32),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    public_id: &'a str,
    resource_type: &'a str,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    deleted: Option<bool>,
}

impl DeleteResponse {
    fn removed(&self) -> bool {
        self.deleted.unwrap_or(false) || self.result.as_deref() == Some("ok")
    }
}

/// Splits `data` into chunks and reports the share sent after each one.
fn progress_stream(
    data: Bytes,
    progress: Option<ProgressFn>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let total = data.len();
        let mut sent = 0;
        while sent < total {
            let end = (sent + CHUNK_SIZE).min(total);
            let chunk = data.slice(sent..end);
            sent = end;
            yield Ok(chunk);
            if let Some(progress) = &progress {
                // 100 is reserved for the host's answer.
                progress(((sent * 99) / total) as u8);
            }
        }
    }
}

//=========================================================================================
// Port Implementation
//=========================================================================================

#[async_trait]
impl MediaHostService for HttpMediaHost {
    async fn upload(
        &self,
        upload: MediaUpload,
        progress: Option<ProgressFn>,
    ) -> PortResult<HostedMedia> {
        let url = self.endpoint(upload.kind)?;
        let length = upload.data.len() as u64;
        debug!("Uploading {} ({} bytes) to {}", upload.file_name, length, url);

        let body = Body::wrap_stream(progress_stream(upload.data, progress.clone()));
        let file = multipart::Part::stream_with_length(body, length).file_name(upload.file_name);
        let form = multipart::Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", file);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let hosted: UploadResponse = response.json().await.map_err(transport_error)?;
        if let Some(progress) = &progress {
            progress(100);
        }
        Ok(hosted.into())
    }

    async fn delete(&self, remote_id: &str, kind: MediaKind) -> PortResult<bool> {
        let Some(url) = &self.delete_url else {
            info!("No delete endpoint configured; keeping {}", remote_id);
            return Ok(false);
        };
        let response = self
            .client
            .post(url.clone())
            .json(&DeleteRequest {
                public_id: remote_id,
                resource_type: kind.as_str(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let text = response.text().await.map_err(transport_error)?;
        // An empty 2xx means the backend accepted the delete.
        Ok(serde_json::from_str::<DeleteResponse>(&text)
            .map(|body| body.removed())
            .unwrap_or(text.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    fn host(delete_url: Option<&str>) -> HttpMediaHost {
        HttpMediaHost::new(
            Client::new(),
            Url::parse("https://media.example.com/v1_1/demo").unwrap(),
            "unsigned".to_string(),
            delete_url.map(|u| Url::parse(u).unwrap()),
        )
    }

    #[test]
    fn endpoint_follows_resource_type() {
        let host = host(None);
        assert_eq!(
            host.endpoint(MediaKind::Video).unwrap().as_str(),
            "https://media.example.com/v1_1/demo/video/upload"
        );
        assert_eq!(
            host.endpoint(MediaKind::Raw).unwrap().as_str(),
            "https://media.example.com/v1_1/demo/raw/upload"
        );
    }

    #[test]
    fn upload_response_maps_duration() {
        let response: UploadResponse = serde_json::from_str(
            r#"{"secure_url":"https://cdn/x.mp4","public_id":"x","duration":61.6,"bytes":12}"#,
        )
        .unwrap();
        let hosted = HostedMedia::from(response);
        assert_eq!(hosted.url, "https://cdn/x.mp4");
        assert_eq!(hosted.remote_id, "x");
        assert_eq!(hosted.duration_secs, Some(62));
    }

    #[test]
    fn delete_response_variants() {
        let ok: DeleteResponse = serde_json::from_str(r#"{"result":"ok"}"#).unwrap();
        let missing: DeleteResponse = serde_json::from_str(r#"{"result":"not found"}"#).unwrap();
        let flag: DeleteResponse = serde_json::from_str(r#"{"deleted":true}"#).unwrap();
        assert!(ok.removed());
        assert!(!missing.removed());
        assert!(flag.removed());
    }

    #[tokio::test]
    async fn delete_without_endpoint_is_skipped() {
        assert_eq!(host(None).delete("x", MediaKind::Video).await, Ok(false));
    }

    #[tokio::test]
    async fn streamed_body_reports_rising_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress: ProgressFn = {
            let seen = seen.clone();
            Arc::new(move |p| seen.lock().unwrap().push(p))
        };
        let data = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]);

        let chunks: Vec<_> = progress_stream(data, Some(progress)).collect().await;

        assert_eq!(chunks.len(), 3);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 99);
    }
}
