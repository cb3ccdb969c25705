//! services/studio/src/adapters/video_metadata.rs
//!
//! Best-effort duration lookup for lectures that link to an externally hosted
//! video. Only hosts whose oEmbed answer carries a duration can be looked up; every
//! other link reports no duration.

use super::{error_from_response, transport_error};
use async_trait::async_trait;
use curriculum_core::ports::{PortResult, VideoMetadataService};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const VIMEO_OEMBED_URL: &str = "https://vimeo.com/api/oembed.json";

/// Video hosts recognised from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoHost {
    YouTube { video_id: String },
    Vimeo { video_id: String },
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    duration: Option<u32>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OEmbedVideoMetadata {
    client: Client,
    youtube: Regex,
    vimeo: Regex,
}

impl OEmbedVideoMetadata {
    pub fn new(client: Client) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            youtube: Regex::new(
                r"^https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/)|youtu\.be/)([\w-]{11})",
            )?,
            vimeo: Regex::new(r"^https?://(?:www\.|player\.)?vimeo\.com/(?:video/)?(\d+)")?,
        })
    }

    pub fn detect_host(&self, url: &str) -> Option<VideoHost> {
        if let Some(captures) = self.youtube.captures(url) {
            return Some(VideoHost::YouTube {
                video_id: captures[1].to_string(),
            });
        }
        self.vimeo.captures(url).map(|captures| VideoHost::Vimeo {
            video_id: captures[1].to_string(),
        })
    }
}

#[async_trait]
impl VideoMetadataService for OEmbedVideoMetadata {
    async fn lookup_duration(&self, url: &str) -> PortResult<Option<u32>> {
        match self.detect_host(url) {
            Some(VideoHost::Vimeo { video_id }) => {
                debug!("Querying Vimeo oEmbed for video {}", video_id);
                let response = self
                    .client
                    .get(VIMEO_OEMBED_URL)
                    .query(&[("url", url)])
                    .send()
                    .await
                    .map_err(transport_error)?;
                if !response.status().is_success() {
                    return Err(error_from_response(response).await);
                }
                let body: OEmbedResponse = response.json().await.map_err(transport_error)?;
                Ok(body.duration)
            }
            // YouTube's oEmbed answer has no duration.
            Some(VideoHost::YouTube { .. }) | None => Ok(None),
        }
    }
}
