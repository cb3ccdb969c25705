//! services/studio/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between an editor view and the studio.
//! Every connected view receives the same stream of draft events; views send
//! the signals other contexts need to hear about.

use curriculum_core::domain::CourseId;
use curriculum_core::snapshot::DraftSnapshot;
use curriculum_core::store::{DraftEvent, DraftSignal, Phase};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The view switched to another course.
    OpenCourse { course_id: String },

    /// The view discarded the current draft.
    ClearDraft,

    /// Asks for the current draft, e.g. after missing events.
    Refresh,
}

impl ClientMessage {
    /// The store signal this message stands for, if any.
    pub fn signal(&self) -> Option<DraftSignal> {
        match self {
            ClientMessage::OpenCourse { course_id } => {
                Some(DraftSignal::CourseChanged(CourseId::new(course_id.clone())))
            }
            ClientMessage::ClearDraft => Some(DraftSignal::Clear),
            ClientMessage::Refresh => None,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full current draft. Sent on connect and on `refresh`.
    Draft {
        course_id: Option<CourseId>,
        phase: Phase,
        dirty: bool,
        curriculum: DraftSnapshot,
    },

    /// A change published by the draft store.
    Event { event: DraftEvent },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}
