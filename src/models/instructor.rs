use serde::{Deserialize, Serialize};

use crate::models::MediaRef;

/// How a course names its instructor: an already persisted row, or a new one
/// created inline by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructorRef {
    Existing { id: String },
    New(NewInstructor),
}

impl InstructorRef {
    pub fn existing(id: impl Into<String>) -> Self {
        InstructorRef::Existing { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstructor {
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub photo: Option<MediaRef>,
}
