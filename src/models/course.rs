use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{InstructorRef, MediaRef, SectionDraft};

/// The editor-produced desired tree for one course.
///
/// Every node carries an optional `id`. `None` means the node has never been
/// persisted; synchronization stamps the store-assigned id back into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    pub course_type: CourseType,
    #[serde(default)]
    pub status: CourseStatus,
    pub instructor: InstructorRef,
    #[serde(default)]
    pub thumbnail: Option<MediaRef>,
    #[serde(default)]
    pub preview_video: Option<MediaRef>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    /// Only meaningful for `CourseType::Live`.
    #[serde(default)]
    pub live: Option<LiveSchedule>,
    /// Only meaningful for `CourseType::Recorded`.
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    Recorded,
    Live,
}

impl CourseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseType::Recorded => "recorded",
            CourseType::Live => "live",
        }
    }

    pub fn has_curriculum(&self) -> bool {
        matches!(self, CourseType::Recorded)
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recorded" => Ok(CourseType::Recorded),
            "live" => Ok(CourseType::Live),
            other => Err(format!("unknown course type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CourseStatus::Draft),
            "published" => Ok(CourseStatus::Published),
            other => Err(format!("unknown course status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSchedule {
    /// RFC3339 start time.
    pub starts_at: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub meeting_url: Option<String>,
}
