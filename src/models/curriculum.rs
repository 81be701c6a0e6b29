use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::MediaRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video: Option<MediaRef>,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub resources: Vec<ResourceDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub file: MediaRef,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Pdf,
    Document,
    Slides,
    Archive,
    Image,
    Audio,
    Other,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pdf => "pdf",
            ResourceKind::Document => "document",
            ResourceKind::Slides => "slides",
            ResourceKind::Archive => "archive",
            ResourceKind::Image => "image",
            ResourceKind::Audio => "audio",
            ResourceKind::Other => "other",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(ResourceKind::Pdf),
            "document" => Ok(ResourceKind::Document),
            "slides" => Ok(ResourceKind::Slides),
            "archive" => Ok(ResourceKind::Archive),
            "image" => Ok(ResourceKind::Image),
            "audio" => Ok(ResourceKind::Audio),
            "other" => Ok(ResourceKind::Other),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}
