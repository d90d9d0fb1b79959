use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskflow_shared::{TaskCreate, TaskDto, TaskPatch};

use crate::datetime::parse_api_timestamp;
use crate::error::{ApiError, SyncError};

pub const TITLE_REQUIRED: &str = "Title is required";

/// Server-assigned task identifier. Never minted client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn from_dto(dto: TaskDto) -> Result<Self, ApiError> {
        let created_at = parse_api_timestamp(&dto.created_at).map_err(|err| {
            ApiError::Decode(format!(
                "task {} has bad created_at {:?}: {err}",
                dto.id, dto.created_at
            ))
        })?;
        let updated_at = dto
            .updated_at
            .as_deref()
            .map(parse_api_timestamp)
            .transpose()
            .map_err(|err| ApiError::Decode(format!("task {} has bad updated_at: {err}", dto.id)))?;

        Ok(Self {
            id: TaskId(dto.id),
            title: dto.title,
            description: dto.description,
            completed: dto.completed,
            created_at,
            updated_at,
        })
    }

    /// Full-record body for an edit. Server-owned fields are not sent.
    pub fn to_update_patch(&self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            completed: Some(self.completed),
        }
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Trims and checks a title the way the task forms do.
pub fn validate_title(raw: &str) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Validation(TITLE_REQUIRED.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are sent as absent.
pub fn normalize_description(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

pub fn new_task_payload(title: &str, description: Option<&str>) -> Result<TaskCreate, SyncError> {
    Ok(TaskCreate {
        title: validate_title(title)?,
        description: normalize_description(description),
    })
}
