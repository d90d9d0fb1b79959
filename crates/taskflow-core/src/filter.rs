use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" | "open" | "pending" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(anyhow!(
                "unknown status filter: {other} (expected all, active or completed)"
            )),
        }
    }
}

/// Dashboard filter controls. Lives for one dashboard session only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub status: StatusFilter,
    pub search_query: String,
}

impl FilterState {
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        apply(tasks, self.status, &self.search_query)
    }
}

/// Derives the visible task list: status first, then a case-insensitive
/// substring match of `query` against the title. Relative order is kept and
/// the source slice is never touched.
pub fn apply(tasks: &[Task], status: StatusFilter, query: &str) -> Vec<Task> {
    let needle = query.to_lowercase();

    tasks
        .iter()
        .filter(|task| status.matches(task))
        .filter(|task| needle.is_empty() || task.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
