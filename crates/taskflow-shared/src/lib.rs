use serde::{
  Deserialize,
  Serialize
};

/// Task record as the todo API
/// returns it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDto {
  pub id:          i64,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub completed:   bool,
  pub created_at:  String,
  #[serde(default)]
  pub updated_at:  Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskCreate {
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>
}

/// Body of `PUT /api/todos/{id}`.
///
/// Unset fields are left untouched by
/// the server. `description:
/// Some(None)` clears it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>
}

impl TaskPatch {
  pub fn completed(
    completed: bool
  ) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct UserProfile {
  pub email:      String,
  #[serde(default)]
  pub name:       Option<String>,
  #[serde(default)]
  pub id:         Option<i64>,
  #[serde(default)]
  pub created_at: Option<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SignupRequest {
  pub email:    String,
  pub password: String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub name:     Option<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginForm {
  pub username: String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct AccessToken {
  pub access_token: String,
  #[serde(default)]
  pub token_type:   String
}

/// Error body the API sends on any
/// non-success status.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ErrorDetail {
  pub detail: serde_json::Value
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toggle_patch_only_carries_completed()
  {
    let body = serde_json::to_value(
      TaskPatch::completed(true)
    )
    .expect("serialize patch");
    assert_eq!(
      body,
      serde_json::json!({ "completed": true })
    );
  }

  #[test]
  fn cleared_description_serializes_as_null()
  {
    let patch = TaskPatch {
      title:       Some(
        "Ship".to_string()
      ),
      description: Some(None),
      completed:   Some(false)
    };
    let body = serde_json::to_value(
      &patch
    )
    .expect("serialize patch");
    assert_eq!(
      body,
      serde_json::json!({
        "title": "Ship",
        "description": null,
        "completed": false
      })
    );
  }

  #[test]
  fn task_dto_accepts_missing_optional_fields()
  {
    let dto: TaskDto =
      serde_json::from_str(
        r#"{"id":7,"title":"A","created_at":"2025-01-02T03:04:05"}"#
      )
      .expect("decode task");
    assert_eq!(dto.id, 7);
    assert_eq!(dto.description, None);
    assert!(!dto.completed);
    assert_eq!(dto.updated_at, None);
  }
}
