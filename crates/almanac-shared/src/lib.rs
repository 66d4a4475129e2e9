use serde::{
  Deserialize,
  Serialize
};
use uuid::Uuid;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum StateGroup {
  Backlog,
  Unstarted,
  Started,
  Completed,
  Cancelled,
  #[serde(other)]
  Unknown
}

impl StateGroup {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Backlog => "backlog",
      | Self::Unstarted => "unstarted",
      | Self::Started => "started",
      | Self::Completed => "completed",
      | Self::Cancelled => "cancelled",
      | Self::Unknown => "unknown"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Urgent,
  High,
  Medium,
  Low
}

impl Priority {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Urgent => "urgent",
      | Self::High => "high",
      | Self::Medium => "medium",
      | Self::Low => "low"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "urgent" => Some(Self::Urgent),
      | "high" => Some(Self::High),
      | "medium" => Some(Self::Medium),
      | "low" => Some(Self::Low),
      | _ => None
    }
  }
}

/// Status indicator attached to every
/// issue by the server.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct StateDetail {
  #[serde(default)]
  pub id:    Option<Uuid>,
  pub name:  String,
  #[serde(default)]
  pub color: String,
  pub group: StateGroup
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProjectDetail {
  pub id:         Uuid,
  #[serde(default)]
  pub name:       String,
  #[serde(default)]
  pub identifier: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Issue {
  pub id:             Uuid,
  pub name:           String,
  #[serde(default)]
  pub sequence_id:    Option<u64>,
  pub project:        Uuid,
  #[serde(default)]
  pub project_detail: Option<ProjectDetail>,
  #[serde(default)]
  pub state:          Option<Uuid>,
  pub state_detail:   StateDetail,
  #[serde(
    default,
    deserialize_with = "lenient_priority"
  )]
  pub priority:       Option<Priority>,
  #[serde(default)]
  pub start_date:     Option<String>,
  #[serde(default)]
  pub target_date:    Option<String>,
  #[serde(default)]
  pub assignees:      Vec<Uuid>
}

/// The server sends `"none"` for issues
/// without a priority and may grow new
/// levels; neither should fail a fetch.
fn lenient_priority<'de, D>(
  deserializer: D
) -> Result<Option<Priority>, D::Error>
where
  D: serde::Deserializer<'de>
{
  let raw =
    Option::<String>::deserialize(
      deserializer
    )?;
  Ok(
    raw
      .as_deref()
      .and_then(Priority::from_key)
  )
}

impl Issue {
  /// Short human key such as `WEB-42`,
  /// when the project detail is known.
  pub fn display_key(
    &self
  ) -> Option<String> {
    let detail =
      self.project_detail.as_ref()?;
    let sequence = self.sequence_id?;
    if detail.identifier.is_empty() {
      return None;
    }
    Some(format!(
      "{}-{}",
      detail.identifier, sequence
    ))
  }
}

/// Partial update sent with `PATCH`.
/// Unset fields are omitted from the
/// body; `Some(None)` clears a value.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
pub struct IssuePatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub name:         Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub state:        Option<Uuid>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub state_detail: Option<StateDetail>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:
    Option<Option<Priority>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub target_date:
    Option<Option<String>>
}

impl IssuePatch {
  pub fn target_date(
    date: impl Into<String>
  ) -> Self {
    Self {
      target_date: Some(Some(
        date.into()
      )),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.state.is_none()
      && self.state_detail.is_none()
      && self.priority.is_none()
      && self.target_date.is_none()
  }
}

/// Body for creating an issue preset to
/// a calendar day.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct IssueDraft {
  pub name:        String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub target_date: Option<String>
}

/// Which slice of a project the
/// calendar is looking at.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(
  tag = "kind",
  content = "id",
  rename_all = "lowercase"
)]
pub enum IssueScope {
  #[default]
  Project,
  Cycle(Uuid),
  Module(Uuid)
}
