//! The "my issues" list: issues assigned
//! to the current user, grouped and
//! annotated with how close they are to
//! their due date.

use std::collections::HashMap;

use almanac_shared::{
  Issue,
  IssuePatch
};
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use uuid::Uuid;

use crate::datetime::{
  days_until,
  parse_issue_day
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
  #[default]
  None,
  State,
  Priority
}

impl GroupBy {
  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "none" | "" => Some(Self::None),
      | "state" => Some(Self::State),
      | "priority" => {
        Some(Self::Priority)
      }
      | _ => None
    }
  }
}

/// Columns the list shows next to each
/// issue name.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct DisplayProperties {
  pub key:        bool,
  pub state:      bool,
  pub priority:   bool,
  pub start_date: bool,
  pub due_date:   bool,
  pub assignee:   bool
}

impl Default for DisplayProperties {
  fn default() -> Self {
    Self {
      key:        true,
      state:      true,
      priority:   true,
      start_date: false,
      due_date:   true,
      assignee:   true
    }
  }
}

impl DisplayProperties {
  pub fn set(
    &mut self,
    name: &str,
    enabled: bool
  ) -> anyhow::Result<()> {
    let slot = match name {
      | "key" => &mut self.key,
      | "state" => &mut self.state,
      | "priority" => &mut self.priority,
      | "start_date" => {
        &mut self.start_date
      }
      | "due_date" => &mut self.due_date,
      | "assignee" => &mut self.assignee,
      | other => {
        return Err(anyhow!(
          "unknown issue property: \
           {other}"
        ));
      }
    };
    *slot = enabled;
    Ok(())
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DueStatus {
  Unscheduled,
  Overdue { days: i64 },
  DueSoon { days: i64 },
  Scheduled { days: i64 }
}

impl DueStatus {
  pub fn describe(&self) -> String {
    match self {
      | Self::Unscheduled => {
        "N/A".to_string()
      }
      | Self::Overdue { days } => {
        format!(
          "Due date has passed by {days} \
           days"
        )
      }
      | Self::DueSoon { days: 0 } => {
        "Due today".to_string()
      }
      | Self::DueSoon { days } => {
        format!("Due date is in {days} days")
      }
      | Self::Scheduled { .. } => {
        "Due date".to_string()
      }
    }
  }
}

pub fn due_status(
  target_date: Option<&str>,
  today: NaiveDate,
  soon_days: i64
) -> DueStatus {
  let Some(day) =
    target_date.and_then(parse_issue_day)
  else {
    return DueStatus::Unscheduled;
  };

  let days = days_until(today, day);
  if days < 0 {
    DueStatus::Overdue { days: -days }
  } else if days <= soon_days {
    DueStatus::DueSoon { days }
  } else {
    DueStatus::Scheduled { days }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueGroup<'a> {
  pub label:  String,
  pub issues: Vec<&'a Issue>
}

fn group_label(
  issue: &Issue,
  group_by: GroupBy
) -> String {
  match group_by {
    | GroupBy::None => "All".to_string(),
    | GroupBy::State => {
      issue.state_detail.name.clone()
    }
    | GroupBy::Priority => issue
      .priority
      .map(|p| p.as_key().to_string())
      .unwrap_or_else(|| {
        "None".to_string()
      })
  }
}

/// Groups appear in the order their first
/// issue does; issues keep source order.
pub fn group_issues(
  issues: &[Issue],
  group_by: GroupBy
) -> Vec<IssueGroup<'_>> {
  let mut groups: Vec<IssueGroup<'_>> =
    Vec::new();
  let mut index: HashMap<String, usize> =
    HashMap::new();

  for issue in issues {
    let label =
      group_label(issue, group_by);
    let slot = match index.get(&label) {
      | Some(&slot) => slot,
      | None => {
        index.insert(
          label.clone(),
          groups.len()
        );
        groups.push(IssueGroup {
          label,
          issues: Vec::new()
        });
        groups.len() - 1
      }
    };
    groups[slot].issues.push(issue);
  }

  groups
}

/// Persistence request produced by an
/// optimistic update.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
  pub project:  Uuid,
  pub issue_id: Uuid,
  pub patch:    IssuePatch
}

#[derive(Debug, Clone, Default)]
pub struct MyIssuesBoard {
  issues:   Vec<Issue>,
  revision: u64
}

impl MyIssuesBoard {
  pub fn new(issues: Vec<Issue>) -> Self {
    Self {
      issues,
      revision: 0
    }
  }

  pub fn issues(&self) -> &[Issue] {
    &self.issues
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// Merge `patch` into the local copy
  /// and hand back what has to be sent.
  #[tracing::instrument(skip(self, patch))]
  pub fn update_issue(
    &mut self,
    issue_id: Uuid,
    patch: IssuePatch
  ) -> Option<PatchRequest> {
    if patch.is_empty() {
      return None;
    }

    let Some(issue) = self
      .issues
      .iter_mut()
      .find(|issue| issue.id == issue_id)
    else {
      tracing::warn!(
        issue = %issue_id,
        "update for unknown issue; \
         ignoring"
      );
      return None;
    };

    if let Some(name) = &patch.name {
      issue.name = name.clone();
    }
    if let Some(state) = patch.state {
      issue.state = Some(state);
    }
    if let Some(detail) =
      &patch.state_detail
    {
      let current =
        &mut issue.state_detail;
      if detail.id.is_some() {
        current.id = detail.id;
      }
      if !detail.name.is_empty() {
        current.name =
          detail.name.clone();
      }
      if !detail.color.is_empty() {
        current.color =
          detail.color.clone();
      }
      current.group = detail.group;
    }
    if let Some(priority) = patch.priority
    {
      issue.priority = priority;
    }
    if let Some(target) =
      &patch.target_date
    {
      issue.target_date = target.clone();
    }
    self.revision += 1;

    Some(PatchRequest {
      project: issue.project,
      issue_id,
      patch
    })
  }
}
