//! Placing issues onto calendar days and
//! moving them between days.

use std::collections::HashMap;

use almanac_shared::{
  Issue,
  IssueDraft,
  IssuePatch
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::datetime::{
  is_weekend,
  parse_issue_day,
  render_date_format
};
use crate::range::VisibleRange;

/// Issues shown per day before the
/// "N more" control takes over.
pub const COLLAPSED_ISSUE_LIMIT: usize =
  4;

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket<'a> {
  pub date:   NaiveDate,
  pub issues: Vec<&'a Issue>
}

pub fn issue_target_day(
  issue: &Issue
) -> Option<NaiveDate> {
  issue
    .target_date
    .as_deref()
    .and_then(parse_issue_day)
}

/// One bucket per rendered day of
/// `range`, each holding the issues whose
/// target day matches, in source order.
#[tracing::instrument(skip(issues), fields(issue_count = issues.len()))]
pub fn bucket_issues<'a>(
  issues: &'a [Issue],
  range: VisibleRange,
  show_weekends: bool
) -> Vec<DayBucket<'a>> {
  let mut buckets = range
    .days()
    .filter(|day| {
      show_weekends || !is_weekend(*day)
    })
    .map(|date| DayBucket {
      date,
      issues: Vec::new()
    })
    .collect::<Vec<_>>();

  let index = buckets
    .iter()
    .enumerate()
    .map(|(idx, bucket)| {
      (bucket.date, idx)
    })
    .collect::<HashMap<_, _>>();

  let mut placed = 0_usize;
  for issue in issues {
    let Some(day) =
      issue_target_day(issue)
    else {
      continue;
    };
    if let Some(&idx) = index.get(&day)
    {
      buckets[idx].issues.push(issue);
      placed += 1;
    }
  }

  tracing::debug!(
    days = buckets.len(),
    placed,
    "issues bucketed"
  );
  buckets
}

pub fn visible_issues<'b, 'a>(
  bucket: &'b DayBucket<'a>,
  show_all: bool
) -> &'b [&'a Issue] {
  if show_all {
    &bucket.issues
  } else {
    let limit = bucket
      .issues
      .len()
      .min(COLLAPSED_ISSUE_LIMIT);
    &bucket.issues[..limit]
  }
}

pub fn overflow_count(
  bucket: &DayBucket<'_>
) -> usize {
  bucket
    .issues
    .len()
    .saturating_sub(COLLAPSED_ISSUE_LIMIT)
}

/// "Show more" state. A single flag
/// shared by every day of the view.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum OverflowToggle {
  #[default]
  Collapsed,
  Expanded
}

impl OverflowToggle {
  #[must_use]
  pub fn toggled(self) -> Self {
    match self {
      | Self::Collapsed => Self::Expanded,
      | Self::Expanded => Self::Collapsed
    }
  }

  pub fn show_all(self) -> bool {
    self == Self::Expanded
  }
}

/// A finished drag: the issue, the day
/// it was picked up from and the day it
/// was dropped on, if any.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MoveIssueCommand {
  pub issue_id: Uuid,
  pub from:     NaiveDate,
  pub to:       Option<NaiveDate>
}

/// Work the runtime has to carry out
/// after a local change.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementEffect {
  PersistTargetDate {
    issue_id: Uuid,
    patch:    IssuePatch
  }
}

/// New-issue draft due on the day it was
/// added from.
pub fn add_issue_to_date(
  date: NaiveDate,
  name: impl Into<String>
) -> IssueDraft {
  IssueDraft {
    name:        name.into(),
    target_date: Some(render_date_format(
      date
    ))
  }
}

/// Local copy of the issues fetched for
/// one calendar range. Moves patch it in
/// place; `revision` changes whenever
/// the buckets need deriving again.
#[derive(Debug, Clone, Default)]
pub struct IssueBoard {
  issues:   Vec<Issue>,
  revision: u64
}

impl IssueBoard {
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

  pub fn get(
    &self,
    issue_id: Uuid
  ) -> Option<&Issue> {
    self
      .issues
      .iter()
      .find(|issue| issue.id == issue_id)
  }

  pub fn buckets(
    &self,
    range: VisibleRange,
    show_weekends: bool
  ) -> Vec<DayBucket<'_>> {
    bucket_issues(
      &self.issues,
      range,
      show_weekends
    )
  }

  pub fn push(&mut self, issue: Issue) {
    self.issues.push(issue);
    self.revision += 1;
  }

  /// Apply a drop. Returns the
  /// persistence request when the board
  /// changed, `None` for every no-op.
  #[tracing::instrument(skip(self))]
  pub fn move_issue(
    &mut self,
    command: MoveIssueCommand
  ) -> Option<PlacementEffect> {
    let Some(to) = command.to else {
      tracing::debug!(
        "drop outside any day; ignoring"
      );
      return None;
    };
    if to == command.from {
      return None;
    }

    let Some(issue) = self
      .issues
      .iter_mut()
      .find(|issue| {
        issue.id == command.issue_id
      })
    else {
      tracing::warn!(
        issue = %command.issue_id,
        "move for unknown issue; ignoring"
      );
      return None;
    };

    if issue_target_day(issue) == Some(to)
    {
      return None;
    }

    let rendered = render_date_format(to);
    issue.target_date =
      Some(rendered.clone());
    self.revision += 1;

    tracing::info!(
      issue = %command.issue_id,
      from = %command.from,
      to = %to,
      "issue moved"
    );

    Some(
      PlacementEffect::PersistTargetDate {
        issue_id: command.issue_id,
        patch:    IssuePatch::target_date(
          rendered
        )
      }
    )
  }
}
