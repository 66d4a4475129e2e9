//! Runtime around the pure calendar and
//! list state: runs fetches, applies
//! optimistic edits and sends the
//! resulting patches in the background.

use std::sync::Arc;

use almanac_shared::{
  Issue,
  IssuePatch
};
use anyhow::Context;
use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{
  debug,
  info,
  warn
};
use uuid::Uuid;

use crate::cache::{
  FetchKey,
  FetchTicket,
  IssueCache
};
use crate::my_issues::MyIssuesBoard;
use crate::placement::{
  self,
  DayBucket,
  IssueBoard,
  MoveIssueCommand,
  OverflowToggle,
  PlacementEffect
};
use crate::range::{
  CalendarAction,
  ViewState
};
use crate::service::{
  IssueService,
  ScopeParams
};

/// How a background patch ended. A
/// failure leaves the optimistic local
/// edit in place.
#[derive(Debug)]
pub enum PatchOutcome {
  Persisted {
    issue_id: Uuid
  },
  Failed {
    issue_id: Uuid,
    error:    anyhow::Error
  }
}

impl PatchOutcome {
  pub fn issue_id(&self) -> Uuid {
    match self {
      | Self::Persisted { issue_id }
      | Self::Failed { issue_id, .. } => {
        *issue_id
      }
    }
  }

  pub fn is_persisted(&self) -> bool {
    matches!(self, Self::Persisted { .. })
  }
}

/// Patches run as detached tasks, so
/// dropping the owning session does not
/// cancel a change already shown locally.
fn spawn_patch<S>(
  in_flight: &mut Vec<JoinHandle<PatchOutcome>>,
  service: Arc<S>,
  scope: ScopeParams,
  issue_id: Uuid,
  patch: IssuePatch
) where
  S: IssueService + 'static
{
  let handle = tokio::spawn(async move {
    match service
      .patch_issue(&scope, issue_id, patch)
      .await
    {
      | Ok(_) => {
        debug!(issue = %issue_id, "patch persisted");
        PatchOutcome::Persisted {
          issue_id
        }
      }
      | Err(error) => {
        warn!(
          issue = %issue_id,
          error = %format!("{error:#}"),
          "patch failed; keeping local \
           edit"
        );
        PatchOutcome::Failed {
          issue_id,
          error
        }
      }
    }
  });
  in_flight.push(handle);
}

async fn drain(
  in_flight: &mut Vec<JoinHandle<PatchOutcome>>
) -> Vec<PatchOutcome> {
  let mut outcomes =
    Vec::with_capacity(in_flight.len());
  for handle in in_flight.drain(..) {
    match handle.await {
      | Ok(outcome) => {
        outcomes.push(outcome)
      }
      | Err(error) => {
        warn!(%error, "patch task did not finish");
      }
    }
  }
  outcomes
}

/// A fetch that has been registered with
/// the cache but not run yet.
pub struct PendingFetch<S> {
  service: Arc<S>,
  scope:   ScopeParams,
  ticket:  FetchTicket
}

impl<S: IssueService> PendingFetch<S> {
  pub async fn run(
    self
  ) -> (
    FetchTicket,
    anyhow::Result<Vec<Issue>>
  ) {
    let range = self.ticket.key().range;
    let result = self
      .service
      .fetch_issues(&self.scope, range)
      .await;
    (self.ticket, result)
  }
}

pub struct CalendarSession<S> {
  service:   Arc<S>,
  scope:     ScopeParams,
  view:      ViewState,
  overflow:  OverflowToggle,
  cache:     IssueCache,
  in_flight: Vec<JoinHandle<PatchOutcome>>
}

impl<S> CalendarSession<S>
where
  S: IssueService + 'static
{
  pub fn new(
    service: Arc<S>,
    scope: ScopeParams,
    view: ViewState
  ) -> Self {
    Self {
      service,
      scope,
      view,
      overflow: OverflowToggle::default(),
      cache: IssueCache::new(),
      in_flight: Vec::new()
    }
  }

  pub fn view(&self) -> &ViewState {
    &self.view
  }

  pub fn overflow(&self) -> OverflowToggle {
    self.overflow
  }

  pub fn toggle_overflow(&mut self) {
    self.overflow = self.overflow.toggled();
  }

  pub fn current_key(&self) -> FetchKey {
    FetchKey::new(
      &self.scope,
      self.view.range()
    )
  }

  /// Apply a navigation action. Returns
  /// `true` when the visible range moved
  /// and issues should be fetched again.
  pub fn dispatch(
    &mut self,
    action: CalendarAction
  ) -> bool {
    let before = self.view.range();
    self.view = self.view.reduce(action);
    self.view.range() != before
  }

  pub fn start_refresh(
    &mut self
  ) -> PendingFetch<S> {
    let ticket =
      self.cache.begin(self.current_key());
    PendingFetch {
      service: Arc::clone(&self.service),
      scope: self.scope.clone(),
      ticket
    }
  }

  /// Store the result of a fetch started
  /// with [`Self::start_refresh`].
  /// `Ok(false)` means the response was
  /// stale and dropped, whether it carried
  /// issues or an error.
  pub fn finish_refresh(
    &mut self,
    ticket: FetchTicket,
    result: anyhow::Result<Vec<Issue>>
  ) -> anyhow::Result<bool> {
    if !self.cache.is_current(&ticket) {
      debug!(
        token = ticket.token(),
        failed = result.is_err(),
        "discarding stale fetch response"
      );
      return Ok(false);
    }

    match result {
      | Ok(issues) => {
        Ok(self.cache.complete(ticket, issues))
      }
      | Err(error) => {
        warn!(
          error = %format!("{error:#}"),
          "calendar fetch failed"
        );
        Err(error).context(
          "failed to fetch calendar issues"
        )
      }
    }
  }

  #[tracing::instrument(skip(self))]
  pub async fn refresh(
    &mut self
  ) -> anyhow::Result<bool> {
    let pending = self.start_refresh();
    let (ticket, result) =
      pending.run().await;
    self.finish_refresh(ticket, result)
  }

  /// `None` until the current range has
  /// been fetched.
  pub fn board(&self) -> Option<&IssueBoard> {
    self.cache.get(&self.current_key())
  }

  pub fn buckets(
    &self
  ) -> Option<Vec<DayBucket<'_>>> {
    let range = self.view.range();
    let show_weekends =
      self.view.show_weekends();
    self.board().map(|board| {
      board.buckets(range, show_weekends)
    })
  }

  /// Apply a drop to the current board and
  /// send the change in the background.
  /// Returns whether anything moved.
  pub fn move_issue(
    &mut self,
    command: MoveIssueCommand
  ) -> bool {
    let key = self.current_key();
    let Some(board) =
      self.cache.get_mut(&key)
    else {
      warn!(
        "move before issues were loaded; \
         ignoring"
      );
      return false;
    };

    match board.move_issue(command) {
      | Some(
        PlacementEffect::PersistTargetDate {
          issue_id,
          patch
        }
      ) => {
        spawn_patch(
          &mut self.in_flight,
          Arc::clone(&self.service),
          self.scope.clone(),
          issue_id,
          patch
        );
        true
      }
      | None => false
    }
  }

  /// Create an issue preset to `date` and
  /// show it right away when the day is
  /// on screen.
  #[tracing::instrument(skip(self))]
  pub async fn add_issue_to_date(
    &mut self,
    date: NaiveDate,
    name: String
  ) -> anyhow::Result<Issue> {
    let draft =
      placement::add_issue_to_date(date, name);
    let created = self
      .service
      .create_issue(&self.scope, draft)
      .await
      .context("failed to create issue")?;
    info!(issue = %created.id, %date, "issue created");

    let key = self.current_key();
    if key.range.contains(date)
      && let Some(board) =
        self.cache.get_mut(&key)
    {
      board.push(created.clone());
    }
    Ok(created)
  }

  pub fn pending_patches(&self) -> usize {
    self.in_flight.len()
  }

  /// Wait for every background patch.
  pub async fn settle(
    &mut self
  ) -> Vec<PatchOutcome> {
    drain(&mut self.in_flight).await
  }
}

pub struct MyIssuesSession<S> {
  service:   Arc<S>,
  workspace: String,
  board:     Option<MyIssuesBoard>,
  in_flight: Vec<JoinHandle<PatchOutcome>>
}

impl<S> MyIssuesSession<S>
where
  S: IssueService + 'static
{
  pub fn new(
    service: Arc<S>,
    workspace: impl Into<String>
  ) -> Self {
    Self {
      service,
      workspace: workspace.into(),
      board: None,
      in_flight: Vec::new()
    }
  }

  pub fn board(
    &self
  ) -> Option<&MyIssuesBoard> {
    self.board.as_ref()
  }

  #[tracing::instrument(skip(self))]
  pub async fn refresh(
    &mut self
  ) -> anyhow::Result<()> {
    let issues = self
      .service
      .my_issues(&self.workspace)
      .await
      .context(
        "failed to fetch assigned issues"
      )?;
    debug!(
      issues = issues.len(),
      "assigned issues loaded"
    );
    self.board =
      Some(MyIssuesBoard::new(issues));
    Ok(())
  }

  pub fn update_issue(
    &mut self,
    issue_id: Uuid,
    patch: IssuePatch
  ) -> bool {
    let Some(board) = self.board.as_mut()
    else {
      warn!(
        "update before issues were \
         loaded; ignoring"
      );
      return false;
    };
    let Some(request) =
      board.update_issue(issue_id, patch)
    else {
      return false;
    };

    spawn_patch(
      &mut self.in_flight,
      Arc::clone(&self.service),
      ScopeParams::project(
        self.workspace.clone(),
        request.project
      ),
      request.issue_id,
      request.patch
    );
    true
  }

  pub async fn settle(
    &mut self
  ) -> Vec<PatchOutcome> {
    drain(&mut self.in_flight).await
  }
}
