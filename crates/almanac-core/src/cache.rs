//! Fetched calendar boards, keyed by what
//! was asked for.
//!
//! Fetches are tagged with a request
//! token when they start. Only the most
//! recently started fetch may store its
//! result, so a slow response for a range
//! the user already navigated away from
//! cannot overwrite a newer one.

use std::collections::HashMap;

use almanac_shared::{
  Issue,
  IssueScope
};
use tracing::debug;
use uuid::Uuid;

use crate::placement::IssueBoard;
use crate::range::VisibleRange;
use crate::service::ScopeParams;

#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct FetchKey {
  pub workspace: String,
  pub project:   Uuid,
  pub scope:     IssueScope,
  pub range:     VisibleRange
}

impl FetchKey {
  pub fn new(
    params: &ScopeParams,
    range: VisibleRange
  ) -> Self {
    Self {
      workspace: params.workspace.clone(),
      project: params.project,
      scope: params.scope,
      range
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
  token: u64,
  key:   FetchKey
}

impl FetchTicket {
  pub fn key(&self) -> &FetchKey {
    &self.key
  }

  pub fn token(&self) -> u64 {
    self.token
  }
}

#[derive(Debug, Default)]
pub struct IssueCache {
  entries:    HashMap<FetchKey, IssueBoard>,
  next_token: u64,
  latest:     Option<u64>
}

impl IssueCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin(
    &mut self,
    key: FetchKey
  ) -> FetchTicket {
    self.next_token += 1;
    let token = self.next_token;
    self.latest = Some(token);
    debug!(
      token,
      start = %key.range.start,
      end = %key.range.end,
      "fetch started"
    );
    FetchTicket { token, key }
  }

  pub fn is_current(
    &self,
    ticket: &FetchTicket
  ) -> bool {
    self.latest == Some(ticket.token)
  }

  /// Store a fetch result. Returns
  /// `false` and drops the issues when a
  /// newer fetch has started since.
  pub fn complete(
    &mut self,
    ticket: FetchTicket,
    issues: Vec<Issue>
  ) -> bool {
    if !self.is_current(&ticket) {
      debug!(
        token = ticket.token,
        latest = ?self.latest,
        "discarding stale fetch response"
      );
      return false;
    }

    debug!(
      token = ticket.token,
      issues = issues.len(),
      "fetch stored"
    );
    self.entries.insert(
      ticket.key,
      IssueBoard::new(issues)
    );
    true
  }

  pub fn get(
    &self,
    key: &FetchKey
  ) -> Option<&IssueBoard> {
    self.entries.get(key)
  }

  pub fn get_mut(
    &mut self,
    key: &FetchKey
  ) -> Option<&mut IssueBoard> {
    self.entries.get_mut(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
