//! Remote issue API: the collaborator the
//! calendar fetches from and persists to.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use almanac_shared::{
  Issue,
  IssueDraft,
  IssuePatch,
  IssueScope
};
use anyhow::Context;
use reqwest::{
  Client,
  Method,
  RequestBuilder,
  Url,
  header
};
use serde::de::DeserializeOwned;
use tracing::{
  debug,
  warn
};
use uuid::Uuid;

use crate::config::Config;
use crate::range::VisibleRange;

/// Which issues a view is looking at.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct ScopeParams {
  pub workspace: String,
  pub project:   Uuid,
  pub scope:     IssueScope,
  /// Extra view filters forwarded
  /// verbatim as query parameters.
  pub filters:   BTreeMap<String, String>
}

impl ScopeParams {
  pub fn project(
    workspace: impl Into<String>,
    project: Uuid
  ) -> Self {
    Self {
      workspace: workspace.into(),
      project,
      scope: IssueScope::Project,
      filters: BTreeMap::new()
    }
  }

  #[must_use]
  pub fn with_scope(
    mut self,
    scope: IssueScope
  ) -> Self {
    self.scope = scope;
    self
  }

  fn project_path(&self) -> String {
    format!(
      "/api/workspaces/{}/projects/{}",
      self.workspace, self.project
    )
  }

  fn issues_path(&self) -> String {
    let base = self.project_path();
    match self.scope {
      | IssueScope::Project => {
        format!("{base}/issues/")
      }
      | IssueScope::Cycle(cycle) => {
        format!(
          "{base}/cycles/{cycle}/cycle-issues/"
        )
      }
      | IssueScope::Module(module) => {
        format!(
          "{base}/modules/{module}/module-issues/"
        )
      }
    }
  }

  /// Query for a calendar fetch: the view
  /// filters plus the target date window.
  pub fn calendar_query(
    &self,
    range: VisibleRange
  ) -> Vec<(String, String)> {
    let mut query = self
      .filters
      .iter()
      .filter(|(key, _)| {
        key.as_str() != "target_date"
          && key.as_str() != "group_by"
      })
      .map(|(key, value)| {
        (key.clone(), value.clone())
      })
      .collect::<Vec<_>>();
    query.push((
      "target_date".to_string(),
      range.target_date_filter()
    ));
    query
  }
}

pub trait IssueService:
  Send + Sync
{
  fn fetch_issues(
    &self,
    scope: &ScopeParams,
    range: VisibleRange
  ) -> impl Future<
    Output = anyhow::Result<Vec<Issue>>
  > + Send;

  fn patch_issue(
    &self,
    scope: &ScopeParams,
    issue_id: Uuid,
    patch: IssuePatch
  ) -> impl Future<
    Output = anyhow::Result<Issue>
  > + Send;

  fn create_issue(
    &self,
    scope: &ScopeParams,
    draft: IssueDraft
  ) -> impl Future<
    Output = anyhow::Result<Issue>
  > + Send;

  fn my_issues(
    &self,
    workspace: &str
  ) -> impl Future<
    Output = anyhow::Result<Vec<Issue>>
  > + Send;
}

pub struct HttpIssueService {
  client:   Client,
  base_url: String,
  token:    Option<String>
}

impl HttpIssueService {
  pub fn new(
    config: &Config
  ) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(
        config.api.timeout_secs
      ))
      .build()
      .context(
        "failed building HTTP client \
         for issue API"
      )?;

    if config.api.token.is_none() {
      warn!(
        "no api token configured; \
         requests are unauthenticated"
      );
    }

    Ok(Self {
      client,
      base_url: config.api.base_url.clone(),
      token: config.api.token.clone()
    })
  }

  fn url(
    &self,
    path: &str,
    query: &[(String, String)]
  ) -> anyhow::Result<Url> {
    let mut url = Url::parse(&format!(
      "{}{}",
      self.base_url, path
    ))
    .with_context(|| {
      format!(
        "invalid API url for {path}"
      )
    })?;
    if !query.is_empty() {
      let mut pairs =
        url.query_pairs_mut();
      for (key, value) in query {
        pairs.append_pair(key, value);
      }
    }
    Ok(url)
  }

  fn request(
    &self,
    method: Method,
    url: Url
  ) -> RequestBuilder {
    let request = self
      .client
      .request(method, url)
      .header(
        header::ACCEPT,
        "application/json"
      );
    match &self.token {
      | Some(token) => {
        request.bearer_auth(token)
      }
      | None => request
    }
  }

  async fn send<T: DeserializeOwned>(
    &self,
    request: RequestBuilder
  ) -> anyhow::Result<T> {
    let response = request
      .send()
      .await
      .context("issue API request failed")?;

    let status = response.status();
    let body = response
      .text()
      .await
      .context(
        "failed reading issue API \
         response body"
      )?;

    if !status.is_success() {
      anyhow::bail!(
        "API request failed: {} - {}",
        status,
        body
      );
    }

    serde_json::from_str(&body).context(
      "failed to parse issue API \
       response"
    )
  }
}

impl IssueService for HttpIssueService {
  #[tracing::instrument(skip(self, range), fields(window = %range.target_date_filter()))]
  async fn fetch_issues(
    &self,
    scope: &ScopeParams,
    range: VisibleRange
  ) -> anyhow::Result<Vec<Issue>> {
    let url = self.url(
      &scope.issues_path(),
      &scope.calendar_query(range)
    )?;
    debug!(%url, "fetching calendar issues");
    self
      .send(self.request(Method::GET, url))
      .await
  }

  #[tracing::instrument(skip(self, scope, patch))]
  async fn patch_issue(
    &self,
    scope: &ScopeParams,
    issue_id: Uuid,
    patch: IssuePatch
  ) -> anyhow::Result<Issue> {
    let url = self.url(
      &format!(
        "{}/issues/{issue_id}/",
        scope.project_path()
      ),
      &[]
    )?;
    debug!(%url, ?patch, "patching issue");
    self
      .send(
        self
          .request(Method::PATCH, url)
          .json(&patch)
      )
      .await
  }

  #[tracing::instrument(skip(self, scope))]
  async fn create_issue(
    &self,
    scope: &ScopeParams,
    draft: IssueDraft
  ) -> anyhow::Result<Issue> {
    let url = self.url(
      &format!(
        "{}/issues/",
        scope.project_path()
      ),
      &[]
    )?;
    self
      .send(
        self
          .request(Method::POST, url)
          .json(&draft)
      )
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn my_issues(
    &self,
    workspace: &str
  ) -> anyhow::Result<Vec<Issue>> {
    let url = self.url(
      &format!(
        "/api/workspaces/{workspace}/my-issues/"
      ),
      &[]
    )?;
    self
      .send(self.request(Method::GET, url))
      .await
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn scope() -> ScopeParams {
    ScopeParams::project(
      "acme",
      Uuid::parse_str(
        "0d7e3c1a-2b4c-4d5e-8f90-a1b2c3d4e5f6"
      )
      .expect("uuid")
    )
  }

  #[test]
  fn issue_paths_follow_scope() {
    let project = scope();
    assert_eq!(
      project.issues_path(),
      "/api/workspaces/acme/projects/0d7e3c1a-2b4c-4d5e-8f90-a1b2c3d4e5f6/issues/"
    );

    let cycle = Uuid::nil();
    let cycle_scope = scope()
      .with_scope(IssueScope::Cycle(cycle));
    assert!(
      cycle_scope.issues_path().ends_with(
        "/cycles/00000000-0000-0000-0000-000000000000/cycle-issues/"
      )
    );

    let module_scope = scope()
      .with_scope(IssueScope::Module(
        cycle
      ));
    assert!(
      module_scope
        .issues_path()
        .ends_with("/module-issues/")
    );
  }

  #[test]
  fn calendar_query_carries_range_and_filters(
  ) {
    let mut params = scope();
    params.filters.insert(
      "priority".to_string(),
      "high".to_string()
    );
    params.filters.insert(
      "group_by".to_string(),
      "state".to_string()
    );
    let range = VisibleRange::new(
      ymd(2024, 2, 26),
      ymd(2024, 3, 31)
    );
    let query =
      params.calendar_query(range);
    assert_eq!(
      query,
      vec![
        (
          "priority".to_string(),
          "high".to_string()
        ),
        (
          "target_date".to_string(),
          "2024-02-26;after,2024-03-31;before"
            .to_string()
        ),
      ]
    );
  }

  #[test]
  fn url_encodes_query_pairs() {
    let service = HttpIssueService::new(
      &Config::default()
    )
    .expect("client");
    let url = service
      .url(
        "/api/workspaces/acme/my-issues/",
        &[(
          "target_date".to_string(),
          "2024-02-26;after,2024-03-31;before"
            .to_string()
        )]
      )
      .expect("url");
    assert_eq!(url.path(), "/api/workspaces/acme/my-issues/");
    assert_eq!(
      url
        .query_pairs()
        .next()
        .map(|(_, value)| {
          value.into_owned()
        })
        .as_deref(),
      Some(
        "2024-02-26;after,2024-03-31;before"
      )
    );
  }
}
