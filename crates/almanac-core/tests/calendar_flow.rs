use std::sync::Arc;

use almanac_core::cli::{CalendarArgs, Command, UpdateArgs};
use almanac_core::commands;
use almanac_core::config::Config;
use almanac_core::range::VisibleRange;
use almanac_core::render::Renderer;
use almanac_core::service::{IssueService, ScopeParams};
use almanac_shared::{
    Issue, IssueDraft, IssuePatch, Priority, ProjectDetail, StateDetail, StateGroup,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use uuid::Uuid;

const PROJECT: &str = "0d7e3c1a-2b4c-4d5e-8f90-a1b2c3d4e5f6";

#[derive(Default)]
struct MemoryService {
    issues: Mutex<Vec<Issue>>,
    queries: Mutex<Vec<Vec<(String, String)>>>,
    patches: Mutex<Vec<(Uuid, IssuePatch)>>,
}

impl IssueService for MemoryService {
    async fn fetch_issues(
        &self,
        scope: &ScopeParams,
        range: VisibleRange,
    ) -> anyhow::Result<Vec<Issue>> {
        self.queries.lock().push(scope.calendar_query(range));
        Ok(self
            .issues
            .lock()
            .iter()
            .filter(|issue| {
                issue
                    .target_date
                    .as_deref()
                    .and_then(|raw| raw.get(..10))
                    .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
                    .is_some_and(|day| range.contains(day))
            })
            .cloned()
            .collect())
    }

    async fn patch_issue(
        &self,
        _scope: &ScopeParams,
        issue_id: Uuid,
        patch: IssuePatch,
    ) -> anyhow::Result<Issue> {
        self.patches.lock().push((issue_id, patch.clone()));
        let mut issues = self.issues.lock();
        let issue = issues
            .iter_mut()
            .find(|issue| issue.id == issue_id)
            .ok_or_else(|| anyhow::anyhow!("API request failed: 404 Not Found - {{}}"))?;
        if let Some(target) = patch.target_date {
            issue.target_date = target;
        }
        if let Some(priority) = patch.priority {
            issue.priority = priority;
        }
        Ok(issue.clone())
    }

    async fn create_issue(
        &self,
        _scope: &ScopeParams,
        draft: IssueDraft,
    ) -> anyhow::Result<Issue> {
        let mut issues = self.issues.lock();
        let mut issue = issue(&draft.name, draft.target_date.as_deref());
        issue.sequence_id = Some(issues.len() as u64 + 1);
        issues.push(issue.clone());
        Ok(issue)
    }

    async fn my_issues(&self, _workspace: &str) -> anyhow::Result<Vec<Issue>> {
        Ok(self.issues.lock().clone())
    }
}

fn issue(name: &str, target: Option<&str>) -> Issue {
    Issue {
        id: Uuid::new_v4(),
        name: name.to_string(),
        sequence_id: Some(1),
        project: Uuid::parse_str(PROJECT).expect("uuid"),
        project_detail: Some(ProjectDetail {
            id: Uuid::parse_str(PROJECT).expect("uuid"),
            name: "Web".to_string(),
            identifier: "WEB".to_string(),
        }),
        state: None,
        state_detail: StateDetail {
            id: None,
            name: "Todo".to_string(),
            color: "#3b82f6".to_string(),
            group: StateGroup::Unstarted,
        },
        priority: None,
        start_date: None,
        target_date: target.map(str::to_string),
        assignees: vec![],
    }
}

fn config() -> Config {
    Config::from_toml_str(&format!(
        r#"
[workspace]
slug = "acme"
project = "{PROJECT}"

[calendar]
view = "monthly"
show_weekends = true

[display]
color = false
"#
    ))
    .expect("config")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).expect("date")
}

async fn run(service: &Arc<MemoryService>, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    commands::dispatch(
        Arc::clone(service),
        &config(),
        &Renderer::plain(),
        command,
        today(),
        &mut out,
    )
    .await?;
    Ok(String::from_utf8(out).expect("utf8"))
}

#[tokio::test]
async fn calendar_fetches_visible_window_and_renders() {
    let service = Arc::new(MemoryService::default());
    service
        .issues
        .lock()
        .push(issue("ship release", Some("2024-03-10")));

    let text = run(&service, Command::Calendar(CalendarArgs::default()))
        .await
        .expect("calendar");

    assert!(text.starts_with("March 2024"));
    assert!(text.contains("WEB-1 ship release"));
    let queries = service.queries.lock();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains(&(
        "target_date".to_string(),
        "2024-02-26;after,2024-03-31;before".to_string()
    )));
}

#[tokio::test]
async fn next_month_shifts_the_window() {
    let service = Arc::new(MemoryService::default());
    let args = CalendarArgs {
        next: Some(1),
        weekly: true,
        ..CalendarArgs::default()
    };
    let text = run(&service, Command::Calendar(args)).await.expect("calendar");
    assert!(text.contains("(2024-03-18 .. 2024-03-24, weekly)"));
}

#[tokio::test]
async fn move_then_calendar_shows_new_day() {
    let service = Arc::new(MemoryService::default());
    let moved = issue("retro", Some("2024-03-10"));
    let id = moved.id;
    service.issues.lock().push(moved);

    let from = NaiveDate::from_ymd_opt(2024, 3, 10).expect("date");
    let to = NaiveDate::from_ymd_opt(2024, 4, 2).expect("date");
    let text = run(&service, Command::Move { issue: id, from, to })
        .await
        .expect("move");
    assert!(text.contains("Moved to 2024-04-02"));
    assert_eq!(
        service.patches.lock().as_slice(),
        &[(id, IssuePatch::target_date("2024-04-02"))]
    );

    let april = run(
        &service,
        Command::Calendar(CalendarArgs {
            date: Some(to),
            ..CalendarArgs::default()
        }),
    )
    .await
    .expect("calendar");
    assert!(april.contains("retro"));
}

#[tokio::test]
async fn move_to_same_day_sends_nothing() {
    let service = Arc::new(MemoryService::default());
    let still = issue("still", Some("2024-03-10"));
    let id = still.id;
    service.issues.lock().push(still);

    let day = NaiveDate::from_ymd_opt(2024, 3, 10).expect("date");
    let text = run(
        &service,
        Command::Move {
            issue: id,
            from: day,
            to: day,
        },
    )
    .await
    .expect("move");
    assert_eq!(text, "Nothing to move.\n");
    assert!(service.patches.lock().is_empty());
}

#[tokio::test]
async fn move_from_wrong_day_is_rejected() {
    let service = Arc::new(MemoryService::default());
    let misplaced = issue("retro", Some("2024-03-10"));
    let id = misplaced.id;
    service.issues.lock().push(misplaced);

    let err = run(
        &service,
        Command::Move {
            issue: id,
            from: NaiveDate::from_ymd_opt(2024, 3, 5).expect("date"),
            to: NaiveDate::from_ymd_opt(2024, 3, 20).expect("date"),
        },
    )
    .await
    .expect_err("wrong source day");
    assert!(err.to_string().contains("is not on 2024-03-05"));
    assert!(service.patches.lock().is_empty());
    assert_eq!(
        service.issues.lock()[0].target_date.as_deref(),
        Some("2024-03-10")
    );
}

#[tokio::test]
async fn add_creates_issue_on_day() {
    let service = Arc::new(MemoryService::default());
    let date = NaiveDate::from_ymd_opt(2024, 3, 4).expect("date");
    let text = run(
        &service,
        Command::Add {
            date,
            name: vec!["plan".to_string(), "sprint".to_string()],
        },
    )
    .await
    .expect("add");
    assert_eq!(text, "Created WEB-1 \"plan sprint\" due 2024-03-04\n");
    assert_eq!(
        service.issues.lock()[0].target_date.as_deref(),
        Some("2024-03-04")
    );
}

#[tokio::test]
async fn update_and_list_my_issues() {
    let service = Arc::new(MemoryService::default());
    let mine = issue("triage inbox", Some("2024-03-12"));
    let id = mine.id;
    service.issues.lock().push(mine);

    run(
        &service,
        Command::Update(UpdateArgs {
            issue: id,
            priority: Some("urgent".to_string()),
            due: None,
            clear_due: false,
            name: None,
        }),
    )
    .await
    .expect("update");
    assert_eq!(service.issues.lock()[0].priority, Some(Priority::Urgent));

    let text = run(
        &service,
        Command::Mine {
            group_by: Some("priority".to_string()),
        },
    )
    .await
    .expect("mine");
    assert!(text.contains("urgent (1)"));
    assert!(text.contains("Due date has passed by 3 days"));
}

#[tokio::test]
async fn unknown_issue_update_is_an_error() {
    let service = Arc::new(MemoryService::default());
    let err = run(
        &service,
        Command::Update(UpdateArgs {
            issue: Uuid::new_v4(),
            priority: Some("low".to_string()),
            due: None,
            clear_due: false,
            name: None,
        }),
    )
    .await
    .expect_err("not assigned");
    assert!(err.to_string().contains("not assigned"));
}
