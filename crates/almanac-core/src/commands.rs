use std::io::Write;
use std::sync::Arc;

use almanac_shared::{IssuePatch, IssueScope, Priority};
use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cli::{CalendarArgs, Command, UpdateArgs};
use crate::config::Config;
use crate::datetime::render_date_format;
use crate::my_issues::{GroupBy, group_issues};
use crate::placement::{MoveIssueCommand, issue_target_day};
use crate::range::{CalendarAction, Step, ViewMode, ViewState};
use crate::render::Renderer;
use crate::service::{IssueService, ScopeParams};
use crate::session::{CalendarSession, MyIssuesSession, PatchOutcome};

#[instrument(skip(service, cfg, renderer, out))]
pub async fn dispatch<S, W>(
    service: Arc<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    match command {
        Command::Calendar(args) => cmd_calendar(service, cfg, renderer, args, today, out).await,
        Command::Move { issue, from, to } => {
            cmd_move(service, cfg, MoveIssueCommand { issue_id: issue, from, to: Some(to) }, out)
                .await
        }
        Command::Add { date, name } => cmd_add(service, cfg, date, name.join(" "), out).await,
        Command::Mine { group_by } => {
            cmd_mine(service, cfg, renderer, group_by.as_deref(), today, out).await
        }
        Command::Update(args) => cmd_update(service, cfg, args, out).await,
    }
}

fn project_scope(cfg: &Config) -> anyhow::Result<ScopeParams> {
    Ok(ScopeParams::project(
        cfg.require_workspace()?,
        cfg.require_project()?,
    ))
}

fn month_view(cfg: &Config, reference: NaiveDate) -> ViewState {
    ViewState::new(reference, ViewMode::Monthly, true, cfg.week_start())
}

/// Build the starting view from config, then apply the flags on top.
fn calendar_view(cfg: &Config, args: &CalendarArgs, today: NaiveDate) -> ViewState {
    let mode = if args.weekly {
        ViewMode::Weekly
    } else if args.monthly {
        ViewMode::Monthly
    } else {
        cfg.calendar.view
    };

    let show_weekends = if args.weekends {
        true
    } else if args.no_weekends {
        false
    } else {
        cfg.calendar.show_weekends
    };

    let reference = if args.today {
        today
    } else {
        args.date.unwrap_or(today)
    };

    ViewState::new(reference, mode, show_weekends, cfg.week_start())
}

async fn cmd_calendar<S, W>(
    service: Arc<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: CalendarArgs,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    let mut scope = project_scope(cfg)?;
    if let Some(cycle) = args.cycle {
        scope = scope.with_scope(IssueScope::Cycle(cycle));
    } else if let Some(module) = args.module {
        scope = scope.with_scope(IssueScope::Module(module));
    }
    for kv in &args.filters {
        scope.filters.insert(kv.key.clone(), kv.value.clone());
    }

    let view = calendar_view(cfg, &args, today);
    let mut session = CalendarSession::new(service, scope, view);

    let (step, count) = match (args.prev, args.next) {
        (Some(n), _) => (Step::Back, n),
        (None, Some(n)) => (Step::Forward, n),
        (None, None) => (Step::Forward, 0),
    };
    for _ in 0..count {
        session.dispatch(CalendarAction::Step(step));
    }
    if args.all {
        session.toggle_overflow();
    }

    debug!(
        start = %session.view().range().start,
        end = %session.view().range().end,
        "rendering calendar"
    );

    if let Err(err) = session.refresh().await {
        renderer.print_calendar(&mut *out, session.view(), None, session.overflow(), today)?;
        return Err(err);
    }

    let buckets = session.buckets();
    renderer.print_calendar(
        &mut *out,
        session.view(),
        buckets.as_deref(),
        session.overflow(),
        today,
    )?;
    Ok(())
}

fn report_outcomes<W: Write>(
    outcomes: Vec<PatchOutcome>,
    out: &mut W,
    what: &str,
) -> anyhow::Result<()> {
    let mut failures = 0usize;
    for outcome in outcomes {
        match outcome {
            PatchOutcome::Persisted { issue_id } => {
                writeln!(out, "{what} {issue_id}")?;
            }
            PatchOutcome::Failed { issue_id, error } => {
                failures += 1;
                warn!(issue = %issue_id, error = %format!("{error:#}"), "change not saved");
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!(
            "{failures} change(s) could not be saved; the server copy is unchanged"
        ));
    }
    Ok(())
}

async fn cmd_move<S, W>(
    service: Arc<S>,
    cfg: &Config,
    command: MoveIssueCommand,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    let scope = project_scope(cfg)?;
    let mut session = CalendarSession::new(service, scope, month_view(cfg, command.from));
    session
        .refresh()
        .await
        .context("failed to load the issue's month")?;

    let on_from_day = session
        .board()
        .and_then(|board| board.get(command.issue_id))
        .and_then(issue_target_day)
        == Some(command.from);
    if !on_from_day {
        return Err(anyhow!(
            "issue {} is not on {}",
            command.issue_id,
            render_date_format(command.from)
        ));
    }

    if !session.move_issue(command) {
        info!(issue = %command.issue_id, "issue already on that day");
        writeln!(out, "Nothing to move.")?;
        return Ok(());
    }

    let day = command.to.map(render_date_format).unwrap_or_default();
    report_outcomes(session.settle().await, out, &format!("Moved to {day}:"))
}

async fn cmd_add<S, W>(
    service: Arc<S>,
    cfg: &Config,
    date: NaiveDate,
    name: String,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    if name.trim().is_empty() {
        return Err(anyhow!("issue name cannot be empty"));
    }

    let scope = project_scope(cfg)?;
    let mut session = CalendarSession::new(service, scope, month_view(cfg, date));
    let created = session.add_issue_to_date(date, name).await?;

    let key = created.display_key().unwrap_or_else(|| created.id.to_string());
    writeln!(
        out,
        "Created {key} \"{}\" due {}",
        created.name,
        render_date_format(date)
    )?;
    Ok(())
}

async fn cmd_mine<S, W>(
    service: Arc<S>,
    cfg: &Config,
    renderer: &Renderer,
    group_by: Option<&str>,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    let group_by = match group_by {
        Some(raw) => {
            GroupBy::from_key(raw).ok_or_else(|| anyhow!("unknown grouping: {raw}"))?
        }
        None => cfg.my_issues.group_by,
    };

    let mut session = MyIssuesSession::new(service, cfg.require_workspace()?);
    session.refresh().await?;

    let issues = session.board().map(|board| board.issues()).unwrap_or_default();
    let groups = group_issues(issues, group_by);
    renderer.print_my_issues(
        &mut *out,
        &groups,
        &cfg.my_issues.properties,
        group_by != GroupBy::None,
        today,
        cfg.my_issues.due_soon_days,
    )?;
    Ok(())
}

fn update_patch(args: &UpdateArgs) -> anyhow::Result<IssuePatch> {
    let mut patch = IssuePatch::default();

    if let Some(raw) = &args.priority {
        patch.priority = if raw.trim().eq_ignore_ascii_case("none") {
            Some(None)
        } else {
            Some(Some(
                Priority::from_key(raw).ok_or_else(|| anyhow!("unknown priority: {raw}"))?,
            ))
        };
    }

    if let Some(due) = args.due {
        patch.target_date = Some(Some(render_date_format(due)));
    } else if args.clear_due {
        patch.target_date = Some(None);
    }

    if let Some(name) = &args.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("issue name cannot be empty"));
        }
        patch.name = Some(name.to_string());
    }

    Ok(patch)
}

async fn cmd_update<S, W>(
    service: Arc<S>,
    cfg: &Config,
    args: UpdateArgs,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: IssueService + 'static,
    W: Write,
{
    let patch = update_patch(&args)?;
    if patch.is_empty() {
        return Err(anyhow!(
            "nothing to update; pass --priority, --due, --clear-due or --name"
        ));
    }

    let mut session = MyIssuesSession::new(service, cfg.require_workspace()?);
    session.refresh().await?;

    if !session.update_issue(args.issue, patch) {
        return Err(anyhow!("issue {} is not assigned to you", args.issue));
    }

    report_outcomes(session.settle().await, out, "Updated")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_args(issue: uuid::Uuid) -> UpdateArgs {
        UpdateArgs {
            issue,
            priority: None,
            due: None,
            clear_due: false,
            name: None,
        }
    }

    #[test]
    fn update_patch_maps_flags() {
        let mut args = update_args(uuid::Uuid::nil());
        assert!(update_patch(&args).expect("patch").is_empty());

        args.priority = Some("High".to_string());
        args.due = NaiveDate::from_ymd_opt(2024, 3, 1);
        let patch = update_patch(&args).expect("patch");
        assert_eq!(patch.priority, Some(Some(Priority::High)));
        assert_eq!(patch.target_date, Some(Some("2024-03-01".to_string())));

        args.priority = Some("none".to_string());
        args.due = None;
        args.clear_due = true;
        let patch = update_patch(&args).expect("patch");
        assert_eq!(patch.priority, Some(None));
        assert_eq!(patch.target_date, Some(None));

        args.priority = Some("someday".to_string());
        assert!(update_patch(&args).is_err());
    }

    #[test]
    fn flags_override_configured_view() {
        let mut cfg = Config::default();
        cfg.calendar.view = ViewMode::Weekly;
        cfg.calendar.show_weekends = false;
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");

        let from_config = calendar_view(&cfg, &CalendarArgs::default(), today);
        assert_eq!(from_config.mode(), ViewMode::Weekly);
        assert!(!from_config.show_weekends());
        assert_eq!(from_config.reference(), today);

        let args = CalendarArgs {
            monthly: true,
            weekends: true,
            date: NaiveDate::from_ymd_opt(2023, 1, 5),
            ..CalendarArgs::default()
        };
        let flagged = calendar_view(&cfg, &args, today);
        assert_eq!(flagged.mode(), ViewMode::Monthly);
        assert!(flagged.show_weekends());
        assert_eq!(flagged.title(), "January 2023");

        let jumped = calendar_view(
            &cfg,
            &CalendarArgs {
                today: true,
                ..args
            },
            today,
        );
        assert_eq!(jumped.reference(), today);
    }
}
