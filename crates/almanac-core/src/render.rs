use std::io::{self, IsTerminal, Write};

use almanac_shared::{Issue, StateGroup};
use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::render_date_format;
use crate::my_issues::{DisplayProperties, DueStatus, IssueGroup, due_status};
use crate::placement::{DayBucket, OverflowToggle, overflow_count, visible_issues};
use crate::range::ViewState;

const CELL_WIDTH: usize = 18;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.display.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Month or week grid. `buckets` is `None` while the range has not
    /// been fetched yet.
    #[tracing::instrument(skip(self, out, view, buckets))]
    pub fn print_calendar<W: Write>(
        &self,
        mut out: W,
        view: &ViewState,
        buckets: Option<&[DayBucket<'_>]>,
        overflow: OverflowToggle,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let range = view.range();
        writeln!(
            out,
            "{}  ({} .. {}, {})",
            self.paint(&view.title(), "1"),
            render_date_format(range.start),
            render_date_format(range.end),
            view.mode().as_key()
        )?;

        let Some(buckets) = buckets else {
            writeln!(out, "Loading…")?;
            return Ok(());
        };

        let columns = view.column_count();
        let headers = view
            .weekday_headers()
            .into_iter()
            .map(weekday_label)
            .map(str::to_string)
            .collect::<Vec<_>>();

        let show_all = overflow.show_all();
        let mut rows = Vec::new();
        for (week_idx, week) in buckets.chunks(columns).enumerate() {
            if week_idx > 0 {
                rows.push(vec![String::new(); columns]);
            }

            rows.push(pad_row(
                week.iter()
                    .map(|bucket| self.day_label(bucket.date, view, today))
                    .collect(),
                columns,
            ));

            let depth = week
                .iter()
                .map(|bucket| visible_issues(bucket, show_all).len())
                .max()
                .unwrap_or(0);
            for line in 0..depth {
                rows.push(pad_row(
                    week.iter()
                        .map(|bucket| {
                            visible_issues(bucket, show_all)
                                .get(line)
                                .map(|issue| self.issue_chip(issue))
                                .unwrap_or_default()
                        })
                        .collect(),
                    columns,
                ));
            }

            if week.iter().any(|bucket| overflow_count(bucket) > 0) {
                rows.push(pad_row(
                    week.iter()
                        .map(|bucket| {
                            let hidden = overflow_count(bucket);
                            if hidden == 0 {
                                String::new()
                            } else if show_all {
                                self.paint("Hide", "2")
                            } else {
                                self.paint(&format!("+{hidden} more"), "2")
                            }
                        })
                        .collect(),
                    columns,
                ));
            }
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, groups, props))]
    pub fn print_my_issues<W: Write>(
        &self,
        mut out: W,
        groups: &[IssueGroup<'_>],
        props: &DisplayProperties,
        grouped: bool,
        today: NaiveDate,
        soon_days: i64,
    ) -> anyhow::Result<()> {
        if groups.iter().all(|group| group.issues.is_empty()) {
            writeln!(out, "No issues assigned to you.")?;
            return Ok(());
        }

        let mut headers = Vec::new();
        if props.key {
            headers.push("Key".to_string());
        }
        headers.push("Name".to_string());
        if props.state {
            headers.push("State".to_string());
        }
        if props.priority {
            headers.push("Priority".to_string());
        }
        if props.start_date {
            headers.push("Start".to_string());
        }
        if props.due_date {
            headers.push("Due".to_string());
        }
        if props.assignee {
            headers.push("Assignees".to_string());
        }

        for (idx, group) in groups.iter().enumerate() {
            if grouped {
                if idx > 0 {
                    writeln!(out)?;
                }
                writeln!(
                    out,
                    "{} ({})",
                    self.paint(&group.label, "1"),
                    group.issues.len()
                )?;
            }

            let rows = group
                .issues
                .iter()
                .map(|issue| self.issue_row(issue, props, today, soon_days))
                .collect::<Vec<_>>();
            write_table(&mut out, headers.clone(), rows)?;
        }

        Ok(())
    }

    fn issue_row(
        &self,
        issue: &Issue,
        props: &DisplayProperties,
        today: NaiveDate,
        soon_days: i64,
    ) -> Vec<String> {
        let mut row = Vec::new();
        if props.key {
            let key = issue.display_key().unwrap_or_else(|| "-".to_string());
            row.push(self.paint(&key, "33"));
        }
        row.push(issue.name.clone());
        if props.state {
            let code = match issue.state_detail.group {
                StateGroup::Completed => "32",
                StateGroup::Cancelled => "2",
                StateGroup::Started => "36",
                _ => "0",
            };
            row.push(self.paint(&issue.state_detail.name, code));
        }
        if props.priority {
            row.push(
                issue
                    .priority
                    .map(|priority| priority.as_key().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            );
        }
        if props.start_date {
            row.push(issue.start_date.clone().unwrap_or_default());
        }
        if props.due_date {
            let status = due_status(issue.target_date.as_deref(), today, soon_days);
            let text = match (&issue.target_date, status) {
                (_, DueStatus::Unscheduled) => status.describe(),
                (Some(raw), DueStatus::Scheduled { .. }) => raw.clone(),
                (Some(raw), _) => format!("{raw} ({})", status.describe()),
                (None, _) => status.describe(),
            };
            let code = match status {
                DueStatus::Overdue { .. } => "31",
                DueStatus::DueSoon { .. } => "33",
                _ => "0",
            };
            row.push(self.paint(&text, code));
        }
        if props.assignee {
            row.push(issue.assignees.len().to_string());
        }
        row
    }

    fn day_label(&self, date: NaiveDate, view: &ViewState, today: NaiveDate) -> String {
        let label = if date.day() == 1 || date == view.range().start {
            date.format("%b %-d").to_string()
        } else {
            date.day().to_string()
        };

        if date == today {
            self.paint(&format!("[{label}]"), "1;34")
        } else if date.month() != view.reference().month() {
            self.paint(&label, "2")
        } else {
            label
        }
    }

    fn issue_chip(&self, issue: &Issue) -> String {
        let text = match issue.display_key() {
            Some(key) => format!("{key} {}", issue.name),
            None => issue.name.clone(),
        };
        truncate(&text, CELL_WIDTH)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || code == "0" {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn pad_row(mut cells: Vec<String>, columns: usize) -> Vec<String> {
    cells.resize(columns, String::new());
    cells
}

fn truncate(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width + 1 > max_width {
            break;
        }
        used += width;
        out.push(ch);
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        let line = row
            .iter()
            .take(column_count)
            .enumerate()
            .map(|(idx, cell)| {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                let padding = widths[idx].saturating_sub(visible_width);
                format!("{}{} ", cell, " ".repeat(padding))
            })
            .collect::<String>();
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use almanac_shared::Priority;

    use super::*;
    use crate::my_issues::{GroupBy, group_issues};
    use crate::placement::bucket_issues;
    use crate::placement::tests::{sample_issue, ymd};
    use crate::range::ViewMode;

    fn render_calendar(
        view: &ViewState,
        issues: Option<&[Issue]>,
        overflow: OverflowToggle,
    ) -> String {
        let buckets =
            issues.map(|issues| bucket_issues(issues, view.range(), view.show_weekends()));
        let mut out = Vec::new();
        Renderer::plain()
            .print_calendar(
                &mut out,
                view,
                buckets.as_deref(),
                overflow,
                ymd(2024, 3, 15),
            )
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    fn march(show_weekends: bool) -> ViewState {
        ViewState::new(ymd(2024, 3, 15), ViewMode::Monthly, show_weekends, Weekday::Mon)
    }

    #[test]
    fn unloaded_calendar_shows_loading() {
        let text = render_calendar(&march(true), None, OverflowToggle::Collapsed);
        assert!(text.starts_with("March 2024  (2024-02-26 .. 2024-03-31, monthly)"));
        assert!(text.contains("Loading…"));
    }

    #[test]
    fn calendar_lists_issue_under_its_day() {
        let issues = vec![sample_issue("standup notes", Some("2024-03-10"))];
        let text = render_calendar(&march(true), Some(&issues), OverflowToggle::Collapsed);
        let header = text.lines().nth(1).expect("header");
        assert!(header.starts_with("Mon"));
        assert!(header.trim_end().ends_with("Sun"));
        assert!(text.contains("standup notes"));
        assert!(text.contains("[15]"));
        assert!(text.contains("Feb 26"));
    }

    #[test]
    fn hidden_weekends_drop_columns() {
        let text = render_calendar(&march(false), Some(&[]), OverflowToggle::Collapsed);
        let header = text.lines().nth(1).expect("header");
        assert!(!header.contains("Sat"));
        assert!(!header.contains("Sun"));
        assert!(header.trim_end().ends_with("Fri"));
    }

    #[test]
    fn crowded_day_shows_more_then_hide() {
        let issues = (0..6)
            .map(|idx| sample_issue(&format!("task {idx}"), Some("2024-03-12")))
            .collect::<Vec<_>>();

        let collapsed = render_calendar(&march(true), Some(&issues), OverflowToggle::Collapsed);
        assert!(collapsed.contains("+2 more"));
        assert!(collapsed.contains("task 3"));
        assert!(!collapsed.contains("task 4"));

        let expanded = render_calendar(&march(true), Some(&issues), OverflowToggle::Expanded);
        assert!(expanded.contains("task 5"));
        assert!(expanded.contains("Hide"));
        assert!(!expanded.contains("more"));
    }

    #[test]
    fn long_names_are_truncated_by_width() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate("a very long issue name indeed", 10);
        assert!(UnicodeWidthStr::width(cut.as_str()) <= 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn my_issues_groups_and_due_labels() {
        let mut late = sample_issue("late", Some("2024-03-10"));
        late.priority = Some(Priority::High);
        let mut soon = sample_issue("soon", Some("2024-03-17"));
        soon.priority = Some(Priority::High);
        let undated = sample_issue("undated", None);
        let issues = vec![late, soon, undated];

        let groups = group_issues(&issues, GroupBy::Priority);
        let mut out = Vec::new();
        Renderer::plain()
            .print_my_issues(
                &mut out,
                &groups,
                &DisplayProperties::default(),
                true,
                ymd(2024, 3, 15),
                3,
            )
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("high (2)"));
        assert!(text.contains("None (1)"));
        assert!(text.contains("Due date has passed by 5 days"));
        assert!(text.contains("Due date is in 2 days"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn empty_list_says_so() {
        let mut out = Vec::new();
        Renderer::plain()
            .print_my_issues(
                &mut out,
                &[],
                &DisplayProperties::default(),
                false,
                ymd(2024, 3, 15),
                3,
            )
            .expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "No issues assigned to you.\n"
        );
    }

    #[test]
    fn strip_ansi_keeps_visible_text() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
