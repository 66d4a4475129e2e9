use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::datetime::ISSUE_DATE_FORMAT;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

fn parse_day(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ISSUE_DATE_FORMAT)
        .map_err(|e| anyhow!("expected a YYYY-MM-DD date, got {raw}: {e}"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "almanac",
    version,
    about = "Almanac: issue calendar for the terminal",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the month or week grid of scheduled issues.
    Calendar(CalendarArgs),
    /// Move an issue from one day to another.
    Move {
        issue: Uuid,
        #[arg(value_parser = parse_day)]
        from: NaiveDate,
        #[arg(value_parser = parse_day)]
        to: NaiveDate,
    },
    /// Create an issue due on a given day.
    Add {
        #[arg(value_parser = parse_day)]
        date: NaiveDate,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// List issues assigned to you.
    Mine {
        #[arg(long = "group-by")]
        group_by: Option<String>,
    },
    /// Change priority or due date of one of your issues.
    Update(UpdateArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CalendarArgs {
    /// Reference date; defaults to today.
    #[arg(long, value_parser = parse_day)]
    pub date: Option<NaiveDate>,

    #[arg(long, conflicts_with = "monthly")]
    pub weekly: bool,

    #[arg(long)]
    pub monthly: bool,

    #[arg(long, conflicts_with = "no_weekends")]
    pub weekends: bool,

    #[arg(long = "no-weekends")]
    pub no_weekends: bool,

    /// Step back N months or weeks.
    #[arg(long, value_name = "N", conflicts_with = "next")]
    pub prev: Option<u32>,

    /// Step forward N months or weeks.
    #[arg(long, value_name = "N")]
    pub next: Option<u32>,

    /// Start from today, ignoring --date.
    #[arg(long)]
    pub today: bool,

    /// Show every issue per day instead of the first four.
    #[arg(long)]
    pub all: bool,

    #[arg(long, conflicts_with = "module")]
    pub cycle: Option<Uuid>,

    #[arg(long)]
    pub module: Option<Uuid>,

    /// Extra KEY=VALUE filters forwarded to the issue API.
    #[arg(
        long = "filter",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub filters: Vec<KeyVal>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    pub issue: Uuid,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long, value_parser = parse_day, conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    #[arg(long = "clear-due")]
    pub clear_due: bool,

    #[arg(long)]
    pub name: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_requires_equals() {
        let kv: KeyVal = "calendar.view = weekly".parse().expect("kv");
        assert_eq!(kv.key, "calendar.view");
        assert_eq!(kv.value, "weekly");
        assert!("calendar.view".parse::<KeyVal>().is_err());
    }

    #[test]
    fn calendar_flags_parse() {
        let cli = GlobalCli::try_parse_from([
            "almanac",
            "-vv",
            "calendar",
            "--date",
            "2024-03-15",
            "--weekly",
            "--no-weekends",
            "--next",
            "2",
            "--rc",
            "calendar.week_start=sunday",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides.len(), 1);
        let Command::Calendar(args) = cli.command else {
            panic!("expected calendar command");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert!(args.weekly);
        assert!(args.no_weekends);
        assert_eq!(args.next, Some(2));
    }

    #[test]
    fn move_parses_dates() {
        let cli = GlobalCli::try_parse_from([
            "almanac",
            "move",
            "0d7e3c1a-2b4c-4d5e-8f90-a1b2c3d4e5f6",
            "2024-03-10",
            "2024-03-12",
        ])
        .expect("parse");
        let Command::Move { from, to, .. } = cli.command else {
            panic!("expected move command");
        };
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 3, 10).expect("date"));
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 12).expect("date"));
    }

    #[test]
    fn bad_dates_and_conflicts_are_rejected() {
        assert!(GlobalCli::try_parse_from(["almanac", "calendar", "--date", "03/15/2024"]).is_err());
        assert!(
            GlobalCli::try_parse_from(["almanac", "calendar", "--weekly", "--monthly"]).is_err()
        );
        assert!(
            GlobalCli::try_parse_from([
                "almanac",
                "update",
                "0d7e3c1a-2b4c-4d5e-8f90-a1b2c3d4e5f6",
                "--due",
                "2024-03-01",
                "--clear-due",
            ])
            .is_err()
        );
    }

    #[test]
    fn add_joins_name_words() {
        let cli =
            GlobalCli::try_parse_from(["almanac", "add", "2024-03-04", "plan", "sprint"]).expect("parse");
        let Command::Add { name, .. } = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(name.join(" "), "plan sprint");
    }
}
