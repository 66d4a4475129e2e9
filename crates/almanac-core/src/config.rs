use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};
use uuid::Uuid;

use crate::datetime::{
  parse_timezone,
  parse_week_start
};
use crate::my_issues::{
  DisplayProperties,
  GroupBy
};
use crate::range::ViewMode;

const CONFIG_FILE_NAME: &str =
  "almanac.toml";
const CONFIG_ENV_VAR: &str =
  "ALMANAC_CONFIG";
const TOKEN_ENV_VAR: &str =
  "ALMANAC_API_TOKEN";
const DEFAULT_BASE_URL: &str =
  "http://localhost:8000";

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
#[serde(default)]
pub struct Config {
  pub api:       ApiConfig,
  pub workspace: WorkspaceConfig,
  pub calendar:  CalendarConfig,
  pub my_issues: MyIssuesConfig,
  pub display:   DisplayConfig,
  #[serde(skip)]
  pub loaded_from: Option<PathBuf>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url:     String,
  pub token:        Option<String>,
  pub timeout_secs: u64
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL
        .to_string(),
      token:        None,
      timeout_secs:
        default_timeout_secs()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
#[serde(default)]
pub struct WorkspaceConfig {
  pub slug:    String,
  pub project: Option<Uuid>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct CalendarConfig {
  pub view:          ViewMode,
  pub show_weekends: bool,
  pub week_start:    String,
  pub timezone:      Option<String>
}

impl Default for CalendarConfig {
  fn default() -> Self {
    Self {
      view:          ViewMode::Monthly,
      show_weekends: false,
      week_start:
        default_week_start(),
      timezone:      None
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct MyIssuesConfig {
  pub group_by:      GroupBy,
  pub due_soon_days: i64,
  pub properties:    DisplayProperties
}

impl Default for MyIssuesConfig {
  fn default() -> Self {
    Self {
      group_by:      GroupBy::None,
      due_soon_days:
        default_due_soon_days(),
      properties:
        DisplayProperties::default()
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct DisplayConfig {
  pub color: bool
}

impl Default for DisplayConfig {
  fn default() -> Self {
    Self { color: true }
  }
}

fn default_week_start() -> String {
  "monday".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_due_soon_days() -> i64 {
  3
}

impl Config {
  #[tracing::instrument]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg =
      match resolve_config_path(
        override_path
      ) {
        | Some(path) if path.exists() => {
          info!(config = %path.display(), "loading config");
          let mut cfg =
            Self::from_file(&path)?;
          cfg.loaded_from = Some(path);
          cfg
        }
        | Some(path) => {
          if override_path.is_some() {
            return Err(anyhow!(
              "config file {} does not \
               exist",
              path.display()
            ));
          }
          warn!(
            config = %path.display(),
            "no config file found; using \
             defaults"
          );
          Self::default()
        }
        | None => {
          warn!(
            "cannot determine config \
             directory; using defaults"
          );
          Self::default()
        }
      };

    if let Ok(token) =
      std::env::var(TOKEN_ENV_VAR)
      && !token.trim().is_empty()
    {
      debug!(
        "api token taken from \
         environment"
      );
      cfg.api.token =
        Some(token.trim().to_string());
    }

    cfg.sanitize();
    Ok(cfg)
  }

  pub fn from_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    Self::from_toml_str(&text)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Config =
      toml::from_str(text)?;
    cfg.sanitize();
    Ok(cfg)
  }

  /// Apply `section.key=value` pairs on
  /// top of the loaded file.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key.trim();
      let value = value.trim();
      debug!(key, value, "applying override");
      self.set(key, value)?;
    }
    self.sanitize();
    Ok(())
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "api.base_url" => {
        self.api.base_url =
          value.to_string();
      }
      | "api.token" => {
        self.api.token =
          Some(value.to_string());
      }
      | "api.timeout_secs" => {
        self.api.timeout_secs =
          value.parse().with_context(
            || {
              format!(
                "invalid timeout: \
                 {value}"
              )
            }
          )?;
      }
      | "workspace.slug" => {
        self.workspace.slug =
          value.to_string();
      }
      | "workspace.project" => {
        self.workspace.project =
          Some(
            Uuid::parse_str(value)
              .with_context(|| {
                format!(
                  "invalid project id: \
                   {value}"
                )
              })?
          );
      }
      | "calendar.view" => {
        self.calendar.view =
          ViewMode::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid calendar view: \
                 {value}"
              )
            })?;
      }
      | "calendar.show_weekends" => {
        self.calendar.show_weekends =
          parse_bool(value);
      }
      | "calendar.week_start" => {
        self.calendar.week_start =
          value.to_string();
      }
      | "calendar.timezone" => {
        self.calendar.timezone =
          Some(value.to_string());
      }
      | "my_issues.group_by" => {
        self.my_issues.group_by =
          GroupBy::from_key(value)
            .ok_or_else(|| {
              anyhow!(
                "invalid group_by: \
                 {value}"
              )
            })?;
      }
      | "my_issues.due_soon_days" => {
        self.my_issues.due_soon_days =
          value.parse().with_context(
            || {
              format!(
                "invalid due_soon_days: \
                 {value}"
              )
            }
          )?;
      }
      | "display.color" => {
        self.display.color =
          parse_bool(value);
      }
      | other => {
        if let Some(property) = other
          .strip_prefix(
            "my_issues.properties."
          )
        {
          return self
            .my_issues
            .properties
            .set(
              property,
              parse_bool(value)
            );
        }
        return Err(anyhow!(
          "unknown config key: {other}"
        ));
      }
    }
    Ok(())
  }

  fn sanitize(&mut self) {
    let week_start =
      self.calendar.week_start.trim();
    if week_start.is_empty() {
      self.calendar.week_start =
        default_week_start();
    } else if !week_start
      .eq_ignore_ascii_case("monday")
      && !week_start
        .eq_ignore_ascii_case("sunday")
    {
      warn!(
        week_start,
        "unsupported week start; using \
         monday"
      );
      self.calendar.week_start =
        default_week_start();
    }

    if self.my_issues.due_soon_days <= 0
    {
      self.my_issues.due_soon_days =
        default_due_soon_days();
    }

    if self.api.timeout_secs == 0 {
      self.api.timeout_secs =
        default_timeout_secs();
    }

    let trimmed = self
      .api
      .base_url
      .trim()
      .trim_end_matches('/')
      .to_string();
    self.api.base_url =
      if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
      } else {
        trimmed
      };
  }

  pub fn week_start(&self) -> Weekday {
    parse_week_start(
      &self.calendar.week_start
    )
  }

  /// Timezone used to decide what
  /// "today" is; UTC unless configured.
  pub fn timezone(&self) -> Tz {
    self
      .calendar
      .timezone
      .as_deref()
      .and_then(|raw| {
        parse_timezone(
          raw,
          "calendar.timezone"
        )
      })
      .unwrap_or(chrono_tz::UTC)
  }

  pub fn require_workspace(
    &self
  ) -> anyhow::Result<&str> {
    let slug =
      self.workspace.slug.trim();
    if slug.is_empty() {
      return Err(anyhow!(
        "workspace.slug is not \
         configured"
      ));
    }
    Ok(slug)
  }

  pub fn require_project(
    &self
  ) -> anyhow::Result<Uuid> {
    self.workspace.project.ok_or_else(
      || {
        anyhow!(
          "workspace.project is not \
           configured"
        )
      }
    )
  }
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir
      .join("almanac")
      .join(CONFIG_FILE_NAME)
  })
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
