//! Calendar view state: which days are
//! visible for a reference date, view
//! mode and weekend setting.
//!
//! Every navigation is a
//! [`CalendarAction`] folded into a new
//! [`ViewState`] by [`ViewState::reduce`],
//! so the state never changes behind the
//! caller's back.

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  date_with_clamped_day,
  end_of_week,
  first_day_of_month,
  is_weekend,
  last_day_of_month,
  render_date_format,
  shift_months,
  start_of_week
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  Monthly,
  Weekly
}

impl ViewMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Monthly => "monthly",
      | Self::Weekly => "weekly"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "monthly" | "month" => {
        Some(Self::Monthly)
      }
      | "weekly" | "week" => {
        Some(Self::Weekly)
      }
      | _ => None
    }
  }
}

/// Navigation direction for the
/// prev/next controls.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Step {
  Back,
  Forward
}

impl Step {
  pub fn sign(self) -> i32 {
    match self {
      | Self::Back => -1,
      | Self::Forward => 1
    }
  }
}

/// Inclusive day interval shown by the
/// calendar. `start <= end` always.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct VisibleRange {
  pub start: NaiveDate,
  pub end:   NaiveDate
}

impl VisibleRange {
  pub fn new(
    a: NaiveDate,
    b: NaiveDate
  ) -> Self {
    if a <= b {
      Self { start: a, end: b }
    } else {
      Self { start: b, end: a }
    }
  }

  pub fn contains(
    &self,
    day: NaiveDate
  ) -> bool {
    day >= self.start && day <= self.end
  }

  pub fn len_days(&self) -> usize {
    self
      .end
      .signed_duration_since(self.start)
      .num_days() as usize
      + 1
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = NaiveDate>
  {
    let start = self.start;
    (0..self.len_days() as i64)
      .map(move |offset| {
        add_days(start, offset)
      })
  }

  /// Range filter understood by the
  /// issue API:
  /// `<start>;after,<end>;before`.
  pub fn target_date_filter(
    &self
  ) -> String {
    format!(
      "{};after,{};before",
      render_date_format(self.start),
      render_date_format(self.end)
    )
  }
}

/// Visible interval for `reference` in
/// `mode`. Monthly covers every grid
/// week touching the month; weekly is
/// the reference date's own week.
pub fn visible_range_for(
  reference: NaiveDate,
  mode: ViewMode,
  week_start: Weekday
) -> VisibleRange {
  match mode {
    | ViewMode::Monthly => {
      let first = first_day_of_month(
        reference.year(),
        reference.month()
      );
      let last = last_day_of_month(
        reference.year(),
        reference.month()
      );
      VisibleRange::new(
        start_of_week(first, week_start),
        end_of_week(last, week_start)
      )
    }
    | ViewMode::Weekly => {
      VisibleRange::new(
        start_of_week(
          reference, week_start
        ),
        end_of_week(
          reference, week_start
        )
      )
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarAction {
  SetReferenceDate(NaiveDate),
  StepMonth(Step),
  StepWeek(Step),
  /// Prev/next in whatever unit the
  /// active mode uses.
  Step(Step),
  SetViewMode(ViewMode),
  ToggleWeekends,
  JumpToToday(NaiveDate),
  PickYear(i32),
  /// 1-based; out-of-range values
  /// overflow into neighbouring years.
  PickMonth(i32)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ViewState {
  reference:     NaiveDate,
  mode:          ViewMode,
  show_weekends: bool,
  week_start:    Weekday,
  range:         VisibleRange
}

impl ViewState {
  pub fn new(
    reference: NaiveDate,
    mode: ViewMode,
    show_weekends: bool,
    week_start: Weekday
  ) -> Self {
    Self {
      reference,
      mode,
      show_weekends,
      week_start,
      range: visible_range_for(
        reference, mode, week_start
      )
    }
  }

  pub fn reference(&self) -> NaiveDate {
    self.reference
  }

  pub fn mode(&self) -> ViewMode {
    self.mode
  }

  pub fn show_weekends(&self) -> bool {
    self.show_weekends
  }

  pub fn week_start(&self) -> Weekday {
    self.week_start
  }

  pub fn range(&self) -> VisibleRange {
    self.range
  }

  #[must_use]
  pub fn reduce(
    self,
    action: CalendarAction
  ) -> Self {
    let next = match action {
      | CalendarAction::SetReferenceDate(
        date
      ) => self.with_reference(date),
      | CalendarAction::StepMonth(step) => {
        self.with_reference(shift_months(
          self.reference,
          step.sign()
        ))
      }
      | CalendarAction::StepWeek(step) => {
        self.with_reference(add_days(
          self.reference,
          i64::from(step.sign()) * 7
        ))
      }
      | CalendarAction::Step(step) => {
        match self.mode {
          | ViewMode::Monthly => self
            .reduce(
              CalendarAction::StepMonth(
                step
              )
            ),
          | ViewMode::Weekly => self
            .reduce(
              CalendarAction::StepWeek(
                step
              )
            )
        }
      }
      | CalendarAction::SetViewMode(
        mode
      ) => Self::new(
        self.reference,
        mode,
        self.show_weekends,
        self.week_start
      ),
      | CalendarAction::ToggleWeekends => {
        Self {
          show_weekends: !self
            .show_weekends,
          ..self
        }
      }
      | CalendarAction::JumpToToday(
        today
      ) => self.with_reference(today),
      | CalendarAction::PickYear(year) => {
        self.with_reference(
          date_with_clamped_day(
            year,
            self.reference.month() as i32,
            self.reference.day()
          )
        )
      }
      | CalendarAction::PickMonth(
        month
      ) => self.with_reference(
        date_with_clamped_day(
          self.reference.year(),
          month,
          self.reference.day()
        )
      )
    };

    if next.range != self.range {
      tracing::debug!(
        ?action,
        start = %next.range.start,
        end = %next.range.end,
        "visible range changed"
      );
    }
    next
  }

  fn with_reference(
    self,
    reference: NaiveDate
  ) -> Self {
    Self::new(
      reference,
      self.mode,
      self.show_weekends,
      self.week_start
    )
  }

  /// Days that get a column, in order.
  /// Weekends drop out when hidden.
  pub fn visible_days(
    &self
  ) -> Vec<NaiveDate> {
    let show_weekends =
      self.show_weekends;
    self
      .range
      .days()
      .filter(|day| {
        show_weekends || !is_weekend(*day)
      })
      .collect()
  }

  pub fn column_count(&self) -> usize {
    if self.show_weekends { 7 } else { 5 }
  }

  /// Weekday labels for the header row,
  /// taken from the first grid row.
  pub fn weekday_headers(
    &self
  ) -> Vec<Weekday> {
    self
      .visible_days()
      .into_iter()
      .take(self.column_count())
      .map(|day| day.weekday())
      .collect()
  }

  pub fn title(&self) -> String {
    self
      .reference
      .format("%B %Y")
      .to_string()
  }
}
