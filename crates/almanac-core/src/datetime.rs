use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;

/// Textual date format used by the
/// issue API, both for `target_date`
/// values and range filters.
pub const ISSUE_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[must_use]
pub fn render_date_format(
  date: NaiveDate
) -> String {
  date
    .format(ISSUE_DATE_FORMAT)
    .to_string()
}

/// Reduce an issue date string to its
/// calendar day. Accepts plain dates and
/// datetimes; the time of day is dropped
/// without timezone conversion.
pub fn parse_issue_day(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  let date_part = trimmed
    .split(['T', ' '])
    .next()
    .unwrap_or(trimmed);
  NaiveDate::parse_from_str(
    date_part,
    ISSUE_DATE_FORMAT
  )
  .ok()
}

pub fn parse_week_start(
  raw: &str
) -> Weekday {
  if raw
    .trim()
    .eq_ignore_ascii_case("sunday")
  {
    Weekday::Sun
  } else {
    Weekday::Mon
  }
}


pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(error) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %error,
        "invalid timezone id"
      );
      None
    }
  }
}

pub fn today_in_timezone(
  timezone: Tz
) -> NaiveDate {
  date_in_timezone(Utc::now(), timezone)
}

pub fn date_in_timezone(
  now: DateTime<Utc>,
  timezone: Tz
) -> NaiveDate {
  now
    .with_timezone(&timezone)
    .date_naive()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

/// Fold an unbounded month number into
/// `1..=12`, carrying into the year.
/// Month 13 is January of the next
/// year, month 0 December of the
/// previous one.
pub fn normalize_month(
  year: i32,
  month: i32
) -> (i32, u32) {
  let zero_based =
    i64::from(month) - 1;
  let year = (i64::from(year)
    + zero_based.div_euclid(12))
  .clamp(
    i64::from(i32::MIN),
    i64::from(i32::MAX)
  ) as i32;
  let month =
    zero_based.rem_euclid(12) as u32 + 1;
  (year, month)
}

/// Build a date from a possibly
/// overflowing month, clamping the day
/// to the length of the resulting month.
pub fn date_with_clamped_day(
  year: i32,
  month: i32,
  day: u32
) -> NaiveDate {
  let (year, month) =
    normalize_month(year, month);
  let day =
    day.min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or_else(|| {
    first_day_of_month(year, month)
  })
}

pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  date_with_clamped_day(
    date.year(),
    date.month() as i32 + months,
    date.day()
  )
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn end_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  add_days(
    start_of_week(day, week_start),
    6
  )
}

pub fn is_weekend(
  date: NaiveDate
) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

/// Whole days from `today` until `date`;
/// negative once the date has passed.
pub fn days_until(
  today: NaiveDate,
  date: NaiveDate
) -> i64 {
  date
    .signed_duration_since(today)
    .num_days()
}
