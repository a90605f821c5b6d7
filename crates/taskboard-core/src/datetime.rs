use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timezone used to decide what "today"
/// is. `None` means the machine's local
/// time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayClock {
  tz: Option<Tz>
}

impl DayClock {
  pub fn local() -> Self {
    Self::default()
  }

  pub fn in_timezone(tz: Tz) -> Self {
    Self {
      tz: Some(tz)
    }
  }

  pub fn parse(
    name: &str
  ) -> anyhow::Result<Self> {
    let tz =
      name.trim().parse::<Tz>().map_err(
        |err| {
          anyhow!(
            "invalid timezone \
             {name:?}: {err}"
          )
        }
      )?;
    Ok(Self::in_timezone(tz))
  }

  #[must_use]
  pub fn date_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self.tz {
      | Some(tz) => {
        instant
          .with_timezone(&tz)
          .date_naive()
      }
      | None => {
        instant
          .with_timezone(&Local)
          .date_naive()
      }
    }
  }

  #[must_use]
  pub fn today(&self) -> NaiveDate {
    self.date_of(Utc::now())
  }
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Parses a due date expression relative
/// to `today`.
///
/// Accepted forms: `YYYY-MM-DD`, an ISO
/// datetime (its date part), `today`,
/// `tomorrow`, `yesterday`, a weekday name
/// (next occurrence after today), and
/// offsets like `+3d` or `2w`.
#[tracing::instrument(skip(today))]
pub fn parse_due_date(
  expr: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let raw = expr.trim();
  if raw.is_empty() {
    return Err(anyhow!(
      "date expression cannot be empty"
    ));
  }
  let lower = raw.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(
        today + Duration::days(1)
      );
    }
    | "yesterday" => {
      return Ok(
        today - Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday(&lower)
  {
    return Ok(next_weekday(
      today, weekday
    ));
  }

  let rel_re = Regex::new(
    r"^\+?(?P<num>\d{1,4})(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let amount: i64 = caps["num"]
      .parse()
      .with_context(|| {
        format!(
          "invalid offset in {raw:?}"
        )
      })?;
    let days = match &caps["unit"] {
      | "w" => amount * 7,
      | _ => amount
    };
    return Ok(
      today + Duration::days(days)
    );
  }

  let date_part = raw
    .split_once('T')
    .map_or(raw, |(date, _)| date);
  NaiveDate::parse_from_str(
    date_part,
    DATE_FORMAT
  )
  .with_context(|| {
    format!(
      "unrecognized date expression: \
       {raw}"
    )
  })
}

fn parse_weekday(
  lower: &str
) -> Option<Weekday> {
  let weekday = match lower {
    | "monday" | "mon" => Weekday::Mon,
    | "tuesday" | "tue" => Weekday::Tue,
    | "wednesday" | "wed" => {
      Weekday::Wed
    }
    | "thursday" | "thu" => Weekday::Thu,
    | "friday" | "fri" => Weekday::Fri,
    | "saturday" | "sat" => Weekday::Sat,
    | "sunday" | "sun" => Weekday::Sun,
    | _ => return None
  };
  Some(weekday)
}

fn next_weekday(
  today: NaiveDate,
  weekday: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let target =
    weekday.num_days_from_monday() as i64;
  let mut delta = target - current;
  if delta <= 0 {
    delta += 7;
  }
  today + Duration::days(delta)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    DayClock,
    parse_due_date
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_dates_and_datetimes() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("2026-03-05", today)
        .unwrap(),
      day(2026, 3, 5)
    );
    assert_eq!(
      parse_due_date(
        "2026-03-05T12:00:00.000Z",
        today
      )
      .unwrap(),
      day(2026, 3, 5)
    );
  }

  #[test]
  fn parses_named_days() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("Tomorrow", today)
        .unwrap(),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_date("yesterday", today)
        .unwrap(),
      day(2026, 2, 16)
    );
  }

  #[test]
  fn weekday_is_strictly_after_today() {
    // 2026-02-17 is a Tuesday.
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("wednesday", today)
        .unwrap(),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_date("tue", today)
        .unwrap(),
      day(2026, 2, 24)
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("+3d", today)
        .unwrap(),
      day(2026, 2, 20)
    );
    assert_eq!(
      parse_due_date("2w", today)
        .unwrap(),
      day(2026, 3, 3)
    );
  }

  #[test]
  fn rejects_garbage() {
    let today = day(2026, 2, 17);
    assert!(
      parse_due_date("", today).is_err()
    );
    assert!(
      parse_due_date("someday", today)
        .is_err()
    );
    assert!(
      parse_due_date("2026-02-30", today)
        .is_err()
    );
  }

  #[test]
  fn timezone_decides_the_calendar_day() {
    let instant = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 3, 0, 0
      )
      .unwrap();
    let mexico =
      DayClock::parse("America/Mexico_City")
        .unwrap();
    let tokyo =
      DayClock::parse("Asia/Tokyo")
        .unwrap();

    assert_eq!(
      mexico.date_of(instant),
      day(2026, 2, 16)
    );
    assert_eq!(
      tokyo.date_of(instant),
      day(2026, 2, 17)
    );
    assert!(
      DayClock::parse("Mars/Olympus")
        .is_err()
    );
  }
}
