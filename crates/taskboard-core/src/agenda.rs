//! Due-date views: tasks grouped by day
//! for one month, and the overdue / today /
//! upcoming summary.

use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Days,
  NaiveDate
};

use crate::task::Task;

pub const DEFAULT_UPCOMING_DAYS: u32 = 7;

/// Tasks due on each day of `year`-`month`
/// that has at least one task.
pub fn month(
  tasks: &[Task],
  year: i32,
  month: u32
) -> anyhow::Result<BTreeMap<NaiveDate, Vec<Task>>>
{
  NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| {
      anyhow!(
        "invalid month: \
         {year}-{month:02}"
      )
    })?;

  let mut days: BTreeMap<
    NaiveDate,
    Vec<Task>
  > = BTreeMap::new();
  for task in tasks {
    let Some(due) = task.due_date else {
      continue;
    };
    if due.year() == year
      && due.month() == month
    {
      days
        .entry(due)
        .or_default()
        .push(task.clone());
    }
  }
  Ok(days)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
  /// Due before today and not done.
  pub overdue:  Vec<Task>,
  pub today:    Vec<Task>,
  /// Due after today, within the
  /// upcoming window.
  pub upcoming: Vec<Task>
}

pub fn summary(
  tasks: &[Task],
  today: NaiveDate,
  upcoming_days: u32
) -> Summary {
  // Saturates at the last representable
  // date.
  let horizon = today
    .checked_add_days(Days::new(u64::from(
      upcoming_days
    )))
    .unwrap_or(NaiveDate::MAX);
  let mut out = Summary::default();

  for task in tasks {
    let Some(due) = task.due_date else {
      continue;
    };
    if task.is_overdue(today) {
      out.overdue.push(task.clone());
    } else if due == today {
      out.today.push(task.clone());
    } else if due > today && due <= horizon
    {
      out.upcoming.push(task.clone());
    }
  }

  out
    .overdue
    .sort_by_key(|task| task.due_date);
  out
    .upcoming
    .sort_by_key(|task| task.due_date);
  out
}
