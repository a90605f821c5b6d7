use std::collections::BTreeMap;

use tracing::trace;

use crate::task::{
  Priority,
  Status,
  Task
};

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub enum PriorityFilter {
  #[default]
  Any,
  None,
  Is(Priority)
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub enum DueFilter {
  #[default]
  Any,
  HasDue,
  NoDue
}

/// Conjunctive task query. The default
/// filter matches everything.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskFilter {
  /// Case-insensitive substring of the
  /// title.
  pub text:     String,
  /// Every listed tag must be present.
  pub tags:     Vec<String>,
  pub status:   Option<Status>,
  pub priority: PriorityFilter,
  pub due:      DueFilter
}

impl TaskFilter {
  pub fn text(
    text: impl Into<String>
  ) -> Self {
    Self {
      text: text.into(),
      ..Self::default()
    }
  }

  pub fn tags<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>
  {
    Self {
      tags: tags
        .into_iter()
        .map(Into::into)
        .collect(),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.text.trim().is_empty()
      && self.tags.is_empty()
      && self.status.is_none()
      && self.priority
        == PriorityFilter::Any
      && self.due == DueFilter::Any
  }

  #[tracing::instrument(skip(
    self, task
  ), fields(id = %task.id))]
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let ok = self.matches_text(task)
      && self.matches_tags(task)
      && self.matches_status(task)
      && self.matches_priority(task)
      && self.matches_due(task);
    trace!(ok, "evaluated task filter");
    ok
  }

  /// Matching tasks, cloned, in input
  /// order.
  pub fn apply(
    &self,
    tasks: &[Task]
  ) -> Vec<Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task))
      .cloned()
      .collect()
  }

  fn matches_text(
    &self,
    task: &Task
  ) -> bool {
    let needle = self.text.trim();
    if needle.is_empty() {
      return true;
    }
    task
      .title
      .to_lowercase()
      .contains(&needle.to_lowercase())
  }

  fn matches_tags(
    &self,
    task: &Task
  ) -> bool {
    self
      .tags
      .iter()
      .all(|tag| task.has_tag(tag))
  }

  fn matches_status(
    &self,
    task: &Task
  ) -> bool {
    self
      .status
      .is_none_or(|status| {
        task.status == status
      })
  }

  fn matches_priority(
    &self,
    task: &Task
  ) -> bool {
    match self.priority {
      | PriorityFilter::Any => true,
      | PriorityFilter::None => {
        task.priority.is_none()
      }
      | PriorityFilter::Is(priority) => {
        task.priority == Some(priority)
      }
    }
  }

  fn matches_due(
    &self,
    task: &Task
  ) -> bool {
    match self.due {
      | DueFilter::Any => true,
      | DueFilter::HasDue => {
        task.due_date.is_some()
      }
      | DueFilter::NoDue => {
        task.due_date.is_none()
      }
    }
  }
}

/// Every tag in use with the number of
/// tasks carrying it, sorted by tag.
pub fn tag_facets(
  tasks: &[Task]
) -> Vec<(String, usize)> {
  let mut counts = BTreeMap::new();
  for task in tasks {
    for tag in &task.tags {
      *counts
        .entry(tag.clone())
        .or_insert(0_usize) += 1;
    }
  }
  counts.into_iter().collect()
}
