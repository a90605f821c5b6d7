use serde::Serialize;

use crate::task::{
  Status,
  Task
};

/// One status partition of the board.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct Column {
  pub status: Status,
  pub title:  &'static str,
  pub tasks:  Vec<Task>
}

/// Read-only grouping of a task list into
/// the three status columns, in board
/// order. Tasks keep their relative order.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct Board {
  pub columns: [Column; 3]
}

impl Board {
  pub fn from_tasks<'a, I>(
    tasks: I
  ) -> Self
  where
    I: IntoIterator<Item = &'a Task>
  {
    let mut columns =
      Status::ALL.map(|status| Column {
        status,
        title: status.title(),
        tasks: vec![]
      });

    for task in tasks {
      columns[column_index(task.status)]
        .tasks
        .push(task.clone());
    }

    Self {
      columns
    }
  }

  pub fn column(
    &self,
    status: Status
  ) -> &Column {
    &self.columns[column_index(status)]
  }

  pub fn len(&self) -> usize {
    self
      .columns
      .iter()
      .map(|column| column.tasks.len())
      .sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn column_index(status: Status) -> usize {
  match status {
    | Status::Todo => 0,
    | Status::InProgress => 1,
    | Status::Done => 2
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::Board;
  use crate::task::{
    Status,
    Task
  };

  #[test]
  fn partitions_keep_collection_order() {
    let now = Utc::now();
    let tasks = vec![
      Task::new("a".into(), Status::Done, now),
      Task::new("b".into(), Status::Todo, now),
      Task::new("c".into(), Status::Done, now),
    ];

    let board = Board::from_tasks(&tasks);
    let done: Vec<&str> = board
      .column(Status::Done)
      .tasks
      .iter()
      .map(|t| t.title.as_str())
      .collect();

    assert_eq!(done, vec!["a", "c"]);
    assert_eq!(board.column(Status::Todo).tasks.len(), 1);
    assert!(board.column(Status::InProgress).tasks.is_empty());
    assert_eq!(board.len(), 3);
    assert_eq!(board.columns[1].title, "In Progress");
  }

  #[test]
  fn empty_collection_still_has_three_columns() {
    let board = Board::from_tasks(&Vec::<Task>::new());
    assert!(board.is_empty());
    assert_eq!(board.columns.len(), 3);
  }
}
