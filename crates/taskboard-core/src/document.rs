//! Persisted document layout.
//!
//! The canonical shape is a flat JSON array of task objects in collection
//! order. Older boards stored an array of column objects
//! (`{id, title, status, tasks: [...]}`); those are still readable and are
//! flattened column by column, with every task taking its column's status.

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::task::{
  Status,
  Task
};

#[derive(Debug, Deserialize)]
struct StoredColumn {
  status: Status,
  #[serde(default)]
  tasks:  Vec<Task>
}

pub fn encode(
  tasks: &[Task]
) -> anyhow::Result<String> {
  serde_json::to_string_pretty(tasks)
    .context(
      "failed to serialize task \
       document"
    )
}

#[tracing::instrument(skip(text), fields(bytes = text.len()))]
pub fn decode(
  text: &str
) -> anyhow::Result<Vec<Task>> {
  let value: Value =
    serde_json::from_str(text)
      .context(
        "task document is not valid \
         JSON"
      )?;

  let Value::Array(items) = value
  else {
    return Err(anyhow!(
      "task document must be a JSON \
       array"
    ));
  };

  if is_column_layout(&items) {
    debug!(
      columns = items.len(),
      "decoding column layout"
    );
    return decode_columns(items);
  }

  items
    .into_iter()
    .enumerate()
    .map(|(idx, item)| {
      serde_json::from_value::<Task>(
        item
      )
      .with_context(|| {
        format!(
          "invalid task at index {idx}"
        )
      })
    })
    .collect()
}

fn is_column_layout(
  items: &[Value]
) -> bool {
  !items.is_empty()
    && items.iter().all(|item| {
      item
        .get("tasks")
        .is_some_and(Value::is_array)
    })
}

fn decode_columns(
  items: Vec<Value>
) -> anyhow::Result<Vec<Task>> {
  let mut out = Vec::new();
  for (idx, item) in
    items.into_iter().enumerate()
  {
    let column: StoredColumn =
      serde_json::from_value(item)
        .with_context(|| {
          format!(
            "invalid column at index \
             {idx}"
          )
        })?;
    for mut task in column.tasks {
      task.status = column.status;
      out.push(task);
    }
  }
  Ok(out)
}
