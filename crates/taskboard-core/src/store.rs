//! The task store: sole owner of the task
//! collection and of its persistence slot.
//!
//! Every effective mutation writes the full
//! collection back to the slot before the
//! call returns, then notifies subscribers.
//! A failed write is logged and remembered
//! in `last_persist_error`; the in-memory
//! collection stays authoritative.

use std::collections::HashSet;

use chrono::{
  DateTime,
  Utc
};
use tracing::{
  debug,
  info,
  warn
};

use crate::board::Board;
use crate::document;
use crate::error::ValidationError;
use crate::filter::{
  TaskFilter,
  tag_facets
};
use crate::slot::Slot;
use crate::task::{
  Status,
  Task,
  TaskDraft,
  TaskId,
  TaskPatch,
  normalize_description,
  normalize_tags
};

type Subscriber = Box<dyn FnMut(&[Task])>;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub struct SubscriptionId(u64);

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct ImportSummary {
  pub added:   usize,
  pub skipped: usize
}

pub struct TaskStore<S: Slot> {
  slot:               S,
  tasks:              Vec<Task>,
  subscribers:
    Vec<(SubscriptionId, Subscriber)>,
  next_subscription:  u64,
  last_persist_error: Option<String>,
  clock:              fn() -> DateTime<Utc>
}

impl<S: Slot> TaskStore<S> {
  /// Loads the collection from `slot`. A
  /// missing, unreadable or corrupt
  /// document yields an empty collection.
  #[tracing::instrument(skip_all, fields(slot = %slot.name()))]
  pub fn open(slot: S) -> Self {
    let loaded = match slot.read() {
      | Ok(Some(text)) => {
        match document::decode(&text) {
          | Ok(tasks) => tasks,
          | Err(err) => {
            warn!(
              slot = %slot.name(),
              error = %format!("{err:#}"),
              "stored task document is \
               corrupt; starting with an \
               empty board"
            );
            vec![]
          }
        }
      }
      | Ok(None) => {
        debug!(
          slot = %slot.name(),
          "slot is empty"
        );
        vec![]
      }
      | Err(err) => {
        warn!(
          slot = %slot.name(),
          error = %format!("{err:#}"),
          "failed to read slot; starting \
           with an empty board"
        );
        vec![]
      }
    };

    let tasks =
      dedupe_ids(drop_untitled(loaded));
    info!(
      slot = %slot.name(),
      count = tasks.len(),
      "task store opened"
    );

    Self::with_tasks(slot, tasks)
  }

  /// A store that ignores whatever the
  /// slot currently holds. Nothing is
  /// written until the first mutation.
  pub fn empty(slot: S) -> Self {
    Self::with_tasks(slot, vec![])
  }

  fn with_tasks(
    slot: S,
    tasks: Vec<Task>
  ) -> Self {
    Self {
      slot,
      tasks,
      subscribers: vec![],
      next_subscription: 0,
      last_persist_error: None,
      clock: Utc::now
    }
  }

  /// Replaces the timestamp source used for
  /// `createdAt` / `updatedAt`.
  #[must_use]
  pub fn with_clock(
    mut self,
    clock: fn() -> DateTime<Utc>
  ) -> Self {
    self.clock = clock;
    self
  }

  pub fn slot(&self) -> &S {
    &self.slot
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  pub fn get(
    &self,
    id: &TaskId
  ) -> Option<&Task> {
    self
      .tasks
      .iter()
      .find(|task| task.id == *id)
  }

  pub fn board(&self) -> Board {
    Board::from_tasks(&self.tasks)
  }

  pub fn search(
    &self,
    filter: &TaskFilter
  ) -> Vec<Task> {
    filter.apply(&self.tasks)
  }

  pub fn tag_facets(
    &self
  ) -> Vec<(String, usize)> {
    tag_facets(&self.tasks)
  }

  pub fn last_persist_error(
    &self
  ) -> Option<&str> {
    self.last_persist_error.as_deref()
  }

  #[tracing::instrument(skip_all, fields(
    title_len = draft.title.len(),
    status = %draft.status,
    tag_count = draft.tags.len()
  ))]
  pub fn create(
    &mut self,
    draft: TaskDraft
  ) -> Result<Task, ValidationError> {
    let title = draft.title.trim();
    if title.is_empty() {
      return Err(
        ValidationError::EmptyTitle
      );
    }

    let now = (self.clock)();
    let mut task = Task::new(
      title.to_string(),
      draft.status,
      now
    );
    while self.get(&task.id).is_some() {
      task.id = TaskId::generate();
    }
    task.description =
      normalize_description(
        draft.description
      );
    task.priority = draft.priority;
    task.due_date = draft.due_date;
    task.tags = normalize_tags(draft.tags);

    self.tasks.push(task.clone());
    debug!(
      id = %task.id,
      count = self.tasks.len(),
      "task created"
    );
    self.commit();
    Ok(task)
  }

  /// Merges `patch` into the task with
  /// `id`. `Ok(None)` means the task no
  /// longer exists and nothing changed.
  #[tracing::instrument(skip_all, fields(id = %id))]
  pub fn update(
    &mut self,
    id: &TaskId,
    patch: TaskPatch
  ) -> Result<Option<Task>, ValidationError>
  {
    let Some(idx) = self.position(id)
    else {
      debug!("update target not found");
      return Ok(None);
    };
    if patch.is_empty() {
      return Ok(Some(
        self.tasks[idx].clone()
      ));
    }

    let current = &self.tasks[idx];
    let mut updated = current.clone();
    if let Some(title) = patch.title {
      let title = title.trim();
      if title.is_empty() {
        return Err(
          ValidationError::EmptyTitle
        );
      }
      updated.title = title.to_string();
    }
    if let Some(description) =
      patch.description
    {
      updated.description =
        normalize_description(description);
    }
    if let Some(status) = patch.status {
      updated.status = status;
    }
    if let Some(priority) = patch.priority
    {
      updated.priority = priority;
    }
    if let Some(due_date) = patch.due_date
    {
      updated.due_date = due_date;
    }
    if let Some(tags) = patch.tags {
      updated.tags = normalize_tags(tags);
    }

    if updated == *current {
      debug!("patch changes nothing");
      return Ok(Some(updated));
    }

    let status_changed =
      updated.status != current.status;
    updated.updated_at =
      Some((self.clock)());
    self.tasks[idx] = updated.clone();
    if status_changed {
      self.relocate_to_end(idx);
    }

    debug!(
      status_changed,
      "task updated"
    );
    self.commit();
    Ok(Some(updated))
  }

  /// Moves a task between columns. Returns
  /// `false`, leaving everything untouched,
  /// when `from == to` or the task is not in
  /// `from`.
  #[tracing::instrument(skip_all, fields(id = %id, from = %from, to = %to))]
  pub fn move_task(
    &mut self,
    id: &TaskId,
    from: Status,
    to: Status
  ) -> bool {
    if from == to {
      return false;
    }

    let Some(idx) =
      self.tasks.iter().position(|task| {
        task.id == *id
          && task.status == from
      })
    else {
      debug!(
        "task not found in source column"
      );
      return false;
    };

    let task = &mut self.tasks[idx];
    task.status = to;
    task.updated_at =
      Some((self.clock)());
    self.relocate_to_end(idx);

    debug!("task moved");
    self.commit();
    true
  }

  #[tracing::instrument(skip_all, fields(id = %id))]
  pub fn delete(
    &mut self,
    id: &TaskId
  ) -> Option<Task> {
    let idx = self.position(id)?;
    let removed = self.tasks.remove(idx);
    debug!(
      count = self.tasks.len(),
      "task deleted"
    );
    self.commit();
    Some(removed)
  }

  /// Adds tasks from another document.
  /// Tasks whose id is already present, or
  /// whose title is empty, are skipped.
  #[tracing::instrument(skip_all, fields(incoming = incoming.len()))]
  pub fn import(
    &mut self,
    incoming: Vec<Task>
  ) -> ImportSummary {
    let mut summary =
      ImportSummary::default();
    let mut seen: HashSet<TaskId> = self
      .tasks
      .iter()
      .map(|task| task.id.clone())
      .collect();

    for mut task in incoming {
      if task.title.trim().is_empty()
        || !seen.insert(task.id.clone())
      {
        summary.skipped += 1;
        continue;
      }
      task.title =
        task.title.trim().to_string();
      self.tasks.push(task);
      summary.added += 1;
    }

    info!(
      added = summary.added,
      skipped = summary.skipped,
      "import finished"
    );
    if summary.added > 0 {
      self.commit();
    }
    summary
  }

  /// Registers a callback invoked with the
  /// full collection after every effective
  /// mutation.
  pub fn subscribe<F>(
    &mut self,
    callback: F
  ) -> SubscriptionId
  where
    F: FnMut(&[Task]) + 'static
  {
    let id =
      SubscriptionId(self.next_subscription);
    self.next_subscription += 1;
    self
      .subscribers
      .push((id, Box::new(callback)));
    id
  }

  pub fn unsubscribe(
    &mut self,
    id: SubscriptionId
  ) -> bool {
    let before = self.subscribers.len();
    self
      .subscribers
      .retain(|(sub, _)| *sub != id);
    self.subscribers.len() != before
  }

  fn position(
    &self,
    id: &TaskId
  ) -> Option<usize> {
    self
      .tasks
      .iter()
      .position(|task| task.id == *id)
  }

  fn relocate_to_end(
    &mut self,
    idx: usize
  ) {
    let task = self.tasks.remove(idx);
    self.tasks.push(task);
  }

  fn commit(&mut self) {
    self.persist();
    for (_, subscriber) in
      &mut self.subscribers
    {
      subscriber(&self.tasks);
    }
  }

  fn persist(&mut self) {
    let result =
      document::encode(&self.tasks)
        .and_then(|text| {
          self.slot.write(&text)
        });

    match result {
      | Ok(()) => {
        self.last_persist_error = None;
      }
      | Err(err) => {
        let message = format!("{err:#}");
        warn!(
          slot = %self.slot.name(),
          error = %message,
          "failed to persist tasks; \
           keeping in-memory state"
        );
        self.last_persist_error =
          Some(message);
      }
    }
  }
}

/// Trims titles and drops tasks left with
/// an empty one.
fn drop_untitled(
  tasks: Vec<Task>
) -> Vec<Task> {
  let before = tasks.len();
  let kept: Vec<Task> = tasks
    .into_iter()
    .filter_map(|mut task| {
      let title = task.title.trim();
      if title.is_empty() {
        return None;
      }
      task.title = title.to_string();
      Some(task)
    })
    .collect();

  if kept.len() != before {
    warn!(
      dropped = before - kept.len(),
      "dropped tasks with empty titles"
    );
  }
  kept
}

fn dedupe_ids(
  tasks: Vec<Task>
) -> Vec<Task> {
  let mut seen = HashSet::new();
  let before = tasks.len();
  let kept: Vec<Task> = tasks
    .into_iter()
    .filter(|task| {
      seen.insert(task.id.clone())
    })
    .collect();

  if kept.len() != before {
    warn!(
      dropped = before - kept.len(),
      "dropped tasks with duplicate ids"
    );
  }
  kept
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use chrono::{
    DateTime,
    TimeZone,
    Utc
  };

  use super::TaskStore;
  use crate::slot::MemorySlot;
  use crate::task::{
    Status,
    TaskDraft,
    TaskId,
    TaskPatch
  };

  fn fixed_clock() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .unwrap()
  }

  fn store() -> TaskStore<MemorySlot> {
    TaskStore::empty(MemorySlot::new(
      "tasks"
    ))
    .with_clock(fixed_clock)
  }

  #[test]
  fn create_assigns_unique_ids_and_defaults()
   {
    let mut store = store();
    let a = store
      .create(TaskDraft::new("a"))
      .unwrap();
    let b = store
      .create(TaskDraft::new("  b  "))
      .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.status, Status::Todo);
    assert_eq!(b.title, "b");
    assert_eq!(
      a.created_at,
      fixed_clock()
    );
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn empty_title_is_rejected_before_mutation()
   {
    let mut store = store();
    assert!(
      store
        .create(TaskDraft::new("   "))
        .is_err()
    );
    assert!(store.is_empty());
    assert_eq!(
      store.slot().contents(),
      None
    );

    let task = store
      .create(TaskDraft::new("keep"))
      .unwrap();
    assert!(
      store
        .update(
          &task.id,
          TaskPatch::title("")
        )
        .is_err()
    );
    assert_eq!(
      store.get(&task.id).unwrap().title,
      "keep"
    );
  }

  #[test]
  fn moved_task_goes_to_end_of_target_column()
   {
    let mut store = store();
    let first = store
      .create(TaskDraft::new("first"))
      .unwrap();
    let _second = store
      .create(
        TaskDraft::new("second")
          .with_status(Status::Done)
      )
      .unwrap();
    let _third = store
      .create(TaskDraft::new("third"))
      .unwrap();

    assert!(store.move_task(
      &first.id,
      Status::Todo,
      Status::Done
    ));
    let board = store.board();
    let done: Vec<_> = board
      .column(Status::Done)
      .tasks
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(done, vec![
      "second", "first"
    ]);
    assert_eq!(
      board.column(Status::Todo).tasks.len(),
      1
    );
  }

  #[test]
  fn stale_move_is_ignored() {
    let mut store = store();
    let task = store
      .create(TaskDraft::new("x"))
      .unwrap();
    let before = store.slot().contents();

    assert!(!store.move_task(
      &task.id,
      Status::InProgress,
      Status::Done
    ));
    assert!(!store.move_task(
      &TaskId::from("missing"),
      Status::Todo,
      Status::Done
    ));
    assert_eq!(
      store.slot().contents(),
      before
    );
  }

  #[test]
  fn status_patch_changes_column_in_one_step()
   {
    let mut store = store();
    let task = store
      .create(TaskDraft::new("x"))
      .unwrap();
    let updated = store
      .update(
        &task.id,
        TaskPatch::status(
          Status::InProgress
        )
      )
      .unwrap()
      .unwrap();

    assert_eq!(updated.id, task.id);
    let board = store.board();
    assert!(
      board
        .column(Status::Todo)
        .tasks
        .is_empty()
    );
    assert_eq!(
      board
        .column(Status::InProgress)
        .tasks
        .len(),
      1
    );
  }

  #[test]
  fn subscribers_fire_only_on_effective_changes()
   {
    let mut store = store();
    let calls = Rc::new(RefCell::new(
      Vec::<usize>::new()
    ));
    let sink = Rc::clone(&calls);
    let sub = store.subscribe(
      move |tasks| {
        sink.borrow_mut().push(tasks.len());
      }
    );

    let task = store
      .create(TaskDraft::new("x"))
      .unwrap();
    store.move_task(
      &task.id,
      Status::Todo,
      Status::Todo
    );
    store
      .update(
        &task.id,
        TaskPatch::title("x")
      )
      .unwrap();
    store.delete(&TaskId::from("nope"));
    store.delete(&task.id);

    assert_eq!(*calls.borrow(), vec![
      1, 0
    ]);

    assert!(store.unsubscribe(sub));
    store
      .create(TaskDraft::new("y"))
      .unwrap();
    assert_eq!(calls.borrow().len(), 2);
  }

  #[test]
  fn open_recovers_from_corrupt_or_duplicated_documents()
   {
    let corrupt = TaskStore::open(
      MemorySlot::with_contents(
        "tasks", "[{\"id\":"
      )
    );
    assert!(corrupt.is_empty());

    let duplicated = TaskStore::open(
      MemorySlot::with_contents(
        "tasks",
        r#"[{"id":"1","title":"a"},{"id":"1","title":"b"},{"id":2,"title":"c"}]"#
      )
    );
    let titles: Vec<_> = duplicated
      .tasks()
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(titles, vec!["a", "c"]);
    assert!(
      duplicated
        .get(&TaskId::from("2"))
        .is_some()
    );
  }

  #[test]
  fn delete_removes_and_persists() {
    let mut store = store();
    let task = store
      .create(TaskDraft::new("gone"))
      .unwrap();

    let removed =
      store.delete(&task.id).unwrap();
    assert_eq!(removed.id, task.id);
    assert!(store.is_empty());
    assert_eq!(
      store.slot().contents().as_deref(),
      Some("[]")
    );
    assert!(
      store.delete(&task.id).is_none()
    );
  }

  #[test]
  fn import_skips_known_ids_and_blank_titles()
   {
    let mut store = store();
    let existing = store
      .create(TaskDraft::new("kept"))
      .unwrap();

    let mut dup = existing.clone();
    dup.title = "replacement".to_string();
    let mut blank = existing.clone();
    blank.id = TaskId::from("blank");
    blank.title = "  ".to_string();
    let mut fresh = existing.clone();
    fresh.id = TaskId::from("fresh");
    fresh.title = " new ".to_string();

    let summary =
      store.import(vec![dup, blank, fresh]);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(
      store.get(&existing.id).unwrap().title,
      "kept"
    );
    assert_eq!(
      store
        .get(&TaskId::from("fresh"))
        .unwrap()
        .title,
      "new"
    );
  }

  #[test]
  fn open_trims_titles_and_drops_blank_ones()
   {
    let store = TaskStore::open(
      MemorySlot::with_contents(
        "tasks",
        r#"[{"id":"1","title":"   "},{"id":"1","title":" real "},{"id":"2","title":""}]"#
      )
    );

    assert_eq!(store.len(), 1);
    assert_eq!(
      store
        .get(&TaskId::from("1"))
        .unwrap()
        .title,
      "real"
    );
  }

  #[test]
  fn task_lifecycle_keeps_identity() {
    let mut store = store();
    let task = store
      .create(TaskDraft::new("A"))
      .unwrap();

    assert!(store.move_task(
      &task.id,
      Status::Todo,
      Status::Done
    ));
    let renamed = store
      .update(
        &task.id,
        TaskPatch::title("A2")
      )
      .unwrap()
      .unwrap();
    assert_eq!(renamed.id, task.id);
    assert_eq!(renamed.status, Status::Done);
    assert_eq!(renamed.title, "A2");
    assert_eq!(
      store
        .board()
        .column(Status::Done)
        .tasks
        .len(),
      1
    );

    assert!(store.delete(&task.id).is_some());
    assert!(store.is_empty());
    assert!(store.board().is_empty());
  }

  #[test]
  fn many_creates_yield_distinct_ids() {
    let mut store = store();
    for n in 0..64 {
      store
        .create(TaskDraft::new(format!(
          "task {n}"
        )))
        .unwrap();
    }

    let ids: std::collections::HashSet<_> =
      store
        .tasks()
        .iter()
        .map(|t| t.id.clone())
        .collect();
    assert_eq!(ids.len(), 64);
    assert_eq!(store.len(), 64);
  }

  #[test]
  fn empty_patch_returns_task_without_writing()
   {
    let mut store = store();
    let task = store
      .create(TaskDraft::new("same"))
      .unwrap();
    let before = store.slot().contents();

    let unchanged = store
      .update(&task.id, TaskPatch::default())
      .unwrap()
      .unwrap();
    assert_eq!(unchanged, task);
    assert_eq!(unchanged.updated_at, None);
    assert_eq!(
      store.slot().contents(),
      before
    );
  }
}
