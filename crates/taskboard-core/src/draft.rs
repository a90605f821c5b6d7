use chrono::NaiveDate;
use tracing::debug;

use crate::error::ValidationError;
use crate::slot::Slot;
use crate::store::TaskStore;
use crate::task::{Priority, Status, Task, TaskDraft, TaskId, TaskPatch};

/// Result of committing a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(Task),
    Updated(Task),
    /// The task being edited was deleted while the draft was open.
    Missing,
}

/// An editing session: form values held locally until `save`. Dropping the
/// draft cancels the edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    target: Option<TaskId>,
    values: TaskDraft,
}

impl Draft {
    /// Empty `todo` draft. Priority starts unset rather than `medium`, so a
    /// task only carries a priority when one is chosen.
    pub fn blank() -> Self {
        Self::for_status(Status::Todo)
    }

    /// New task pre-placed in the column the editor was opened from.
    pub fn for_status(status: Status) -> Self {
        Self {
            target: None,
            values: TaskDraft::default().with_status(status),
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            target: Some(task.id.clone()),
            values: TaskDraft {
                title: task.title.clone(),
                description: task.description.clone(),
                status: task.status,
                priority: task.priority,
                due_date: task.due_date,
                tags: task.tags.clone(),
            },
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.values.title = title.into();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.values.description = description;
    }

    pub fn set_status(&mut self, status: Status) {
        self.values.status = status;
    }

    pub fn set_priority(&mut self, priority: Option<Priority>) {
        self.values.priority = priority;
    }

    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>) {
        self.values.due_date = due_date;
    }

    /// Returns `false` if the trimmed tag is empty or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.values.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.values.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.values.tags.len();
        self.values.tags.retain(|t| t != tag);
        self.values.tags.len() != before
    }

    /// Patch that overwrites every editable field with the draft's values.
    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            title: Some(self.values.title.clone()),
            description: Some(self.values.description.clone()),
            status: Some(self.values.status),
            priority: Some(self.values.priority),
            due_date: Some(self.values.due_date),
            tags: Some(self.values.tags.clone()),
        }
    }

    /// Commits the draft. On a validation error nothing is written and the
    /// draft is left as it was so the caller can re-prompt.
    #[tracing::instrument(skip_all, fields(target = ?self.target))]
    pub fn save<S: Slot>(
        &self,
        store: &mut TaskStore<S>,
    ) -> Result<SaveOutcome, ValidationError> {
        match &self.target {
            None => store
                .create(self.values.clone())
                .map(SaveOutcome::Created),
            Some(id) => {
                let outcome = match store.update(id, self.to_patch())? {
                    Some(task) => SaveOutcome::Updated(task),
                    None => SaveOutcome::Missing,
                };
                debug!(?outcome, "draft saved");
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Draft, SaveOutcome};
    use crate::slot::MemorySlot;
    use crate::store::TaskStore;
    use crate::task::{Priority, Status, TaskDraft};

    #[test]
    fn blank_draft_creates_task() {
        let mut store = TaskStore::empty(MemorySlot::new("tasks"));
        let mut draft = Draft::for_status(Status::InProgress);
        draft.set_title("Plan sprint");
        draft.set_priority(Some(Priority::Medium));
        assert!(draft.add_tag("work"));
        assert!(!draft.add_tag(" work "));
        assert!(!draft.add_tag("  "));

        let SaveOutcome::Created(task) = draft.save(&mut store).unwrap() else {
            panic!("expected a created task");
        };
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.tags, vec!["work"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cancelled_edit_leaves_store_untouched() {
        let mut store = TaskStore::empty(MemorySlot::new("tasks"));
        let task = store.create(TaskDraft::new("original")).unwrap();
        let before = store.slot().contents();

        let mut draft = Draft::from_task(&task);
        draft.set_title("changed");
        draft.remove_tag("none");
        drop(draft);

        assert_eq!(store.get(&task.id).unwrap().title, "original");
        assert_eq!(store.slot().contents(), before);
    }

    #[test]
    fn edit_keeps_identity_and_reports_missing_target() {
        let mut store = TaskStore::empty(MemorySlot::new("tasks"));
        let task = store.create(TaskDraft::new("original")).unwrap();

        let mut draft = Draft::from_task(&task);
        draft.set_title("renamed");
        let SaveOutcome::Updated(updated) = draft.save(&mut store).unwrap() else {
            panic!("expected an update");
        };
        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);

        store.delete(&task.id);
        assert_eq!(draft.save(&mut store).unwrap(), SaveOutcome::Missing);
    }

    #[test]
    fn invalid_draft_can_be_fixed_and_resaved() {
        let mut store = TaskStore::empty(MemorySlot::new("tasks"));
        let mut draft = Draft::blank();
        assert!(draft.save(&mut store).is_err());
        assert!(store.is_empty());

        draft.set_title("now valid");
        let Ok(SaveOutcome::Created(task)) = draft.save(&mut store) else {
            panic!("expected a created task");
        };
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, None);
    }
}
