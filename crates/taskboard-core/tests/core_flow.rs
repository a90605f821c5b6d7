use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use anyhow::anyhow;
use clap::Parser;
use taskboard_core::cli::{Command, GlobalCli};
use taskboard_core::commands;
use taskboard_core::config::Config;
use taskboard_core::filter::TaskFilter;
use taskboard_core::render::Renderer;
use taskboard_core::slot::{FileSlot, Slot};
use taskboard_core::store::TaskStore;
use taskboard_core::task::{Status, TaskDraft, TaskPatch};
use tempfile::tempdir;

struct BrokenSlot;

impl Slot for BrokenSlot {
    fn name(&self) -> &str {
        "broken"
    }

    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn write(&mut self, _payload: &str) -> anyhow::Result<()> {
        Err(anyhow!("quota exceeded"))
    }
}

fn parse(args: &[&str]) -> Command {
    GlobalCli::parse_from(args)
        .command
        .expect("subcommand")
}

fn run_command(store: &mut TaskStore<FileSlot>, args: &[&str]) -> String {
    let mut out = Vec::new();
    commands::dispatch(
        store,
        &Config::default(),
        &Renderer::plain(),
        parse(args),
        &mut out,
    )
    .expect("command should succeed");
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn file_slot_survives_reopen() {
    let temp = tempdir().expect("tempdir");

    let created = {
        let slot = FileSlot::open(temp.path(), "taskboard-tasks").expect("open slot");
        let mut store = TaskStore::open(slot);
        let a = store.create(TaskDraft::new("A")).expect("create A");
        let b = store
            .create(TaskDraft::new("B").with_tags(["work"]))
            .expect("create B");
        assert!(store.move_task(&a.id, Status::Todo, Status::Done));
        (a, b)
    };

    let slot = FileSlot::open(temp.path(), "taskboard-tasks").expect("reopen slot");
    let store = TaskStore::open(slot);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&created.0.id).expect("A").status, Status::Done);
    assert_eq!(store.get(&created.1.id).expect("B").tags, vec!["work"]);

    let board = store.board();
    assert_eq!(board.column(Status::Todo).tasks[0].title, "B");
    assert_eq!(board.column(Status::Done).tasks[0].title, "A");
}

#[test]
fn corrupt_document_opens_as_empty_board() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("taskboard-tasks.json"), "{not json").expect("seed");

    let slot = FileSlot::open(temp.path(), "taskboard-tasks").expect("open slot");
    let mut store = TaskStore::open(slot);
    assert!(store.is_empty());

    store.create(TaskDraft::new("fresh start")).expect("create");
    let text = fs::read_to_string(temp.path().join("taskboard-tasks.json")).expect("read");
    assert!(text.contains("fresh start"));
}

#[test]
fn legacy_column_document_is_flattened() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("taskboard-tasks.json"),
        r#"[
          {"id":"todo","title":"To Do","status":"todo","tasks":[{"id":"1","title":"Write"}]},
          {"id":"doing","title":"In Progress","status":"doing","tasks":[]},
          {"id":"done","title":"Done","status":"done","tasks":[{"id":"2","title":"Ship","status":"todo"}]}
        ]"#,
    )
    .expect("seed");

    let slot = FileSlot::open(temp.path(), "taskboard-tasks").expect("open slot");
    let store = TaskStore::open(slot);
    let board = store.board();
    assert_eq!(board.column(Status::Todo).tasks.len(), 1);
    assert_eq!(board.column(Status::Done).tasks[0].title, "Ship");
}

#[test]
fn tag_search_and_subscribers() {
    let temp = tempdir().expect("tempdir");
    let slot = FileSlot::open(temp.path(), "tasks").expect("open slot");
    let mut store = TaskStore::open(slot);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    store.subscribe(move |tasks| sink.borrow_mut().push(tasks.len()));

    store
        .create(TaskDraft::new("Report").with_tags(["work", "urgent"]))
        .expect("create");
    store
        .create(TaskDraft::new("Groceries").with_tags(["home"]))
        .expect("create");
    store.create(TaskDraft::new("Standup").with_tags(["work"])).expect("create");

    let urgent_work = store.search(&TaskFilter::tags(["work", "urgent"]));
    assert_eq!(urgent_work.len(), 1);
    assert_eq!(urgent_work[0].title, "Report");
    assert_eq!(store.search(&TaskFilter::text("GROC")).len(), 1);
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
}

#[test]
fn write_failure_keeps_memory_state() {
    let mut store = TaskStore::open(BrokenSlot);
    let task = store.create(TaskDraft::new("unsaved")).expect("create");

    assert_eq!(store.len(), 1);
    assert!(store
        .last_persist_error()
        .is_some_and(|err| err.contains("quota exceeded")));

    let updated = store
        .update(&task.id, TaskPatch::status(Status::InProgress))
        .expect("valid patch")
        .expect("task exists");
    assert_eq!(updated.status, Status::InProgress);
}

#[test]
fn commands_drive_the_board() {
    let temp = tempdir().expect("tempdir");
    let slot = FileSlot::open(temp.path(), "taskboard-tasks").expect("open slot");
    let mut store = TaskStore::open(slot);

    let created = run_command(&mut store, &["board", "add", "Write", "docs", "--tag", "work"]);
    assert!(created.starts_with("Created task"));
    let id = store.tasks()[0].id.to_string();

    let moved = run_command(&mut store, &["board", "move", &id[..6], "todo", "doing"]);
    assert!(moved.contains("In Progress"));

    let missed = run_command(&mut store, &["board", "move", &id, "todo", "done"]);
    assert!(missed.contains("nothing moved"));
    assert_eq!(store.tasks()[0].status, Status::InProgress);

    let board = run_command(&mut store, &["board", "board", "--tag", "work"]);
    assert!(board.contains("In Progress (1)"));
    assert!(board.contains("Write docs"));

    let exported = run_command(&mut store, &["board", "export"]);
    assert!(exported.contains("\"status\": \"inprogress\""));

    run_command(&mut store, &["board", "delete", &id]);
    assert!(store.is_empty());

    let mut out = Vec::new();
    let result = commands::dispatch(
        &mut store,
        &Config::default(),
        &Renderer::plain(),
        parse(&["board", "show", "nope"]),
        &mut out,
    );
    assert!(result.is_err());
}
