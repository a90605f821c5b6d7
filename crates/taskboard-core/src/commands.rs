use std::fs;
use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::agenda;
use crate::cli::{AddArgs, Command, EditArgs, ListArgs, SearchArgs};
use crate::config::Config;
use crate::datetime::parse_due_date;
use crate::document;
use crate::draft::{Draft, SaveOutcome};
use crate::filter::TaskFilter;
use crate::render::{Renderer, short_id};
use crate::slot::Slot;
use crate::store::TaskStore;
use crate::task::{Status, TaskId};

pub fn known_command_names() -> Vec<&'static str> {
    vec!["board", "list", "tags", "agenda", "export"]
}

/// Command used when none is given on the command line.
pub fn default_command(cfg: &Config) -> anyhow::Result<Command> {
    let name = cfg
        .get("default.command")
        .unwrap_or_else(|| "board".to_string());
    match name.trim() {
        "board" => Ok(Command::Board(SearchArgs::default())),
        "list" => Ok(Command::List(ListArgs::default())),
        "tags" => Ok(Command::Tags),
        "agenda" => Ok(Command::Agenda { month: None }),
        "export" => Ok(Command::Export),
        other => Err(anyhow!(
            "invalid default.command: {other} (expected one of {})",
            known_command_names().join(", ")
        )),
    }
}

#[instrument(skip_all)]
pub fn dispatch<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    let today = cfg.day_clock()?.today();
    debug!(?command, %today, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(store, args, today, out),
        Command::Edit(args) => cmd_edit(store, args, today, out),
        Command::Move { id, from, to } => cmd_move(store, &id, from, to, out),
        Command::Delete { id } => cmd_delete(store, &id, out),
        Command::Show { id } => cmd_show(store, renderer, &id, out),
        Command::Board(args) => cmd_board(store, renderer, args, today, out),
        Command::List(args) => cmd_list(store, renderer, args, today, out),
        Command::Tags => renderer.print_tag_facets(out, &store.tag_facets()),
        Command::Agenda { month } => {
            cmd_agenda(store, cfg, renderer, month.as_deref(), today, out)
        }
        Command::Export => cmd_export(store, out),
        Command::Import { file } => cmd_import(store, &file, out),
    }
}

#[instrument(skip_all)]
fn cmd_add<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    args: AddArgs,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let mut draft = Draft::for_status(args.status.unwrap_or_default());
    draft.set_title(args.title.join(" "));
    draft.set_description(args.description);
    draft.set_priority(args.priority);
    if let Some(due) = args.due {
        draft.set_due_date(Some(parse_due_date(&due, today)?));
    }
    for tag in &args.tags {
        draft.add_tag(tag);
    }

    match draft.save(store)? {
        SaveOutcome::Created(task) => {
            writeln!(out, "Created task {} in {}.", short_id(&task), task.status.title())?;
        }
        other => return Err(anyhow!("unexpected outcome for a new task: {other:?}")),
    }
    report_persist_warning(store);
    Ok(())
}

#[instrument(skip_all, fields(id = %args.id))]
fn cmd_edit<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    args: EditArgs,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command edit");

    let id = resolve_id(store, &args.id)?;
    let task = store
        .get(&id)
        .cloned()
        .ok_or_else(|| anyhow!("no task matches id {}", args.id))?;

    let mut draft = Draft::from_task(&task);
    if let Some(title) = args.title {
        draft.set_title(title);
    }
    if args.clear_description {
        draft.set_description(None);
    } else if let Some(description) = args.description {
        draft.set_description(Some(description));
    }
    if let Some(status) = args.status {
        draft.set_status(status);
    }
    if args.clear_priority {
        draft.set_priority(None);
    } else if let Some(priority) = args.priority {
        draft.set_priority(Some(priority));
    }
    if args.clear_due {
        draft.set_due_date(None);
    } else if let Some(due) = args.due {
        draft.set_due_date(Some(parse_due_date(&due, today)?));
    }
    for tag in &args.untags {
        draft.remove_tag(tag.trim());
    }
    for tag in &args.tags {
        draft.add_tag(tag);
    }

    if draft == Draft::from_task(&task) {
        writeln!(out, "Nothing to change for task {}.", short_id(&task))?;
        return Ok(());
    }

    match draft.save(store)? {
        SaveOutcome::Updated(updated) => {
            writeln!(out, "Modified task {}.", short_id(&updated))?;
        }
        SaveOutcome::Missing => {
            writeln!(out, "Task {} no longer exists.", short_id(&task))?;
        }
        SaveOutcome::Created(created) => {
            return Err(anyhow!(
                "edit unexpectedly created task {}",
                short_id(&created)
            ));
        }
    }
    report_persist_warning(store);
    Ok(())
}

#[instrument(skip(store, out))]
fn cmd_move<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    raw_id: &str,
    from: Status,
    to: Status,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command move");

    let id = resolve_id(store, raw_id)?;
    if from == to {
        writeln!(out, "Task is already in {}.", to.title())?;
        return Ok(());
    }

    if store.move_task(&id, from, to) {
        writeln!(out, "Moved task {raw_id} from {} to {}.", from.title(), to.title())?;
        report_persist_warning(store);
    } else {
        writeln!(out, "Task {raw_id} is not in {}; nothing moved.", from.title())?;
    }
    Ok(())
}

#[instrument(skip(store, out))]
fn cmd_delete<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    raw_id: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");

    let id = resolve_id(store, raw_id)?;
    match store.delete(&id) {
        Some(task) => {
            writeln!(out, "Deleted task {} ({}).", short_id(&task), task.title)?;
            report_persist_warning(store);
        }
        None => writeln!(out, "Task {raw_id} no longer exists.")?,
    }
    Ok(())
}

#[instrument(skip(store, renderer, out))]
fn cmd_show<S: Slot, W: Write>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    raw_id: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let id = resolve_id(store, raw_id)?;
    let task = store
        .get(&id)
        .ok_or_else(|| anyhow!("no task matches id {raw_id}"))?;
    renderer.print_task_info(out, task)
}

#[instrument(skip(store, renderer, out))]
fn cmd_board<S: Slot, W: Write>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    args: SearchArgs,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let filter = search_filter(args);
    let board = if filter.is_empty() {
        store.board()
    } else {
        crate::board::Board::from_tasks(&store.search(&filter))
    };
    renderer.print_board(out, &board, today)
}

#[instrument(skip(store, renderer, out))]
fn cmd_list<S: Slot, W: Write>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    args: ListArgs,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut filter = search_filter(args.search);
    filter.status = args.status;
    if let Some(priority) = args.priority {
        filter.priority = priority;
    }
    if let Some(due) = args.due {
        filter.due = due;
    }

    let rows = store.search(&filter);
    debug!(rows = rows.len(), "list rows selected");
    renderer.print_task_table(out, &rows, today)
}

#[instrument(skip(store, cfg, renderer, out))]
fn cmd_agenda<S: Slot, W: Write>(
    store: &TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    month: Option<&str>,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let first = match month {
        Some(raw) => NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
            .with_context(|| format!("invalid month {raw:?}, expected YYYY-MM"))?,
        None => today.with_day(1).unwrap_or(today),
    };

    let days = agenda::month(store.tasks(), first.year(), first.month())?;
    let summary = agenda::summary(store.tasks(), today, cfg.upcoming_days()?);
    let label = first.format("%B %Y").to_string();
    renderer.print_agenda(out, &label, &days, &summary, today)
}

fn cmd_export<S: Slot, W: Write>(store: &TaskStore<S>, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "{}", document::encode(store.tasks())?)?;
    Ok(())
}

#[instrument(skip(store, out))]
fn cmd_import<S: Slot, W: Write>(
    store: &mut TaskStore<S>,
    file: &std::path::Path,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command import");

    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let incoming = document::decode(&text)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let summary = store.import(incoming);
    writeln!(
        out,
        "Imported {} task(s), skipped {}.",
        summary.added, summary.skipped
    )?;
    report_persist_warning(store);
    Ok(())
}

fn search_filter(args: SearchArgs) -> TaskFilter {
    TaskFilter {
        text: args.search.unwrap_or_default(),
        tags: args.tags,
        ..TaskFilter::default()
    }
}

/// Exact id, or a prefix matching exactly one task.
pub fn resolve_id<S: Slot>(store: &TaskStore<S>, raw: &str) -> anyhow::Result<TaskId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    let exact = TaskId::from(raw);
    if store.get(&exact).is_some() {
        return Ok(exact);
    }

    let matches: Vec<&TaskId> = store
        .tasks()
        .iter()
        .map(|task| &task.id)
        .filter(|id| id.as_str().starts_with(raw))
        .collect();

    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(anyhow!("no task matches id {raw}")),
        many => Err(anyhow!(
            "id prefix {raw} is ambiguous ({} tasks match)",
            many.len()
        )),
    }
}

fn report_persist_warning<S: Slot>(store: &TaskStore<S>) {
    if let Some(err) = store.last_persist_error() {
        warn!(error = %err, "changes kept in memory only");
        eprintln!("warning: changes were not saved: {err}");
    }
}
