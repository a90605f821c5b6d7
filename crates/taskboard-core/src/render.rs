use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::agenda::Summary;
use crate::board::Board;
use crate::config::Config;
use crate::datetime::format_date;
use crate::task::{Priority, Status, Task};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color_enabled() && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn print_board<W: Write>(
        &self,
        out: &mut W,
        board: &Board,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        for (idx, column) in board.columns.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let heading = format!("{} ({})", column.title, column.tasks.len());
            writeln!(out, "{}", self.paint(&heading, status_code(column.status)))?;
            writeln!(out, "{:-<width$}", "", width = UnicodeWidthStr::width(heading.as_str()))?;

            if column.tasks.is_empty() {
                writeln!(out, "  (empty)")?;
                continue;
            }
            for task in &column.tasks {
                writeln!(out, "  {}", self.card_line(task, today))?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(short_id(task), "33"),
                    self.paint(task.status.as_str(), status_code(task.status)),
                    task.priority.map(priority_label).unwrap_or_default().to_string(),
                    self.due_cell(task, today),
                    task.title.clone(),
                    format_tags(&task.tags),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", task.status.title())?;
        writeln!(
            out,
            "priority    {}",
            task.priority.map(Priority::as_str).unwrap_or_default()
        )?;
        writeln!(
            out,
            "due         {}",
            task.due_date.map(format_date).unwrap_or_default()
        )?;
        writeln!(out, "tags        {}", task.tags.join(", "))?;
        writeln!(out, "created     {}", task.created_at.format("%Y-%m-%d %H:%M:%SZ"))?;
        if let Some(updated) = task.updated_at {
            writeln!(out, "updated     {}", updated.format("%Y-%m-%d %H:%M:%SZ"))?;
        }
        if let Some(description) = &task.description {
            writeln!(out)?;
            for line in description.lines() {
                writeln!(out, "  {line}")?;
            }
        }
        Ok(())
    }

    pub fn print_tag_facets<W: Write>(
        &self,
        out: &mut W,
        facets: &[(String, usize)],
    ) -> anyhow::Result<()> {
        let rows = facets
            .iter()
            .map(|(tag, count)| vec![format!("+{tag}"), count.to_string()])
            .collect();
        write_table(out, vec!["Tag".to_string(), "Tasks".to_string()], rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_agenda<W: Write>(
        &self,
        out: &mut W,
        month_label: &str,
        days: &BTreeMap<NaiveDate, Vec<Task>>,
        summary: &Summary,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{month_label}")?;
        if days.is_empty() {
            writeln!(out, "  no tasks due this month")?;
        }
        for (day, tasks) in days {
            let label = day.format("%a %d").to_string();
            let label = if *day == today {
                self.paint(&label, "1")
            } else {
                label
            };
            writeln!(out, "  {label}")?;
            for task in tasks {
                writeln!(out, "    {}", self.card_line(task, today))?;
            }
        }

        for (title, tasks, code) in [
            ("Overdue", &summary.overdue, "31"),
            ("Today", &summary.today, "33"),
            ("Upcoming", &summary.upcoming, "36"),
        ] {
            writeln!(out)?;
            writeln!(out, "{}", self.paint(&format!("{title} ({})", tasks.len()), code))?;
            for task in tasks {
                writeln!(out, "  {}", self.card_line(task, today))?;
            }
        }
        Ok(())
    }

    fn card_line(&self, task: &Task, today: NaiveDate) -> String {
        let mut parts = vec![self.paint(short_id(task), "33"), task.title.clone()];
        if let Some(priority) = task.priority {
            parts.push(format!("[{}]", priority_label(priority)));
        }
        if task.due_date.is_some() {
            parts.push(format!("due {}", self.due_cell(task, today)));
        }
        if !task.tags.is_empty() {
            parts.push(format_tags(&task.tags));
        }
        parts.join("  ")
    }

    fn due_cell(&self, task: &Task, today: NaiveDate) -> String {
        let Some(due) = task.due_date else {
            return String::new();
        };
        let text = format_date(due);
        if task.is_overdue(today) {
            self.paint(&text, "31")
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(task: &Task) -> &str {
    let id = task.id.as_str();
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn status_code(status: Status) -> &'static str {
    match status {
        Status::Todo => "31",
        Status::InProgress => "33",
        Status::Done => "32",
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "med",
        Priority::High => "high",
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("+{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(widths.iter().copied()) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in widths.iter().copied() {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(widths.iter().copied()) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
