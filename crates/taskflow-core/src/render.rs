use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::datetime::format_local_date;
use crate::session::SessionInfo;
use crate::stats::TaskStats;
use crate::task::Task;

pub const EMPTY_VIEW: &str = "No tasks here. Add a new task to stay productive!";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Color is used only when enabled and stdout is a terminal.
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        self.write_task_table(io::stdout().lock(), tasks)
    }

    pub fn write_task_table<W: Write>(&self, mut out: W, tasks: &[Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "{EMPTY_VIEW}")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Title".to_string(),
            "Description".to_string(),
            "Created".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let status = if task.completed {
                    self.paint("done", "32")
                } else {
                    self.paint("open", "33")
                };
                vec![
                    self.paint(&task.id.to_string(), "36"),
                    status,
                    task.title.clone(),
                    task.description_text().to_string(),
                    format_local_date(&task.created_at),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn print_task(&self, verb: &str, task: &Task) -> anyhow::Result<()> {
        self.write_task(io::stdout().lock(), verb, task)
    }

    pub fn write_task<W: Write>(&self, mut out: W, verb: &str, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "{verb} task {}: {}", self.paint(&task.id.to_string(), "36"), task.title)?;
        Ok(())
    }

    pub fn print_stats(&self, stats: TaskStats) -> anyhow::Result<()> {
        self.write_stats(io::stdout().lock(), stats)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: TaskStats) -> anyhow::Result<()> {
        writeln!(out, "Total      {}", stats.total)?;
        writeln!(out, "Active     {}", stats.active)?;
        writeln!(out, "Completed  {}", stats.completed)?;
        Ok(())
    }

    pub fn print_session(&self, info: &SessionInfo) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let initial = self.paint(&format!("[{}]", info.initial()), "1");
        match &info.email {
            Some(email) => writeln!(out, "{initial} {} <{email}>", info.display_name)?,
            None => writeln!(out, "{initial} {}", info.display_name)?,
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
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

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        let padding = if idx == last {
            0
        } else {
            widths[idx].saturating_sub(UnicodeWidthStr::width(header.as_str())) + 1
        };
        write!(writer, "{header}{}", " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for (idx, width) in widths.iter().enumerate() {
        let sep = if idx == last { "" } else { " " };
        write!(writer, "{}{sep}", "-".repeat(*width))?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                write!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{cell}{} ", " ".repeat(padding))?;
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
