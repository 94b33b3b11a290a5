use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::model::TaskRecord;
use crate::progress::Progress;
use crate::rollover::DailySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn checkbox(task: &TaskRecord) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

pub fn print_task(task: &TaskRecord, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(&task)?),
        Format::Pretty => {
            let line = format!("{:>3} {} {}", task.position, checkbox(task), task.description);
            if task.completed {
                println!("{}", line.dimmed());
            } else {
                println!("{}", line);
            }
            println!(
                "      priority: {} | created: {}",
                task.priority.label(),
                task.created_at.format("%Y-%m-%d %H:%M")
            );
            if let Some(done) = task.completed_at {
                println!("      completed: {}", done.format("%Y-%m-%d %H:%M"));
            }
            if !task.tags.is_empty() {
                println!("      tags: {}", task.tags.join(", "));
            }
        }
        Format::Minimal => println!("{}", minimal_row(task)),
    }
    Ok(())
}

fn minimal_row(task: &TaskRecord) -> String {
    format!(
        "{:>4} {:3} {:3} {}",
        task.position,
        checkbox(task),
        task.priority,
        truncate_description(&task.description, 40)
    )
}

pub fn truncate_description(description: &str, max_len: usize) -> String {
    if description.chars().count() > max_len {
        let truncated: String = description.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        description.to_string()
    }
}

pub fn print_tasks(tasks: &[TaskRecord], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(tasks)?),
        Format::Pretty => {
            if tasks.is_empty() {
                println!("{}", "No tasks.".dimmed());
            }
            for task in tasks {
                print_task(task, Format::Pretty)?;
            }
        }
        Format::Minimal => {
            println!("{:>4} {:3} {:3} DESCRIPTION", "POS", "", "PRI");
            println!("{}", "-".repeat(50));
            for task in tasks {
                println!("{}", minimal_row(task));
            }
        }
    }
    Ok(())
}

pub fn print_progress(progress: &Progress, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(progress)?),
        Format::Pretty => {
            let filled = usize::from(progress.percent) / 5;
            let bar = format!("{}{}", "#".repeat(filled), "-".repeat(20 - filled));
            println!(
                "[{}] {}% ({}/{} done)",
                bar.green(),
                progress.percent,
                progress.completed,
                progress.total
            );
        }
        Format::Minimal => println!("{}", progress.percent),
    }
    Ok(())
}

pub fn print_summary(summary: &DailySummary, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(summary)?),
        Format::Pretty => {
            print!("{summary}");
            if summary.is_empty() {
                println!("{}", "  nothing yet".dimmed());
            }
        }
        Format::Minimal => {
            for description in &summary.completed {
                println!("{description}");
            }
        }
    }
    Ok(())
}

pub fn print_count(label: &str, count: usize, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let mut obj = serde_json::Map::new();
            obj.insert(label.to_string(), count.into());
            println!("{}", serde_json::Value::Object(obj));
        }
        Format::Pretty => println!("{label}: {count}"),
        Format::Minimal => println!("{count}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_descriptions() {
        assert_eq!(truncate_description("short", 10), "short");
        assert_eq!(truncate_description("a very long description", 10), "a very ...");
    }
}
