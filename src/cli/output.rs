//! Colored output helpers for CLI
//!
//! Terminal rendering for `init`, `config` and `research`. Every helper has a
//! plain-text form for `--no-color` and non-terminal output.

use crate::jobs::{ComponentError, JobEvent, JobEventKind};
use owo_colors::OwoColorize;

const BANNER: [&str; 5] = [
    "     _ _   _ ____  ___ ____  ",
    "    | | | | |  _ \\|_ _/ ___| ",
    " _  | | | | | |_) || |\\___ \\ ",
    "| |_| | |_| |  _ < | | ___) |",
    " \\___/ \\___/|_| \\_\\___|____/ ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Ok,
    Info,
    Warn,
    Error,
}

impl Mark {
    fn plain(self) -> &'static str {
        match self {
            Mark::Ok => "[OK]",
            Mark::Info => "[INFO]",
            Mark::Warn => "[WARN]",
            Mark::Error => "[ERROR]",
        }
    }
}

/// Output style configuration
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the JURIS banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        println!();
        for (i, line) in BANNER.iter().enumerate() {
            if !self.colored {
                println!("   {}", line);
            } else if i < 2 {
                println!("   {}", line.bright_yellow().bold());
            } else if i < 4 {
                println!("   {}", line.yellow().bold());
            } else {
                println!("   {}", line.bright_red().bold());
            }
        }
        if self.colored {
            println!(
                "\n   {} {}\n",
                "Legal Research Orchestrator".bright_white().bold(),
                version.dimmed()
            );
        } else {
            println!("\n   Legal Research Orchestrator {}\n", version);
        }
    }

    fn mark(&self, mark: Mark, message: &str) {
        let line = if self.colored {
            match mark {
                Mark::Ok => format!("  {} {}", "✓".green().bold(), message.green()),
                Mark::Info => format!("  {} {}", "•".blue(), message),
                Mark::Warn => format!("  {} {}", "⚠".yellow().bold(), message.yellow()),
                Mark::Error => format!("  {} {}", "✗".red().bold(), message.red()),
            }
        } else {
            format!("  {} {}", mark.plain(), message)
        };

        if mark == Mark::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    pub fn success(&self, message: &str) {
        self.mark(Mark::Ok, message);
    }

    pub fn info(&self, message: &str) {
        self.mark(Mark::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.mark(Mark::Warn, message);
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        self.mark(Mark::Error, message);
    }

    /// One progress line for a job event.
    pub fn event_line(&self, event: &JobEvent) -> String {
        let detail = match (event.kind, event.component) {
            (JobEventKind::Created, _) => "submitted".to_string(),
            (JobEventKind::ComponentFinished, Some(component)) => {
                format!("{} finished", component.label().to_lowercase())
            }
            _ => String::new(),
        };
        let state = format!("[{}]", event.state);

        let mut line = if self.colored {
            format!("  {} {}", state.dimmed(), event.job_id.as_str().bright_white())
        } else {
            format!("  {} {}", state, event.job_id)
        };
        if !detail.is_empty() {
            line.push(' ');
            if self.colored {
                line.push_str(&detail.cyan().to_string());
            } else {
                line.push_str(&detail);
            }
        }
        line
    }

    /// Print a job progress event
    pub fn event(&self, event: &JobEvent) {
        println!("{}", self.event_line(event));
    }

    /// Print why a retrieval component contributed nothing
    pub fn component_failure(&self, error: &ComponentError) {
        self.warning(&format!("{}: {}", error.component.label(), error.describe()));
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    pub fn created_dir(&self, path: &str) {
        self.created("directory", path);
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    pub fn newline(&self) {
        println!();
    }
}
