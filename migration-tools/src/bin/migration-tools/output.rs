use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use migration_tools::{GateOutcome, ListReport, RunReport, TaskOutcome};

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Trait for data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Trait for reports whose table rendering is their operator-facing lines
pub trait ReportDisplay {
    fn report_lines(&self) -> Vec<String>;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    /// Display a report according to the configured output format
    pub fn report<T>(&self, report: &T) -> Result<()>
    where
        T: Serialize + ReportDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(report)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                for line in report.report_lines() {
                    self.line(&line);
                }
            }
            OutputFormat::Compact => {
                println!("{}", report.to_compact());
            }
        }
        Ok(())
    }

    /// Print a line verbatim
    pub fn line(&self, text: &str) {
        if !self.options.quiet {
            println!("{text}");
        }
    }

    /// Display a success message with color and icon
    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.success)
            } else {
                format!(
                    "{} {}",
                    ICONS.success.color(THEME.success),
                    message.color(THEME.success)
                )
            };
            println!("{output}");
        }
    }

    /// Display a warning message
    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.warning)
            } else {
                format!(
                    "{} {}",
                    ICONS.warning.color(THEME.warning),
                    message.color(THEME.warning)
                )
            };
            println!("{output}");
        }
    }

    /// Display verbose information (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.arrow)
            } else {
                format!(
                    "{} {}",
                    ICONS.arrow.color(THEME.muted),
                    message.color(THEME.muted)
                )
            };
            eprintln!("{output}");
        }
    }

    /// Display info message with color and icon
    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.info)
            } else {
                format!(
                    "{} {}",
                    ICONS.info.color(THEME.info),
                    message.color(THEME.info)
                )
            };
            println!("{output}");
        }
    }
}

/// Create a themed table
pub fn create_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();

    if !options.no_color {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    } else {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    }

    table
}

/// Add themed header to table
pub fn add_table_header(options: &GlobalOptions, table: &mut Table, headers: &[&str]) {
    let header_cells: Vec<Cell> = if options.no_color {
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect()
    } else {
        headers
            .iter()
            .map(|h| {
                Cell::new(h)
                    .add_attribute(Attribute::Bold)
                    .fg(TableColor::Cyan)
            })
            .collect()
    };
    table.set_header(header_cells);
}

impl ReportDisplay for ListReport {
    fn report_lines(&self) -> Vec<String> {
        self.lines()
    }

    fn to_compact(&self) -> String {
        let databases: Vec<String> = self
            .databases
            .iter()
            .map(|db| match &db.error {
                Some(_) => format!("{}=error", db.database),
                None => format!("{}={}", db.database, db.pending.len()),
            })
            .collect();
        format!("pending: {}", databases.join(" "))
    }
}

impl ReportDisplay for RunReport {
    fn report_lines(&self) -> Vec<String> {
        self.lines()
    }

    fn to_compact(&self) -> String {
        let databases: Vec<String> = self
            .databases
            .iter()
            .map(|db| match &db.error {
                Some(_) => format!("{}=failed({})", db.database, db.applied.len()),
                None => format!("{}={}", db.database, db.applied.len()),
            })
            .collect();
        format!("applied: {}", databases.join(" "))
    }
}

impl ReportDisplay for GateOutcome {
    // The abort message travels with the process error.
    fn report_lines(&self) -> Vec<String> {
        self.listing.lines()
    }

    fn to_compact(&self) -> String {
        if self.passed() {
            format!("gate {}: passed", self.group)
        } else if self.listing.has_pending() {
            format!("gate {}: {} pending", self.group, self.listing.total_pending())
        } else {
            format!("gate {}: unverified {}", self.group, self.unverified().join(","))
        }
    }
}

impl ReportDisplay for TaskOutcome {
    fn report_lines(&self) -> Vec<String> {
        match self {
            TaskOutcome::Listed(report) => report.report_lines(),
            TaskOutcome::Ran(report) => report.report_lines(),
            TaskOutcome::Gate(outcome) => outcome.report_lines(),
        }
    }

    fn to_compact(&self) -> String {
        match self {
            TaskOutcome::Listed(report) => report.to_compact(),
            TaskOutcome::Ran(report) => report.to_compact(),
            TaskOutcome::Gate(outcome) => outcome.to_compact(),
        }
    }
}
