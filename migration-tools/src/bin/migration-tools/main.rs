mod commands;
mod examples;
mod output;
mod theme;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::{Color, Colorize, control::ShouldColorize};

use commands::{
    migrate::{GateArgs, GroupArgs, ListArgs, UpArgs, handle_gate, handle_group, handle_list, handle_up},
    tasks::{TaskArgs, handle_task, handle_tasks},
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME, help_styles};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("GROUP", "Active migration group (before, during, after, change)"),
    ("DATABASE", "Restrict commands to one configured database"),
    ("REDIS_URL", "Redis connection URL of the default primary database"),
    ("RUST_LOG", "Log verbosity, e.g. migration_tools=debug"),
];

#[derive(Parser)]
#[command(name = "migration-tools")]
#[command(version = "0.1.0")]
#[command(
    about = "Grouped migration runner for Redis",
    long_about = r#"Grouped migration runner for Redis.

Every migration belongs to a group that says when it may run relative to
a deployment: before, during, after or change. Listing, execution and the
deployment gate all work on one group at a time, across every configured
database."#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to migration-tools.toml (defaults to the nearest one)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending migrations, optionally for one group
    List(ListArgs),

    /// Run pending migrations for a group
    Group(GroupArgs),

    /// Exit non-zero while a group has pending migrations
    Gate(GateArgs),

    /// Run every pending migration in version order
    Up(UpArgs),

    /// Run a named task (db:migrate:list, db:migrate:group:<group>, ...)
    Task(TaskArgs),

    /// List the named tasks
    Tasks,
}

impl Cli {
    /// Parse arguments against the themed command, with examples in `--help`.
    fn parse_themed() -> Self {
        let help = HelpText {
            use_color: ShouldColorize::from_env().should_colorize(),
        };
        let matches = help.command().get_matches();
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
}

/// Long-help appendices: environment variables on the root, examples per command.
struct HelpText {
    use_color: bool,
}

impl HelpText {
    fn command(&self) -> Command {
        let mut command = Cli::command()
            .styles(help_styles())
            .color(if self.use_color { ColorChoice::Auto } else { ColorChoice::Never })
            .after_long_help(self.environment());
        for example in command_examples() {
            let appendix = self.examples(example.groups);
            command = command.mut_subcommand(example.name, |sub| sub.after_long_help(appendix));
        }
        command
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        match (self.use_color, bold) {
            (false, _) => text.to_string(),
            (true, false) => text.color(color).to_string(),
            (true, true) => text.color(color).bold().to_string(),
        }
    }

    fn examples(&self, groups: &[ExampleGroup]) -> String {
        let blocks: Vec<String> = groups
            .iter()
            .map(|group| {
                let mut block = format!("  {}\n", self.paint(group.title, THEME.primary, true));
                for command in group.commands {
                    block.push_str(&format!(
                        "    {} {}\n",
                        self.paint(ICONS.arrow, THEME.secondary, false),
                        self.paint(command, THEME.secondary, false)
                    ));
                }
                block
            })
            .collect();
        format!("{}\n{}", self.paint("Examples:", THEME.highlight, true), blocks.join("\n"))
    }

    fn environment(&self) -> String {
        let mut buffer = format!("{}\n", self.paint("Environment Variables:", THEME.highlight, true));
        for (key, description) in ENVIRONMENT_VARIABLES {
            buffer.push_str(&format!(
                "  {}  {}\n",
                self.paint(key, THEME.key, true),
                self.paint(description, THEME.value, false)
            ));
        }
        buffer.push_str(&format!(
            "\n{} {}\n",
            self.paint("Tip:", THEME.highlight, true),
            self.paint(
                "Use 'migration-tools <command> --help' to view examples for each command.",
                THEME.secondary,
                false
            )
        ));
        buffer
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_themed();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });
    let config = cli.config.as_deref();

    match cli.command {
        Commands::List(args) => handle_list(args, config, &output).await,
        Commands::Group(args) => handle_group(args, config, &output).await,
        Commands::Gate(args) => handle_gate(args, config, &output).await,
        Commands::Up(args) => handle_up(args, config, &output).await,
        Commands::Task(args) => handle_task(args, config, &output).await,
        Commands::Tasks => handle_tasks(&output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        HelpText { use_color: false }.command().debug_assert();
    }

    #[test]
    fn test_plain_examples_appendix() {
        let text = HelpText { use_color: false }.examples(commands::migrate::GATE_EXAMPLES);
        assert!(text.starts_with("Examples:\n  Deployment Gate\n    → migration-tools gate before"));
    }
}
