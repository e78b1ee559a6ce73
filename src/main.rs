//! Famulus - Entry Point
//!
//! Wires the dispatcher from configuration and drives it either from a
//! one-shot `run` invocation or an interactive prompt loop.

use clap::{Parser, Subcommand};
use famulus::core::config::AssistantConfig;
use famulus::core::error::Result;
use famulus::dispatch::{DispatchOutcome, Dispatcher};

use directories::ProjectDirs;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;

#[derive(Parser)]
#[command(name = "famulus", about = "Local command assistant with sandboxed plugins")]
struct Cli {
    /// Path to the configuration TOML (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch a single command and exit
    Run {
        /// Command text, e.g. `famulus run open steam`
        command: Vec<String>,
        /// Skip confirmation gates
        #[arg(long)]
        yes: bool,
    },
    /// List discovered plugins
    Plugins,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "famulus=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let dispatcher = Dispatcher::new(&config)?;
    let rt = Runtime::new()?;

    match cli.command {
        Some(Command::Run { command, yes }) => {
            let text = command.join(" ");
            let outcome = rt.block_on(dispatcher.dispatch(&text, yes));
            print_outcome(&outcome);
            if !outcome.result.ok {
                std::process::exit(1);
            }
        }
        Some(Command::Plugins) => {
            for plugin in dispatcher.plugins().list() {
                println!(
                    "{} v{} [{}] - {}",
                    plugin.manifest.name,
                    plugin.manifest.version,
                    if plugin.enabled { "enabled" } else { "disabled" },
                    plugin.manifest.description
                );
            }
        }
        None => run_repl(&rt, &dispatcher)?,
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<AssistantConfig> {
    if let Some(path) = path {
        return AssistantConfig::load(path);
    }
    if let Some(dirs) = ProjectDirs::from("", "", "famulus") {
        let default_path = dirs.config_dir().join("config.toml");
        if default_path.exists() {
            return AssistantConfig::load(&default_path);
        }
        let mut config = AssistantConfig::default();
        config.data_dir = dirs.data_dir().to_path_buf();
        config.plugin_dir = dirs.data_dir().join("plugins");
        return Ok(config);
    }
    Ok(AssistantConfig::default())
}

fn run_repl(rt: &Runtime, dispatcher: &Dispatcher) -> Result<()> {
    println!("=== FAMULUS ===");
    println!("Type a command, /help for an overview, quit to exit.");
    println!();

    let mut seen_suggestions = 0;
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            break;
        }

        let mut outcome = rt.block_on(dispatcher.dispatch(input, false));
        if outcome.result.needs_confirmation {
            print!("{} - proceed? [y/N] ", outcome.result.message);
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            if answer.trim().eq_ignore_ascii_case("y") {
                outcome = rt.block_on(dispatcher.dispatch(input, true));
            } else {
                println!("Cancelled.");
                continue;
            }
        }
        print_outcome(&outcome);

        // surface hints produced by automation rules since last prompt
        for suggestion in outcome.state.suggestions.iter().skip(seen_suggestions) {
            println!("  hint ({}): {}", suggestion.rule, suggestion.text);
        }
        seen_suggestions = outcome.state.suggestions.len();
    }

    println!("Goodbye.");
    Ok(())
}

fn print_outcome(outcome: &DispatchOutcome) {
    let marker = if outcome.result.ok { "ok" } else { "failed" };
    println!("[{}] {}", marker, outcome.result.message);
}
