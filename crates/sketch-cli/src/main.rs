use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use sketch::parser::parse_program;
use sketch::{
    ExecutionOutcome, LineView, Playground, PlaygroundConfig, RenderOptions, RunScheduler, TransformError, instrument,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sketch")]
#[command(about = "Live evaluation for TypeScript scratchpads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the nearest sketch.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script once and print its output next to the source lines
    Run {
        /// Path to a .ts or .js file
        file: PathBuf,
        #[command(flatten)]
        display: DisplayArgs,
        /// Print the outcome and view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run inline code
    Eval {
        /// The code to run
        code: String,
        #[command(flatten)]
        display: DisplayArgs,
        /// Print the outcome and view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check if a script parses
    Check {
        /// Path to a .ts or .js file
        file: PathBuf,
    },
    /// Print the code that actually runs
    Instrument {
        /// Path to a .ts or .js file
        file: PathBuf,
    },
    /// Re-run a script whenever it changes
    Watch {
        /// Path to a .ts or .js file
        file: PathBuf,
        #[command(flatten)]
        display: DisplayArgs,
    },
}

#[derive(Args, Clone, Copy)]
struct DisplayArgs {
    /// Stack output in call order instead of matching source lines
    #[arg(long)]
    serial: bool,
    /// Hide line numbers
    #[arg(long)]
    no_line_numbers: bool,
    /// Print the source next to the output
    #[arg(long)]
    with_source: bool,
    /// Color output by kind
    #[arg(long)]
    color: bool,
}

impl DisplayArgs {
    fn apply(&self, config: &mut PlaygroundConfig) {
        config.display.match_lines &= !self.serial;
        config.display.show_line_numbers &= !self.no_line_numbers;
    }
}

#[derive(Serialize)]
struct Report<'a> {
    outcome: &'a ExecutionOutcome,
    view: &'a LineView,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a str>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { file, display, json } => {
            let source = read_source(&file)?;
            display.apply(&mut config);
            run_once(&source, &config, display, json)?;
        }
        Commands::Eval { code, display, json } => {
            display.apply(&mut config);
            run_once(&code, &config, display, json)?;
        }
        Commands::Check { file } => {
            let source = read_source(&file)?;
            check(&source, &file);
        }
        Commands::Instrument { file } => {
            let source = read_source(&file)?;
            match instrument(&source) {
                Ok(instrumented) => {
                    if let Some(note) = &instrumented.degraded {
                        eprintln!("warning: capture injection skipped: {note}");
                    }
                    println!("{}", instrumented.code);
                }
                Err(error) => {
                    eprint!("{}", error.report(&file.display().to_string(), &source));
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch { file, display } => {
            display.apply(&mut config);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(&file, &config, display))?;
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<PlaygroundConfig> {
    let current_dir = std::env::current_dir().context("Failed to read the working directory")?;
    let (config, path) = PlaygroundConfig::load(explicit, &current_dir).context("Failed to load configuration")?;
    if let Some(path) = path {
        log::info!("Using {}", path.display());
    }
    Ok(config)
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn render(playground: &Playground, display: DisplayArgs) -> String {
    let settings = playground.settings();
    playground.view().render(&RenderOptions {
        line_numbers: settings.show_line_numbers,
        source: display.with_source.then_some(playground.source()),
        color: display.color,
        active_line: None,
    })
}

fn run_once(source: &str, config: &PlaygroundConfig, display: DisplayArgs, json: bool) -> Result<()> {
    let mut playground = Playground::new(config);
    playground.run(source);

    if json {
        let report = Report {
            outcome: playground.outcome(),
            view: playground.view(),
            diagnostics: playground.diagnostics(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(note) = playground.diagnostics() {
            eprintln!("warning: capture injection skipped: {note}");
        }
        print!("{}", render(&playground, display));
        if let Some(failure) = &playground.outcome().failure {
            eprintln!("{failure}");
        }
    }

    if playground.outcome().is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn check(source: &str, file: &Path) {
    match parse_program(source) {
        Ok(program) => {
            println!("OK: {} top-level statements", program.len());
        }
        Err(errors) => {
            let filename = file.display().to_string();
            for error in errors {
                eprint!("{}", TransformError::from(error).report(&filename, source));
            }
            std::process::exit(1);
        }
    }
}

/// Feeds every change of `file` to the scheduler and redraws after each settled run.
async fn watch(file: &Path, config: &PlaygroundConfig, display: DisplayArgs) -> Result<()> {
    let (sender, mut changes) = tokio::sync::mpsc::unbounded_channel::<()>();
    let file_name = file.file_name().map(ToOwned::to_owned);
    let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| match result {
        Ok(event) => {
            let touches_file = event
                .paths
                .iter()
                .any(|path| path.file_name() == file_name.as_deref());
            if touches_file && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                let _ = sender.send(());
            }
        }
        Err(error) => log::error!("File watcher error: {error}"),
    })
    .context("Failed to create file watcher")?;

    // Editors often replace the file, so watch its directory.
    let directory = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    watcher
        .watch(directory, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", directory.display()))?;

    let mut scheduler = RunScheduler::new(config.scheduler.settle_delay());
    let mut playground = Playground::new(config);
    let mut submitted = read_source(file)?;
    scheduler.submit(submitted.clone());

    loop {
        tokio::select! {
            Some(()) = changes.recv() => match fs::read_to_string(file) {
                Ok(source) if source != submitted => {
                    submitted = source.clone();
                    scheduler.submit(source);
                }
                Ok(_) => {}
                Err(error) => log::warn!("Failed to read {}: {error}", file.display()),
            },
            rendered = scheduler.run_next(|source| {
                playground.run(source);
                render(&playground, display)
            }) => {
                print!("\x1b[2J\x1b[H{rendered}");
                if let Some(failure) = &playground.outcome().failure {
                    println!("\n{failure}");
                }
                println!("\nWatching {} (Ctrl-C to stop)", file.display());
            }
        }
    }
}
