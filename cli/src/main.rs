mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use manuscript::document::{self, Document};
use manuscript::parser::ParseError;
use sandbox::NodeExecutor;

use crate::config::Config;
use crate::test_runner::Orchestrator;

const SUBCOMMANDS: &[&str] = &["test", "lint", "stats", "list", "help"];

#[derive(Parser)]
#[command(name = "folio", version, about = "Runs the code samples of a Markdown book")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file (defaults to ./folio.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every code sample and run it
    Test(TestArgs),

    /// Check in-book links against heading anchors
    Lint(DirArgs),

    /// Count code examples and lines of code
    Stats(DirArgs),

    /// List the test names `test` would run
    List(TestArgs),
}

#[derive(clap::Args)]
struct DirArgs {
    /// Manuscript directory (overrides the config)
    dir: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Manuscript directory (overrides the config)
    dir: Option<PathBuf>,

    /// Run only tests whose name contains this text
    #[arg(short, long)]
    filter: Option<String>,
}

fn main() {
    init_tracing();

    let mut args: Vec<String> = std::env::args().collect();
    insert_default_subcommand(&mut args);
    let cli = Cli::parse_from(&args);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(2);
        }
    }
}

/// `folio`, `folio book/` and `folio --filter Setup` work like the same
/// invocation with `test` in front.
fn insert_default_subcommand(args: &mut Vec<String>) {
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "--config" {
            i += 2;
            continue;
        }
        if is_test_option(arg) {
            args.insert(i, "test".to_string());
            return;
        }
        if !arg.starts_with('-') {
            if !SUBCOMMANDS.contains(&arg) {
                args.insert(i, "test".to_string());
            }
            return;
        }
        i += 1;
    }
    args.push("test".to_string());
}

fn is_test_option(arg: &str) -> bool {
    arg == "--filter" || arg.starts_with("--filter=") || arg.starts_with("-f")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Test(args) => do_test(&config, args, cli.no_color, color_choice, false),
        Command::List(args) => do_test(&config, args, cli.no_color, color_choice, true),
        Command::Lint(args) => {
            let documents = load(&config, args.dir.as_deref())?;
            do_lint(&config, &documents)
        }
        Command::Stats(args) => {
            let documents = load(&config, args.dir.as_deref())?;
            let stats = manuscript::stats::count(&documents);
            println!("Number of code examples: {}", stats.examples);
            println!("Number of lines of code: {}", stats.lines);
            Ok(0)
        }
    }
}

fn load(config: &Config, dir: Option<&Path>) -> Result<Vec<Document>> {
    let dir = dir.unwrap_or(config.manuscript.as_path());
    let documents = document::load_dir(dir).context("cannot load the manuscript")?;
    tracing::info!(dir = %dir.display(), documents = documents.len(), "loaded manuscript");
    Ok(documents)
}

fn do_test(
    config: &Config,
    args: TestArgs,
    no_color: bool,
    color_choice: ColorChoice,
    list_only: bool,
) -> Result<i32> {
    let documents = load(config, args.dir.as_deref())?;

    let trees = match test_runner::parse_all(&documents) {
        Ok(trees) => trees,
        Err(errors) => {
            emit_parse_errors(&documents, &errors, color_choice);
            return Ok(1);
        }
    };

    let options = config.extract_options()?;

    if list_only {
        let mut orchestrator = Orchestrator::new(NoExecutor, options).with_filter(args.filter);
        test_runner::print_plan(&orchestrator.plan(&documents, &trees));
        return Ok(0);
    }

    let executor = NodeExecutor::new(&config.runtime.node, &config.environment(), config.transpiler()?)
        .context("cannot start the sample runner")?
        .with_timeout(config.timeout()?);
    let mut orchestrator = Orchestrator::new(executor, options).with_filter(args.filter);
    let suites = orchestrator.plan(&documents, &trees);
    if suites.is_empty() {
        eprintln!("no tests matched");
        return Ok(1);
    }
    let results = orchestrator.run(&suites);
    Ok(test_runner::print_report(&results, no_color))
}

/// Executor for `folio list`, which plans but never runs.
struct NoExecutor;

impl sandbox::Executor for NoExecutor {
    fn execute(
        &self,
        _unit: &str,
        _display_name: &str,
        _language: manuscript::sample::Language,
    ) -> sandbox::Verdict {
        sandbox::Verdict::Pass
    }
}

fn do_lint(config: &Config, documents: &[Document]) -> Result<i32> {
    let report = manuscript::lint::lint(documents, &config.lint_ignore);
    for violation in &report.violations {
        eprintln!("{}", violation);
    }
    eprintln!(
        "checked {} links against {} anchors: {} problem(s)",
        report.links,
        report.anchors,
        report.violations.len()
    );
    Ok(if report.is_clean() { 0 } else { 1 })
}

fn emit_parse_errors(documents: &[Document], errors: &[ParseError], color_choice: ColorChoice) {
    // Ids follow document order, matching the ids used while parsing.
    let mut files = SimpleFiles::new();
    for document in documents {
        files.add(document.path.display().to_string(), document.text.clone());
    }

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }
}
