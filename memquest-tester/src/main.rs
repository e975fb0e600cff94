mod autoplay;
mod reports;
mod runner;
mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use runner::{ScenarioResult, ScenarioRunner};
use scenario::{LevelSource, Scenario, list_scenarios, select_scenarios};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "memquest-tester", version)]
#[command(about = "Automated playthroughs and engine checks for MemQuest levels")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Also auto-play a level JSON file from disk
    #[arg(long)]
    level_file: Option<PathBuf>,

    /// Number of iterations per scenario
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = collect_scenarios(&args);
    let runner = ScenarioRunner::new(args.verbose);
    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        results.push(runner.run(scenario, args.iterations).await);
    }

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut out = open_output(args.output.as_deref())?;
    writeln!(out, "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(out, "  {key:20} - {description}")?;
    }
    out.flush()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 MemQuest Automated Tester".bright_cyan().bold());
    println!("{}", "============================".cyan());
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn collect_scenarios(args: &Args) -> Vec<Scenario> {
    let (mut scenarios, unknown) = select_scenarios(&split_csv(&args.scenarios));
    for key in unknown {
        eprintln!("⚠️  Unknown scenario: {}", key.yellow());
    }
    if let Some(path) = &args.level_file {
        scenarios.push(Scenario::playthrough(
            path.display().to_string(),
            "Auto-play a level file",
            LevelSource::File(path.clone()),
        ));
    }
    scenarios
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut out = open_output(args.output.as_deref())?;

    match args.report {
        ReportFormat::Json => reports::generate_json_report(out.as_mut(), results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    out,
                    "# MemQuest Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(out.as_mut(), results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(out, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(
                    out.as_mut(),
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(out)?;
            writeln!(out, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Report sink: the given file, or buffered stdout.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(stdout())),
    })
}
