use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use tracebox::analysis::compute_writes;
use tracebox::engine::Engine;
use tracebox::lang::parse_with_recovery;
use tracebox::normalize::normalize;
use tracebox::record::{
    block_start_lines, record_a, record_b, sibling_path, write_json, STATUS_CLEAN,
    STATUS_RUNTIME_FAILURE, STATUS_STATIC_FAILURE,
};
use tracebox::spec::{locate_blocks, verify_blocks};
use tracebox::synth::{collect_var_names, synthesize, EngineRunner};
use tracebox::trace::{
    project, ForcedBinding, Timeline, TraceRecorder, DEFAULT_TRACE_BUDGET, SYNTH_TRACE_BUDGET,
};

#[derive(Parser)]
#[command(name = "tracebox")]
#[command(about = "Execution tracer and example-based spec verifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a source file, project its timeline, and verify example blocks
    Run {
        /// Source file to trace
        file: PathBuf,
        /// JSON file of forced-value overrides keyed by (line, time)
        #[arg(long)]
        values: Option<PathBuf>,
        /// Recording step budget override
        #[arg(long)]
        budget: Option<u64>,
    },
    /// Search the fixed statement templates against one example
    Synth {
        /// JSON file holding a [before, after] environment pair
        example: PathBuf,
        /// Source file the variable names are collected from
        code: PathBuf,
    },
}

/// One forced-value override from the `--values` file.
#[derive(Debug, Deserialize)]
struct ForcedEntry {
    line: usize,
    time: u64,
    values: BTreeMap<String, String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            values,
            budget,
        } => run_trace(&file, values.as_deref(), budget),
        Commands::Synth { example, code } => run_synth(&example, &code),
    }
}

fn run_trace(file: &Path, values: Option<&Path>, budget: Option<u64>) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let normalized = normalize(&text);
    let blocks = locate_blocks(&normalized.raw);

    let record_a_path = sibling_path(file, ".out");
    let record_b_path = sibling_path(file, ".tests.out");

    let mut runnable = normalized.runnable.clone();
    let program = match parse_with_recovery(&mut runnable) {
        Ok(program) => program,
        Err(err) => {
            // Flush best-effort artifacts before propagating.
            let empty_a = record_a(
                STATUS_STATIC_FAILURE,
                &Default::default(),
                &Timeline::default(),
            );
            write_json(&record_a_path, &empty_a)
                .with_context(|| format!("failed to write {}", record_a_path.display()))?;
            let empty_b = record_b(&Default::default(), &BTreeMap::new());
            write_json(&record_b_path, &empty_b)
                .with_context(|| format!("failed to write {}", record_b_path.display()))?;
            return Err(err.into());
        }
    };

    let writes = compute_writes(&program);
    let budget = budget.unwrap_or(if blocks.is_empty() {
        DEFAULT_TRACE_BUDGET
    } else {
        SYNTH_TRACE_BUDGET
    });
    let overrides = match values {
        Some(path) => load_forced_values(path)?,
        None => Vec::new(),
    };

    let engine = Engine::default();
    let mut recorder =
        TraceRecorder::new(&program.statements, budget).with_overrides(overrides);
    let fault = engine
        .run(&program, BTreeMap::new(), Some(&mut recorder))
        .err();
    let projected = project(&recorder.finish(), &program.statements);

    let status = if fault.is_some() {
        STATUS_RUNTIME_FAILURE
    } else {
        STATUS_CLEAN
    };
    write_json(&record_a_path, &record_a(status, &writes, &projected))
        .with_context(|| format!("failed to write {}", record_a_path.display()))?;

    let outcomes = verify_blocks(&blocks, &projected, &engine);
    write_json(
        &record_b_path,
        &record_b(&outcomes, &block_start_lines(&blocks)),
    )
    .with_context(|| format!("failed to write {}", record_b_path.display()))?;

    // Both records are on disk; an uncaught program fault is re-raised.
    match fault {
        Some(fault) => Err(fault.into()),
        None => Ok(()),
    }
}

fn load_forced_values(path: &Path) -> Result<Vec<ForcedBinding>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries: Vec<ForcedEntry> =
        serde_json::from_str(&text).context("forced-values file must be a JSON array")?;
    Ok(entries
        .into_iter()
        .map(|e| ForcedBinding {
            line: e.line,
            time: e.time,
            values: e.values.into_iter().collect(),
        })
        .collect())
}

fn run_synth(example: &Path, code: &Path) -> Result<()> {
    let example_text = fs::read_to_string(example)
        .with_context(|| format!("failed to read {}", example.display()))?;
    let (before, after): (BTreeMap<String, JsonValue>, BTreeMap<String, JsonValue>) =
        serde_json::from_str(&example_text)
            .context("example file must be a [before, after] pair")?;
    let before = raw_env(before);
    let after = raw_env(after);

    let code_text = fs::read_to_string(code)
        .with_context(|| format!("failed to read {}", code.display()))?;
    let mut runnable = normalize(&code_text).runnable;
    let program = parse_with_recovery(&mut runnable)?;
    let vars: Vec<String> = collect_var_names(&program).into_iter().collect();

    let runner = EngineRunner(Engine::default());
    let synthesized = synthesize(&runner, &before, &after, &vars);

    let out_path = sibling_path(example, ".out");
    fs::write(&out_path, synthesized.as_deref().unwrap_or("None"))
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("{}", synthesized.as_deref().unwrap_or("None"));
    Ok(())
}

fn raw_env(env: BTreeMap<String, JsonValue>) -> BTreeMap<String, String> {
    env.into_iter()
        .map(|(name, value)| {
            let raw = match value {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            (name, raw)
        })
        .collect()
}
