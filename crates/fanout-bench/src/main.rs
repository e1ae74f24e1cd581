//! Benchmark harness for the fanout executors, batcher, and ledger.
//!
//! Runs simulated I/O-bound work (sleeping work items, a fixed fraction of
//! which fail) through each component and prints a JSON report:
//! - `executor`: bounded-concurrent executor
//! - `sequential`: sequential executor
//! - `sharded`: thread-sharded executor
//! - `batching`: token batcher over generated documents
//! - `pipeline`: batch, fan out, report progress, publish

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use fanout_core::TaskError;
use fanout_runtime::{
    BoundedTaskExecutor, OutcomeSummary, ProgressLedger, Reference, RequestLog,
    SharedProgressLedger, StatusUpdate, TaskOutcome, ThreadShardedExecutor, TokenBatcher,
    ToolState, WorkItem,
};
use fanout_settings::FanoutSettings;
use serde::{Deserialize, Serialize};

const SCENARIOS: [&str; 5] = ["executor", "sequential", "sharded", "batching", "pipeline"];

#[derive(Debug, Parser)]
#[command(
    name = "fanout-bench",
    about = "Benchmark runner for the fanout executors, batcher, and ledger"
)]
struct Args {
    /// Scenario: `executor`, `sequential`, `sharded`, `batching`, `pipeline`, `all`.
    #[arg(long, default_value = "all")]
    scenario: String,

    /// Work items per scenario.
    #[arg(long, default_value_t = 100)]
    tasks: usize,

    /// In-flight ceiling (defaults to settings).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Shard threads (defaults to settings).
    #[arg(long)]
    threads: Option<usize>,

    /// Simulated latency per work item.
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// Fraction of work items that fail, 0.0..=1.0.
    #[arg(long, default_value_t = 0.1)]
    failure_rate: f64,

    /// Settings file (defaults to `~/.fanout/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optional output path for the JSON report.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Report {
    generated_at: String,
    scenarios: Vec<ScenarioResult>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScenarioResult {
    name: String,
    tasks: usize,
    wall_ms: f64,
    succeeded: usize,
    failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    batches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_text_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    references: Option<usize>,
    latency_ms: LatencyStats,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LatencyStats {
    p50: f64,
    p95: f64,
    mean: f64,
    min: f64,
    max: f64,
}

/// Resolved knobs shared by every scenario.
#[derive(Clone, Copy, Debug)]
struct Workload {
    tasks: usize,
    concurrency: usize,
    threads: usize,
    latency: Duration,
    failure_rate: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    fanout_settings::init_settings(load_config(args.config.as_deref())?);
    let settings = fanout_settings::get_settings();
    if settings.logging.json {
        fanout_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        fanout_core::logging::init_subscriber(&settings.logging.level);
    }

    let names = scenario_names(&args.scenario)?;
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.failure_rate),
        "failure rate must be within 0.0..=1.0"
    );
    let workload = Workload {
        tasks: args.tasks,
        concurrency: args
            .concurrency
            .unwrap_or(settings.executor.max_concurrent_tasks),
        threads: args.threads.unwrap_or(settings.sharding.max_threads),
        latency: Duration::from_millis(args.latency_ms),
        failure_rate: args.failure_rate,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build benchmark runtime")?;

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let result = match name {
            "executor" => runtime.block_on(run_executor(workload, false)),
            "sequential" => runtime.block_on(run_executor(workload, true)),
            "sharded" => run_sharded(workload)?,
            "batching" => run_batching(workload)?,
            "pipeline" => runtime.block_on(run_pipeline(workload))?,
            _ => unreachable!("validated scenario name"),
        };
        results.push(result);
    }

    let report = Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        scenarios: results,
    };
    let encoded = serde_json::to_string_pretty(&report)?;

    if let Some(path) = args.output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create benchmark output dir: {}", parent.display())
            })?;
        }
        std::fs::write(&path, &encoded)
            .with_context(|| format!("failed to write benchmark report: {}", path.display()))?;
        println!("{}", path.display());
    } else {
        println!("{encoded}");
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FanoutSettings> {
    match path {
        Some(path) => fanout_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings: {}", path.display())),
        None => fanout_settings::load_settings().context("failed to load settings"),
    }
}

fn scenario_names(name: &str) -> Result<Vec<&'static str>> {
    if name == "all" {
        return Ok(SCENARIOS.to_vec());
    }
    SCENARIOS
        .iter()
        .find(|s| **s == name)
        .map(|s| vec![*s])
        .ok_or_else(|| anyhow::anyhow!("unknown scenario: {name}"))
}

/// Whether item `i` fails. Spreads exactly `floor(n * rate)` failures over
/// the first `n` items.
fn should_fail(i: usize, rate: f64) -> bool {
    ((i + 1) as f64 * rate).floor() > (i as f64 * rate).floor()
}

/// A sleeping work item that reports its own latency in milliseconds.
fn simulated_item(i: usize, latency: Duration, fail: bool) -> WorkItem<f64> {
    WorkItem::from_task_result(move || async move {
        let started = Instant::now();
        tokio::time::sleep(latency).await;
        if fail {
            return Err(TaskError::new("SimulatedFailure", format!("item {i} failed")));
        }
        Ok(started.elapsed().as_secs_f64() * 1000.0)
    })
    .labeled(format!("item-{i}"))
}

fn simulated_items(workload: Workload) -> Vec<WorkItem<f64>> {
    (0..workload.tasks)
        .map(|i| simulated_item(i, workload.latency, should_fail(i, workload.failure_rate)))
        .collect()
}

fn tally(
    name: &str,
    workload: Workload,
    outcomes: &[TaskOutcome<f64>],
    wall: Duration,
) -> ScenarioResult {
    let summary = OutcomeSummary::from_outcomes(outcomes);
    let latencies: Vec<f64> = outcomes.iter().filter_map(|o| o.success().copied()).collect();
    ScenarioResult {
        name: name.to_string(),
        tasks: workload.tasks,
        wall_ms: wall.as_secs_f64() * 1000.0,
        succeeded: summary.succeeded,
        failed: summary.failed,
        latency_ms: summarize_latencies(&latencies),
        ..ScenarioResult::default()
    }
}

async fn run_executor(workload: Workload, sequential: bool) -> ScenarioResult {
    let mut executor = if sequential {
        BoundedTaskExecutor::sequential()
    } else {
        BoundedTaskExecutor::concurrent(workload.concurrency)
    };
    for item in simulated_items(workload) {
        let _ = executor.push(item);
    }
    let start = Instant::now();
    let outcomes = executor.run().await;
    let name = if sequential { "sequential" } else { "executor" };
    tally(name, workload, &outcomes, start.elapsed())
}

fn run_sharded(workload: Workload) -> Result<ScenarioResult> {
    let settings = fanout_settings::get_settings();
    let executor =
        ThreadShardedExecutor::new(workload.threads, settings.sharding.max_concurrent_per_thread);
    let start = Instant::now();
    let outcomes = executor
        .run(simulated_items(workload))
        .context("sharded run failed")?;
    Ok(tally("sharded", workload, &outcomes, start.elapsed()))
}

/// Documents of varied length, roughly 10 to 600 tokens each.
fn generate_documents(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let words = 8 + (i * 37) % 480;
            let body: Vec<String> = (0..words).map(|w| format!("w{}", (i + w) % 97)).collect();
            format!("doc-{i}: {}", body.join(" "))
        })
        .collect()
}

fn run_batching(workload: Workload) -> Result<ScenarioResult> {
    let settings = fanout_settings::get_settings();
    let batcher = TokenBatcher::from_settings(&settings.batching)?;
    let documents = generate_documents(workload.tasks);
    let start = Instant::now();
    let batches = batcher.split_texts(documents);
    Ok(ScenarioResult {
        name: "batching".to_string(),
        tasks: workload.tasks,
        wall_ms: start.elapsed().as_secs_f64() * 1000.0,
        succeeded: workload.tasks,
        batches: Some(batches.len()),
        ..ScenarioResult::default()
    })
}

async fn run_pipeline(workload: Workload) -> Result<ScenarioResult> {
    let settings = fanout_settings::get_settings();
    let batcher = TokenBatcher::from_settings(&settings.batching)?;
    let batches = batcher.split_texts(generate_documents(workload.tasks));
    let batch_count = batches.len();

    let ledger = SharedProgressLedger::new(ProgressLedger::from_settings(&settings.ledger));
    let log = RequestLog::new();
    let mut executor = BoundedTaskExecutor::concurrent(workload.concurrency);

    for (b, batch) in batches.into_iter().enumerate() {
        let ledger = ledger.clone();
        let log = log.clone();
        let fail = should_fail(b, workload.failure_rate);
        let latency = workload.latency;
        let _ = executor.push(WorkItem::from_task_result(move || async move {
            let started = Instant::now();
            let id = format!("batch-{b}");
            let ledger_err = |e: fanout_core::LedgerError| TaskError::from_error(&e);
            ledger
                .notify(&id, "summarize", "", ToolState::Started, None)
                .map_err(ledger_err)?;
            tokio::time::sleep(latency).await;

            let (state, message) = if fail {
                (ToolState::Failed, format!("Batch {b} failed"))
            } else {
                (
                    ToolState::Finished,
                    format!("Summarized {} documents [1]", batch.len()),
                )
            };
            let entry = log.record("bench", message.clone(), state);
            let source = Reference::new(1, format!("{id}-src"), format!("Batch {b}"))
                .with_source("bench", id.clone());
            ledger
                .notify_update(
                    &id,
                    StatusUpdate::new("summarize", message, state)
                        .with_references(vec![source])
                        .with_order(entry.order),
                )
                .map_err(ledger_err)?;

            if fail {
                return Err(TaskError::new("SimulatedFailure", format!("batch {b} failed")));
            }
            Ok(started.elapsed().as_secs_f64() * 1000.0)
        }));
    }

    let start = Instant::now();
    let outcomes = executor.run().await;
    let published = ledger.publish();
    let wall = start.elapsed();

    let mut result = tally("pipeline", workload, &outcomes, wall);
    result.batches = Some(batch_count);
    result.published_text_len = Some(published.text.len());
    result.references = Some(published.references.len());
    Ok(result)
}

fn summarize_latencies(latencies_ms: &[f64]) -> LatencyStats {
    if latencies_ms.is_empty() {
        return LatencyStats::default();
    }

    let mut sorted = latencies_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let len = sorted.len();
    let mean = sorted.iter().sum::<f64>() / len as f64;

    LatencyStats {
        p50: sorted[percentile_index(len, 0.50)],
        p95: sorted[percentile_index(len, 0.95)],
        mean,
        min: sorted[0],
        max: sorted[len - 1],
    }
}

fn percentile_index(len: usize, percentile: f64) -> usize {
    if len <= 1 {
        return 0;
    }
    let rank = ((len - 1) as f64 * percentile).round() as usize;
    rank.min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_expand_all() {
        assert_eq!(scenario_names("all").unwrap().len(), 5);
        assert_eq!(scenario_names("sharded").unwrap(), vec!["sharded"]);
        assert!(scenario_names("nope").is_err());
    }

    #[test]
    fn failure_pattern_matches_rate() {
        let failures = (0..100).filter(|&i| should_fail(i, 0.1)).count();
        assert_eq!(failures, 10);
        assert!(!(0..50).any(|i| should_fail(i, 0.0)));
        assert!((0..50).all(|i| should_fail(i, 1.0)));
    }

    #[test]
    fn latency_summary() {
        let stats = summarize_latencies(&[4.0, 1.0, 3.0, 2.0]);
        assert!((stats.mean - 2.5).abs() < f64::EPSILON);
        assert!((stats.min - 1.0).abs() < f64::EPSILON);
        assert!((stats.max - 4.0).abs() < f64::EPSILON);
        assert_eq!(percentile_index(1, 0.95), 0);
    }

    #[test]
    fn documents_vary_in_length() {
        let docs = generate_documents(5);
        assert_eq!(docs.len(), 5);
        assert!(docs[1].len() > docs[0].len());
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"sharding": {"maxThreads": 2}}"#).unwrap();
        let settings = load_config(Some(&path)).unwrap();
        assert_eq!(settings.sharding.max_threads, 2);
    }

    #[test]
    fn pipeline_publishes_one_reference_per_batch() {
        fanout_settings::init_settings(FanoutSettings::default());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let workload = Workload {
            tasks: 12,
            concurrency: 4,
            threads: 2,
            latency: Duration::from_millis(1),
            failure_rate: 0.0,
        };
        let result = runtime
            .block_on(run_pipeline(workload))
            .unwrap();
        assert_eq!(result.failed, 0);
        assert_eq!(result.references, result.batches);
        assert!(result.published_text_len.unwrap() > 0);
    }
}
