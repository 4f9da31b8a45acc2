//! Entry point for the `judge-daemon` binary: the ambient CLI/config/logging
//! shell around `judge-core`'s orchestrator (spec §1's stated Non-goal list
//! excludes the HTTP/WebSocket job-fetch transport, so this revision reads
//! submissions as newline-delimited JSON from stdin instead — see
//! `queue::QueuedSubmission`). Grounded on `codex-exec`'s `main.rs`: parse
//! CLI, init tracing, run a read-dispatch-emit loop, exit 0 on a clean
//! stream end.

mod cli;
mod queue;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use judge_core::JobOutcome;
use judge_core::Judge;
use judge_core::LanguageCatalog;
use judge_protocol::ProgressEvent;
use judge_sandbox::Sandbox;
use judge_sandbox::SandboxPool;
use queue::QueuedSubmission;
use tokio::io::AsyncBufReadExt as _;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    judge_common::init_tracing();
    let cli = Cli::parse();

    let languages_yaml = std::fs::read_to_string(&cli.common.languages)
        .with_context(|| format!("reading language table {}", cli.common.languages.display()))?;
    let catalog = LanguageCatalog::from_yaml(&languages_yaml).context("parsing language table")?;

    std::fs::create_dir_all(&cli.sandbox_root)
        .with_context(|| format!("creating sandbox root {}", cli.sandbox_root.display()))?;

    let sandboxes = (0..cli.common.pool_size)
        .map(|id| Sandbox::new(id as u32, cli.sandbox_root.join(format!("sandbox-{id}"))))
        .collect();
    let pool = SandboxPool::new(sandboxes);
    tracing::info!(pool_size = cli.common.pool_size, "judge-daemon: sandbox pool ready");
    let judge = Judge::new(catalog, pool, cli.cgroup_root.clone());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let queued: QueuedSubmission = match serde_json::from_str(&line) {
            Ok(queued) => queued,
            Err(e) => {
                tracing::warn!(error = %e, "judge-daemon: skipping malformed submission line");
                continue;
            }
        };
        let tag = queued.descriptor.tag.clone();
        tracing::info!(tag = %tag, pid = %queued.descriptor.pid, "judge-daemon: dispatching submission");
        let outcome = judge
            .run_submission(&queued.descriptor, queued.bundle_path.clone(), emit_event)
            .await;
        log_outcome(&tag, &outcome);
    }

    Ok(())
}

/// Writes one progress event as a single NDJSON line to stdout. stderr
/// carries tracing output; stdout carries only the event stream, matching
/// spec §6's "progress events ... JSON objects" contract.
fn emit_event(event: ProgressEvent) {
    match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "judge-daemon: failed to serialize progress event"),
    }
}

fn log_outcome(tag: &str, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Judged(aggregate) => {
            tracing::info!(tag, status = %aggregate.status_or_accepted(), score = aggregate.score, "judge-daemon: submission judged");
        }
        JobOutcome::CompileError => {
            tracing::info!(tag, "judge-daemon: submission failed to compile");
        }
        JobOutcome::SystemError(message) => {
            tracing::warn!(tag, %message, "judge-daemon: submission ended in a system error");
        }
    }
}
