//! The default case runner (spec §4.G): one sandboxed process, stdin fed
//! from the case's input source, stdout/stderr captured through FIFOs, and
//! the result compared against the case's expected output. Grounded on
//! jd4's `DefaultCase.do_input`/`do_output`/`do_output_str` plumbing in
//! `case.py`, generalized from jd4's callback style into a single
//! `tokio::try_join!` of writer/readers/controller.

use std::io::Read as _;
use std::path::Path;

use judge_protocol::CaseResult;
use judge_protocol::Verdict;
use judge_protocol::case::DefaultCase;
use judge_protocol::snippet;
use judge_sandbox::CallArgs;
use judge_sandbox::ExitOutcome;
use judge_sandbox::ResourceLimits;
use judge_sandbox::Sandbox;
use judge_sandbox::SandboxPool;
use judge_sandbox::pipe::make_fifo;
use judge_sandbox::pipe::read_bounded;
use judge_sandbox::pipe::write_from;
use judge_sandbox::resource::run as run_controlled;

use crate::build::Package;
use crate::compare::outputs_match;
use crate::error::Error;
use crate::error::Result;

/// Full program output is captured (not just the display snippet) so it can
/// be compared against the expected output; this bounds that capture
/// independently of [`judge_protocol::SNIPPET_CAP`].
const MAX_OUTPUT_BYTES: usize = 64 * 1024 * 1024;

pub struct DefaultCaseRunner;

impl DefaultCaseRunner {
    /// Judges one case. Internal failures (sandbox errors, I/O errors)
    /// never propagate past this call — they resolve to
    /// [`CaseResult::system_error`], because one case's infrastructure
    /// failure must not abort the rest of the submission (spec §7).
    pub async fn judge(
        pool: &SandboxPool,
        cgroup_root: &Path,
        run_name: &str,
        package: &Package,
        case: &DefaultCase,
    ) -> CaseResult {
        let mut sandboxes = pool.acquire(1).await;
        let result = run_case(cgroup_root, run_name, package, case, &mut sandboxes[0]).await;
        pool.release(sandboxes).await;
        match result {
            Ok(case_result) => case_result,
            Err(e) => CaseResult::system_error(e.to_string()),
        }
    }
}

async fn run_case(
    cgroup_root: &Path,
    run_name: &str,
    package: &Package,
    case: &DefaultCase,
    sandbox: &mut Sandbox,
) -> Result<CaseResult> {
    sandbox.reset().await?;
    let executable = package
        .install(
            sandbox,
            case.limits.execute_file.as_deref(),
            case.limits.execute_args.as_deref(),
        )
        .await?;

    let stdin_path = sandbox.in_dir().join("stdin");
    let stdout_path = sandbox.in_dir().join("stdout");
    let stderr_path = sandbox.in_dir().join("stderr");
    make_fifo(&stdin_path)?;
    make_fifo(&stdout_path)?;
    make_fifo(&stderr_path)?;

    let args = CallArgs::new(executable.file.clone(), executable.argv.clone(), "/in/cgroup")
        .with_stdio("/in/stdin", "/in/stdout", "/in/stderr");
    let child = sandbox.spawn(args)?;

    let limits = &case.limits;
    let resource_limits = ResourceLimits {
        cpu_ns: limits.time_limit_ns,
        wall_ns: limits.time_limit_ns,
        memory_bytes: limits.memory_limit_bytes,
        process_limit: limits.process_limit,
    };
    let socket_path = sandbox.in_dir().join("cgroup");

    let mut input_stream = case.open_input.open()?;
    let stdin_path_for_writer = stdin_path.clone();
    let writer = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut input_stream, &mut buf)?;
        Ok(buf)
    });
    let input_bytes = writer.await.map_err(|e| Error::System(e.to_string()))??;

    let (write_result, stdout_bytes, stderr_bytes, controller_result) = tokio::join!(
        write_from(&stdin_path_for_writer, std::io::Cursor::new(input_bytes), true),
        read_bounded(&stdout_path, MAX_OUTPUT_BYTES),
        read_bounded(&stderr_path, MAX_OUTPUT_BYTES),
        run_controlled(cgroup_root, run_name, &socket_path, resource_limits, child),
    );
    write_result?;
    let stdout_bytes = stdout_bytes?;
    let stderr_bytes = stderr_bytes?;
    let (outcome, usage) = controller_result?;

    let mut expected = Vec::new();
    case.open_output.open()?.read_to_end(&mut expected)?;

    Ok(score_case(limits, outcome, usage, &stdout_bytes, &stderr_bytes, &expected))
}

fn score_case(
    limits: &judge_protocol::case::CaseLimits,
    outcome: ExitOutcome,
    usage: judge_sandbox::ResourceUsage,
    stdout_bytes: &[u8],
    stderr_bytes: &[u8],
    expected: &[u8],
) -> CaseResult {
    let raw_exit_status = outcome.raw_status();
    let status = if usage.memory_usage_bytes >= limits.memory_limit_bytes {
        Verdict::MemoryLimitExceeded
    } else if matches!(outcome, ExitOutcome::WallTimeout(_)) || usage.time_usage_ns >= limits.time_limit_ns {
        Verdict::TimeLimitExceeded
    } else if raw_exit_status != 0 {
        Verdict::RuntimeError
    } else if outputs_match(stdout_bytes, expected) {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    };

    let score = if status == Verdict::Accepted { limits.score } else { 0 };

    CaseResult {
        status,
        score,
        time_usage_ns: usage.time_usage_ns,
        memory_usage_bytes: usage.memory_usage_bytes,
        stdout_snippet: snippet(stdout_bytes),
        stderr_snippet: snippet(stderr_bytes),
        expected_snippet: snippet(expected),
        raw_exit_status,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn exceeding_memory_limit_wins_over_everything_else() {
        let limits = judge_protocol::case::CaseLimits {
            index: 1,
            time_limit_ns: 1_000_000_000,
            memory_limit_bytes: 1024,
            process_limit: 1,
            score: 10,
            execute_file: None,
            execute_args: None,
        };
        let usage = judge_sandbox::ResourceUsage {
            time_usage_ns: 10,
            memory_usage_bytes: 2048,
        };
        let result = score_case(&limits, ExitOutcome::Exited(0), usage, b"3", b"", b"3");
        assert_eq!(result.status, Verdict::MemoryLimitExceeded);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn wall_timeout_is_time_limit_exceeded() {
        let limits = judge_protocol::case::CaseLimits {
            index: 1,
            time_limit_ns: 1_000_000_000,
            memory_limit_bytes: u64::MAX,
            process_limit: 1,
            score: 10,
            execute_file: None,
            execute_args: None,
        };
        let usage = judge_sandbox::ResourceUsage {
            time_usage_ns: 1_000_000_000,
            memory_usage_bytes: 0,
        };
        let result = score_case(&limits, ExitOutcome::WallTimeout(-9), usage, b"", b"", b"");
        assert_eq!(result.status, Verdict::TimeLimitExceeded);
    }

    #[test]
    fn nonzero_exit_is_runtime_error() {
        let limits = judge_protocol::case::CaseLimits {
            index: 1,
            time_limit_ns: 1_000_000_000,
            memory_limit_bytes: u64::MAX,
            process_limit: 1,
            score: 10,
            execute_file: None,
            execute_args: None,
        };
        let usage = judge_sandbox::ResourceUsage {
            time_usage_ns: 10,
            memory_usage_bytes: 0,
        };
        let result = score_case(&limits, ExitOutcome::Exited(1), usage, b"", b"", b"");
        assert_eq!(result.status, Verdict::RuntimeError);
    }

    #[test]
    fn matching_output_is_accepted_with_full_score() {
        let limits = judge_protocol::case::CaseLimits {
            index: 1,
            time_limit_ns: 1_000_000_000,
            memory_limit_bytes: u64::MAX,
            process_limit: 1,
            score: 10,
            execute_file: None,
            execute_args: None,
        };
        let usage = judge_sandbox::ResourceUsage {
            time_usage_ns: 10,
            memory_usage_bytes: 0,
        };
        let result = score_case(&limits, ExitOutcome::Exited(0), usage, b"3\n", b"", b"3\n");
        assert_eq!(result.status, Verdict::Accepted);
        assert_eq!(result.score, 10);
    }

    #[test]
    fn mismatched_output_is_wrong_answer_with_zero_score() {
        let limits = judge_protocol::case::CaseLimits {
            index: 1,
            time_limit_ns: 1_000_000_000,
            memory_limit_bytes: u64::MAX,
            process_limit: 1,
            score: 10,
            execute_file: None,
            execute_args: None,
        };
        let usage = judge_sandbox::ResourceUsage {
            time_usage_ns: 10,
            memory_usage_bytes: 0,
        };
        let result = score_case(&limits, ExitOutcome::Exited(0), usage, b"4\n", b"", b"3\n");
        assert_eq!(result.status, Verdict::WrongAnswer);
        assert_eq!(result.score, 0);
    }
}
