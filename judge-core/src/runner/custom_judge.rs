//! The custom-judge case runner (spec §4.H): a user program and a
//! judge-authored checker program, each sandboxed under independent
//! limits. Grounded on jd4's `CustomJudgeCase.judge` in `case.py`, with one
//! simplification: jd4 wires the two processes through live pipes (the
//! user program's stdout hardlinked straight into the judge's stdin, both
//! children running at once); since this crate's sandbox backend is a
//! plain subprocess rather than a namespaced jail (spec §1), the user
//! program's full output is captured first and replayed into the judge
//! program's stdin and "extra" input afterward — same two-process, two-FIFO
//! contract (stdin/stdout/stderr plus an `extra` feed of the original
//! input), but the data dependency is resolved host-side instead of by a
//! live pipe. The judge program always runs, even when the user program
//! itself failed, so judge malfunction can still be detected and takes
//! precedence over the user's own failure (spec §4.H verdict precedence).

use std::path::Path;

use judge_protocol::CaseResult;
use judge_protocol::Verdict;
use judge_protocol::case::CaseLimits;
use judge_protocol::case::CustomJudgeCase;
use judge_protocol::snippet;
use judge_sandbox::CallArgs;
use judge_sandbox::ExitOutcome;
use judge_sandbox::ResourceLimits;
use judge_sandbox::ResourceUsage;
use judge_sandbox::Sandbox;
use judge_sandbox::SandboxPool;
use judge_sandbox::pipe::make_fifo;
use judge_sandbox::pipe::read_bounded;
use judge_sandbox::pipe::write_from;
use judge_sandbox::resource::run as run_controlled;

use crate::build::Package;
use crate::error::Error;
use crate::error::Result;

const MAX_USER_OUTPUT_BYTES: usize = 64 * 1024 * 1024;
const JUDGE_STDOUT_CAP: usize = 4 * 1024;

/// Resource budget for the judge program itself, independent of the case's
/// own limits (spec §4.H): `DEFAULT_TIME_NS` cpu, `user_time + DEFAULT_TIME_NS`
/// wall, `DEFAULT_MEMORY_BYTES` memory, the default process limit — same
/// constants jd4's `case.py` names `DEFAULT_TIME_NS`/`DEFAULT_MEMORY_BYTES`/
/// `PROCESS_LIMIT`.
const JUDGE_TIME_NS: u64 = 1_000_000_000;
const JUDGE_MEMORY_BYTES: u64 = 256 * 1024 * 1024;
const JUDGE_PROCESS_LIMIT: u32 = 64;
const USER_PROCESS_LIMIT: u32 = 64;

pub struct CustomJudgeRunner;

impl CustomJudgeRunner {
    pub async fn judge(
        pool: &SandboxPool,
        cgroup_root: &Path,
        run_name: &str,
        user_package: &Package,
        judge_package: &Package,
        case: &CustomJudgeCase,
    ) -> CaseResult {
        let mut sandboxes = pool.acquire(2).await;
        let (head, tail) = sandboxes.split_at_mut(1);
        let result = run_case(
            cgroup_root,
            run_name,
            user_package,
            judge_package,
            case,
            &mut head[0],
            &mut tail[0],
        )
        .await;
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
    user_package: &Package,
    judge_package: &Package,
    case: &CustomJudgeCase,
    user_sandbox: &mut Sandbox,
    judge_sandbox: &mut Sandbox,
) -> Result<CaseResult> {
    user_sandbox.reset().await?;
    judge_sandbox.reset().await?;

    let user_executable = user_package
        .install(
            user_sandbox,
            case.limits.execute_file.as_deref(),
            case.limits.execute_args.as_deref(),
        )
        .await?;
    let judge_executable = judge_package.install(judge_sandbox, None, None).await?;

    let (user_outcome, user_usage, stdout_bytes, stderr_bytes) =
        run_user_program(cgroup_root, run_name, user_sandbox, &user_executable, case).await?;
    let raw_exit_status = user_outcome.raw_status();
    let user_precheck = precheck_status(&case.limits, &user_outcome, &user_usage);

    let (judge_outcome, judge_usage, judge_status, judge_score, answer_bytes) = run_judge_program(
        cgroup_root,
        run_name,
        judge_sandbox,
        &judge_executable,
        case,
        &stdout_bytes,
    )
    .await?;

    // Precedence per spec §4.H: judge malfunction first, then the user
    // program's own failure, then the judge's parsed verdict.
    let (status, score) = if judge_malfunctioned(&judge_outcome, &judge_usage) {
        (Verdict::SystemError, 0)
    } else if let Some(status) = user_precheck {
        (status, 0)
    } else {
        (judge_status, judge_score)
    };

    Ok(CaseResult {
        status,
        score,
        time_usage_ns: user_usage.time_usage_ns,
        memory_usage_bytes: user_usage.memory_usage_bytes,
        stdout_snippet: snippet(&stdout_bytes),
        stderr_snippet: snippet(&stderr_bytes),
        expected_snippet: snippet(&answer_bytes),
        raw_exit_status,
    })
}

/// If the user program itself failed (MLE/TLE/RE), its own status is
/// reported unless the judge malfunctioned (spec §4.H precedence: "user
/// MLE/TLE/RE" ranks below "judge malfunction" but above the parsed
/// verdict).
fn precheck_status(limits: &CaseLimits, outcome: &ExitOutcome, usage: &ResourceUsage) -> Option<Verdict> {
    if usage.memory_usage_bytes >= limits.memory_limit_bytes {
        Some(Verdict::MemoryLimitExceeded)
    } else if matches!(outcome, ExitOutcome::WallTimeout(_)) || usage.time_usage_ns >= limits.time_limit_ns {
        Some(Verdict::TimeLimitExceeded)
    } else if outcome.raw_status() != 0 {
        Some(Verdict::RuntimeError)
    } else {
        None
    }
}

/// Spec §4.H: "judge malfunction (non-zero exit / TLE / MLE)" — checked
/// against the judge's own fixed budget, never the case's.
fn judge_malfunctioned(outcome: &ExitOutcome, usage: &ResourceUsage) -> bool {
    outcome.raw_status() != 0
        || matches!(outcome, ExitOutcome::WallTimeout(_))
        || usage.time_usage_ns >= JUDGE_TIME_NS
        || usage.memory_usage_bytes >= JUDGE_MEMORY_BYTES
}

async fn run_user_program(
    cgroup_root: &Path,
    run_name: &str,
    sandbox: &mut Sandbox,
    executable: &crate::build::Executable,
    case: &CustomJudgeCase,
) -> Result<(ExitOutcome, ResourceUsage, Vec<u8>, Vec<u8>)> {
    let stdin_path = sandbox.in_dir().join("stdin");
    let stdout_path = sandbox.in_dir().join("stdout");
    let stderr_path = sandbox.in_dir().join("stderr");
    make_fifo(&stdin_path)?;
    make_fifo(&stdout_path)?;
    make_fifo(&stderr_path)?;

    let args = CallArgs::new(executable.file.clone(), executable.argv.clone(), "/in/cgroup")
        .with_stdio("/in/stdin", "/in/stdout", "/in/stderr");
    let child = sandbox.spawn(args)?;

    // User program: the case's own limits, and the default process limit
    // regardless of what the case descriptor requested (spec §4.H: "the
    // default PROCESS_LIMIT (64)").
    let limits = ResourceLimits {
        cpu_ns: case.limits.time_limit_ns,
        wall_ns: case.limits.time_limit_ns,
        memory_bytes: case.limits.memory_limit_bytes,
        process_limit: USER_PROCESS_LIMIT,
    };
    let socket_path = sandbox.in_dir().join("cgroup");

    let mut input = case.open_input.open()?;
    let mut input_bytes = Vec::new();
    std::io::Read::read_to_end(&mut input, &mut input_bytes)?;

    let (write_result, stdout_bytes, stderr_bytes, controller_result) = tokio::join!(
        write_from(&stdin_path, std::io::Cursor::new(input_bytes), true),
        read_bounded(&stdout_path, MAX_USER_OUTPUT_BYTES),
        read_bounded(&stderr_path, MAX_USER_OUTPUT_BYTES),
        run_controlled(cgroup_root, run_name, &socket_path, limits, child),
    );
    write_result?;
    let stdout_bytes = stdout_bytes?;
    let stderr_bytes = stderr_bytes?;
    let (outcome, usage) = controller_result?;
    Ok((outcome, usage, stdout_bytes, stderr_bytes))
}

async fn run_judge_program(
    cgroup_root: &Path,
    run_name: &str,
    sandbox: &mut Sandbox,
    executable: &crate::build::Executable,
    case: &CustomJudgeCase,
    user_output: &[u8],
) -> Result<(ExitOutcome, ResourceUsage, Verdict, u32, Vec<u8>)> {
    // Re-read `open_input` for the judge's "extra" feed — the judge
    // computes its own notion of the expected answer from the original
    // input, there is no separate stored reference answer (spec §4.H).
    let mut original_input = case.open_input.open()?;
    let mut input_bytes = Vec::new();
    std::io::Read::read_to_end(&mut original_input, &mut input_bytes)?;

    let stdin_path = sandbox.in_dir().join("stdin");
    let stdout_path = sandbox.in_dir().join("stdout");
    let stderr_path = sandbox.in_dir().join("stderr");
    let extra_path = sandbox.in_dir().join("extra");
    make_fifo(&stdin_path)?;
    make_fifo(&stdout_path)?;
    make_fifo(&stderr_path)?;
    make_fifo(&extra_path)?;

    let args = CallArgs::new(executable.file.clone(), executable.argv.clone(), "/in/cgroup")
        .with_stdio("/in/stdin", "/in/stdout", "/in/stderr")
        .with_extra("/in/extra");
    let child = sandbox.spawn(args)?;

    let limits = ResourceLimits {
        cpu_ns: JUDGE_TIME_NS,
        wall_ns: case.limits.time_limit_ns + JUDGE_TIME_NS,
        memory_bytes: JUDGE_MEMORY_BYTES,
        process_limit: JUDGE_PROCESS_LIMIT,
    };
    let socket_path = sandbox.in_dir().join("cgroup");

    let (write_result, extra_write_result, stdout_bytes, _stderr_bytes, controller_result) = tokio::join!(
        write_from(&stdin_path, std::io::Cursor::new(user_output.to_vec()), false),
        write_from(&extra_path, std::io::Cursor::new(input_bytes), true),
        read_bounded(&stdout_path, JUDGE_STDOUT_CAP),
        read_bounded(&stderr_path, JUDGE_STDOUT_CAP),
        run_controlled(cgroup_root, run_name, &socket_path, limits, child),
    );
    write_result?;
    extra_write_result?;
    let stdout_bytes = stdout_bytes?;
    let (outcome, usage) = controller_result?;

    if judge_malfunctioned(&outcome, &usage) {
        return Ok((outcome, usage, Verdict::SystemError, 0, Vec::new()));
    }

    match parse_judge_verdict(&stdout_bytes) {
        Some((status, score)) => Ok((outcome, usage, status, score, Vec::new())),
        // A judge program that can't be understood is this crate's own
        // failure mode, never the contestant's — always SystemError (spec
        // §9 resolved Open Question).
        None => Ok((outcome, usage, Verdict::SystemError, 0, Vec::new())),
    }
}

/// Parses `"<status> <score>"` from the judge program's stdout (spec §4.H:
/// "parse the judge's stdout as two whitespace-separated integers"), per
/// the original judge's own `status, score = map(int, judge_stdout.split())`.
/// Either token missing, non-integer, or an unrecognised status code is a
/// parse failure — the caller maps that to `SystemError` (spec §9 resolved
/// Open Question 3), never to the contestant's fault.
fn parse_judge_verdict(stdout: &[u8]) -> Option<(Verdict, u32)> {
    let text = std::str::from_utf8(stdout).ok()?;
    let mut tokens = text.split_whitespace();
    let status_code: i64 = tokens.next()?.parse().ok()?;
    let score: u32 = tokens.next()?.parse().ok()?;
    let status = Verdict::from_judge_status_code(status_code)?;
    Some((status, score))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn parses_accepted_with_explicit_score() {
        assert_eq!(parse_judge_verdict(b"1 80\n"), Some((Verdict::Accepted, 80)));
    }

    #[test]
    fn parses_wrong_answer() {
        assert_eq!(parse_judge_verdict(b"2 0\n"), Some((Verdict::WrongAnswer, 0)));
    }

    #[test]
    fn matches_spec_scenario_six() {
        // spec §8 scenario 6: judge echoes "1 7" regardless of user output.
        assert_eq!(parse_judge_verdict(b"1 7"), Some((Verdict::Accepted, 7)));
    }

    #[test]
    fn unparseable_output_is_none() {
        assert_eq!(parse_judge_verdict(b"garbage"), None);
        assert_eq!(parse_judge_verdict(b""), None);
        assert_eq!(parse_judge_verdict(b"AC 80"), None);
    }

    #[test]
    fn unknown_status_code_is_none() {
        assert_eq!(parse_judge_verdict(b"99 0"), None);
    }

    #[test]
    fn judge_malfunction_detected_by_nonzero_exit() {
        let usage = ResourceUsage { time_usage_ns: 10, memory_usage_bytes: 10 };
        assert!(judge_malfunctioned(&ExitOutcome::Exited(1), &usage));
    }

    #[test]
    fn judge_malfunction_detected_by_its_own_time_budget() {
        let usage = ResourceUsage { time_usage_ns: JUDGE_TIME_NS, memory_usage_bytes: 0 };
        assert!(judge_malfunctioned(&ExitOutcome::Exited(0), &usage));
    }

    #[test]
    fn healthy_judge_run_is_not_a_malfunction() {
        let usage = ResourceUsage { time_usage_ns: 10, memory_usage_bytes: 10 };
        assert!(!judge_malfunctioned(&ExitOutcome::Exited(0), &usage));
    }
}
