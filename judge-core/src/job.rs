//! The job orchestrator (spec §4.I): a linear per-submission state machine
//! `RECEIVE -> PREPARE -> COMPILING -> JUDGING -> DONE`, with short-circuits
//! to `COMPILE_ERROR` or `SYSTEM_ERROR`. Grounded on jd4's
//! `daemon.py::JudgeHandler.judge`/`do_submission`, generalized from its
//! callback-driven `self.next_update`/`self.end` calls into a plain
//! `emit: FnMut(ProgressEvent)` the caller supplies.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use judge_protocol::AggregateResult;
use judge_protocol::CaseResult;
use judge_protocol::FormatError;
use judge_protocol::ProgressEvent;
use judge_protocol::Verdict;
use judge_protocol::case::Case;
use judge_protocol::case::CustomJudgeCase;
use judge_protocol::case::DefaultCase;
use judge_protocol::event::CaseProgress;
use judge_protocol::submission::CodeKind;
use judge_protocol::submission::CodePayload;
use judge_protocol::submission::SubmissionDescriptor;
use judge_sandbox::SandboxPool;

use crate::build::ArchiveKind;
use crate::build::BuildRequest;
use crate::build::CodeSource;
use crate::build::Package;
use crate::build::build;
use crate::error::Error;
use crate::error::Result;
use crate::language::LanguageCatalog;
use crate::loader::ProblemBundle;
use crate::runner::CustomJudgeRunner;
use crate::runner::DefaultCaseRunner;
use crate::sources::SyntheticInputSource;
use crate::sources::SyntheticOutputSource;

/// Terminal result of [`Judge::run_submission`], distinct from the
/// `ProgressEvent`s streamed during the run — callers that don't care about
/// incremental progress can still tell how the submission ended.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Judged(AggregateResult),
    CompileError,
    SystemError(String),
}

/// Owns the shared state a submission needs to run: the language table, the
/// sandbox pool, and the cgroup root every resource controller creates
/// groups under. One instance is shared (via `&self`, never mutated) across
/// every concurrently-judged submission (spec §5: "across submissions:
/// fully independent modulo pool capacity").
pub struct Judge {
    catalog: Arc<LanguageCatalog>,
    pool: Arc<SandboxPool>,
    cgroup_root: PathBuf,
}

impl Judge {
    pub fn new(catalog: LanguageCatalog, pool: SandboxPool, cgroup_root: PathBuf) -> Self {
        Self {
            catalog: Arc::new(catalog),
            pool: Arc::new(pool),
            cgroup_root,
        }
    }

    /// Drives one submission end to end, calling `emit` for every progress
    /// event in submission order (spec §5: "progress events are emitted in
    /// submission order" even though cases themselves may run concurrently).
    /// Internal failures outside of a single case (bad bundle, unknown
    /// language, I/O error) are caught here and reported as a `SYSTEM_ERROR`
    /// end event, never propagated to the caller (spec §7).
    pub async fn run_submission(
        &self,
        descriptor: &SubmissionDescriptor,
        bundle_path: PathBuf,
        mut emit: impl FnMut(ProgressEvent),
    ) -> JobOutcome {
        tracing::info!(tag = %descriptor.tag, "job: RECEIVE");
        match self.run_inner(descriptor, bundle_path, &mut emit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(tag = %descriptor.tag, error = %e, "job: SYSTEM_ERROR");
                emit(ProgressEvent::End {
                    tag: descriptor.tag.clone(),
                    status: Verdict::SystemError,
                    score: 0,
                    time_ms: 0,
                    memory_kb: 0,
                });
                JobOutcome::SystemError(e.to_string())
            }
        }
    }

    async fn run_inner(
        &self,
        descriptor: &SubmissionDescriptor,
        bundle_path: PathBuf,
        emit: &mut impl FnMut(ProgressEvent),
    ) -> Result<JobOutcome> {
        // PREPARE
        tracing::debug!(tag = %descriptor.tag, "job: PREPARE");
        if !self.catalog.has(&descriptor.lang) {
            return Err(Error::UnknownLanguage(descriptor.lang.clone()));
        }
        let bundle = ProblemBundle::open(bundle_path)?;
        let config = bundle.load_config()?;
        let cases = config.build_cases(&bundle, &descriptor.judge_category)?;
        let compile_time_files = config.compile_time_files(&bundle)?;
        let runtime_files = config.runtime_files(&bundle)?;
        let language_override = config.language_override(&descriptor.lang);

        // COMPILING
        tracing::debug!(tag = %descriptor.tag, "job: COMPILING");
        let code = decode_code(descriptor)?;
        let request = BuildRequest {
            language: descriptor.lang.clone(),
            code,
            compile_time_files,
            runtime_files,
            language_override,
        };
        let build_run_name = format!("{}-build", descriptor.tag);
        let build_result = build(&self.catalog, &self.pool, &self.cgroup_root, &build_run_name, request).await;
        let (package, compiler_text) = match build_result {
            Ok(pair) => pair,
            Err(Error::Compile(text)) => {
                emit(ProgressEvent::Next {
                    tag: descriptor.tag.clone(),
                    status: Some(Verdict::CompileError),
                    compiler_text: Some(text),
                    case: None,
                    progress: None,
                });
                tracing::info!(tag = %descriptor.tag, "job: COMPILE_ERROR");
                emit(ProgressEvent::End {
                    tag: descriptor.tag.clone(),
                    status: Verdict::CompileError,
                    score: 0,
                    time_ms: 0,
                    memory_kb: 0,
                });
                return Ok(JobOutcome::CompileError);
            }
            Err(e) => return Err(e),
        };
        if !compiler_text.is_empty() {
            emit(ProgressEvent::Next {
                tag: descriptor.tag.clone(),
                status: None,
                compiler_text: Some(String::from_utf8_lossy(&compiler_text).into_owned()),
                case: None,
                progress: None,
            });
        }
        let package = Arc::new(package);

        // JUDGING
        tracing::debug!(tag = %descriptor.tag, cases = cases.len(), "job: JUDGING");
        let total = cases.len().max(1);
        let mut handles = Vec::with_capacity(cases.len());
        for case in cases {
            let index = case.limits().index;
            let catalog = self.catalog.clone();
            let pool = self.pool.clone();
            let cgroup_root = self.cgroup_root.clone();
            let package = package.clone();
            let run_name = format!("{}-case-{index}", descriptor.tag);
            handles.push(tokio::spawn(async move {
                judge_one_case(&catalog, &pool, &cgroup_root, &run_name, &package, case).await
            }));
        }

        let mut aggregate = AggregateResult::default();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(case_result) => case_result,
                Err(join_error) => CaseResult::system_error(format!("case task failed: {join_error}")),
            };
            aggregate.accumulate(&result);
            let index = i as u32 + 1;
            let progress = ((index as f64 / total as f64) * 100.0) as u32;
            let redacted = result.redact_for_caller(descriptor.show_detail);
            emit(ProgressEvent::Next {
                tag: descriptor.tag.clone(),
                status: Some(redacted.status),
                compiler_text: None,
                case: Some(CaseProgress::from_result(index, &redacted)),
                progress: Some(progress),
            });
        }

        // DONE
        tracing::info!(tag = %descriptor.tag, status = %aggregate.status_or_accepted(), "job: DONE");
        emit(ProgressEvent::end_from_aggregate(descriptor.tag.clone(), &aggregate));
        Ok(JobOutcome::Judged(aggregate))
    }
}

async fn judge_one_case(
    catalog: &LanguageCatalog,
    pool: &SandboxPool,
    cgroup_root: &Path,
    run_name: &str,
    package: &Package,
    case: Case,
) -> CaseResult {
    match case {
        Case::Default(default_case) => {
            DefaultCaseRunner::judge(pool, cgroup_root, run_name, package, &default_case).await
        }
        Case::Synthetic(synthetic) => {
            let adapted = DefaultCase {
                limits: synthetic.limits.clone(),
                open_input: Box::new(SyntheticInputSource { a: synthetic.a, b: synthetic.b }),
                open_output: Box::new(SyntheticOutputSource { sum: synthetic.a + synthetic.b }),
            };
            DefaultCaseRunner::judge(pool, cgroup_root, run_name, package, &adapted).await
        }
        Case::CustomJudge(custom_case) => {
            let judge_package = match build_judge_package(catalog, pool, cgroup_root, run_name, &custom_case).await {
                Ok(p) => p,
                Err(e) => return CaseResult::system_error(e.to_string()),
            };
            CustomJudgeRunner::judge(pool, cgroup_root, run_name, package, &judge_package, &custom_case).await
        }
    }
}

/// Builds the judge program's own package (spec §4.H: the judge is itself
/// built through the same language catalog as the submission). Built fresh
/// per case rather than cached across a submission's cases — the custom-
/// judge workload this crate targets is dominated by the user program's
/// resource-controlled run, not by recompiling a small checker.
async fn build_judge_package(
    catalog: &LanguageCatalog,
    pool: &SandboxPool,
    cgroup_root: &Path,
    run_name: &str,
    case: &CustomJudgeCase,
) -> Result<Package> {
    let mut source = String::new();
    std::io::Read::read_to_string(&mut case.open_judge_source.open()?, &mut source)?;
    let request = BuildRequest {
        language: case.judge_language.clone(),
        code: CodeSource::Text(source),
        compile_time_files: Vec::new(),
        runtime_files: Vec::new(),
        language_override: None,
    };
    let judge_run_name = format!("{run_name}-judge");
    let (package, _compiler_text) = build(catalog, pool, cgroup_root, &judge_run_name, request).await?;
    Ok(package)
}

/// Decodes a submission's code payload (spec §6: `code`/`code_type`) into
/// the [`CodeSource`] the builder expects. Archive bytes travel as
/// base64-encoded text in the descriptor (the transport layer this crate
/// doesn't own is assumed to have already pulled the raw bytes down and
/// encoded them, matching jd4's `base64.b64decode(code)` in `case.py`).
fn decode_code(descriptor: &SubmissionDescriptor) -> Result<CodeSource> {
    match (&descriptor.code, descriptor.code_type) {
        (CodePayload::Inline(text), CodeKind::Text) => Ok(CodeSource::Text(text.clone())),
        (CodePayload::Archive(encoded), CodeKind::Tar) => {
            Ok(CodeSource::Archive(decode_base64(encoded)?, ArchiveKind::Tar))
        }
        (CodePayload::Archive(encoded), CodeKind::Zip) => {
            Ok(CodeSource::Archive(decode_base64(encoded)?, ArchiveKind::Zip))
        }
        (CodePayload::Archive(_), CodeKind::Rar) => Err(Error::Format(FormatError {
            input: "code_type".to_string(),
            message: "RAR submissions are not supported".to_string(),
        })),
        _ => Err(Error::Format(FormatError {
            input: "code_type".to_string(),
            message: "code payload does not match code_type".to_string(),
        })),
    }
}

fn decode_base64(input: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|e| {
            Error::Format(FormatError {
                input: "code".to_string(),
                message: format!("invalid base64 submission archive: {e}"),
            })
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    use judge_protocol::submission::SubmissionKind;

    fn catalog() -> LanguageCatalog {
        LanguageCatalog::from_yaml(
            r#"
python:
  type: interpreter
  code_file: main.py
  execute_file: /usr/bin/python3
  execute_args: "main.py"
"#,
        )
        .unwrap()
    }

    fn descriptor(lang: &str) -> SubmissionDescriptor {
        SubmissionDescriptor {
            tag: "t1".to_string(),
            kind: SubmissionKind::Submission,
            domain_id: "d".to_string(),
            pid: "p".to_string(),
            rid: "r".to_string(),
            lang: lang.to_string(),
            code: CodePayload::Inline("print(1)".to_string()),
            code_type: CodeKind::Text,
            judge_category: Vec::new(),
            show_detail: true,
        }
    }

    #[tokio::test]
    async fn unknown_language_is_system_error() {
        let judge = Judge::new(catalog(), SandboxPool::new(vec![]), PathBuf::from("/unused"));
        let mut events = Vec::new();
        let outcome = judge
            .run_submission(&descriptor("cobol"), PathBuf::from("/no/such/bundle.zip"), |e| events.push(e))
            .await;
        assert!(matches!(outcome, JobOutcome::SystemError(_)));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::End { status: Verdict::SystemError, .. }));
    }

    #[tokio::test]
    async fn missing_bundle_is_system_error_not_a_panic() {
        let judge = Judge::new(catalog(), SandboxPool::new(vec![]), PathBuf::from("/unused"));
        let mut events = Vec::new();
        let outcome = judge
            .run_submission(&descriptor("python"), PathBuf::from("/no/such/bundle.zip"), |e| events.push(e))
            .await;
        assert!(matches!(outcome, JobOutcome::SystemError(_)));
    }

    #[tokio::test]
    async fn decode_code_rejects_mismatched_payload() {
        let mut d = descriptor("python");
        d.code_type = CodeKind::Tar;
        d.code = CodePayload::Inline("not base64 archive".to_string());
        assert!(decode_code(&d).is_err());
    }
}
