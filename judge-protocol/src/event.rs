use serde::Deserialize;
use serde::Serialize;

use crate::result::AggregateResult;
use crate::result::CaseResult;
use crate::verdict::Verdict;

/// Progress reported to the caller while a submission is judged (spec §6).
/// `next` carries partial fields or a nested `case`; `end` carries the
/// aggregate. Times are floored to milliseconds, memory to KiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum ProgressEvent {
    Next {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<Verdict>,
        #[serde(skip_serializing_if = "Option::is_none")]
        compiler_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        case: Option<CaseProgress>,
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u32>,
    },
    End {
        tag: String,
        status: Verdict,
        score: u32,
        time_ms: u64,
        memory_kb: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseProgress {
    pub index: u32,
    pub status: Verdict,
    pub score: u32,
    pub time_ms: u64,
    pub memory_kb: u64,
    pub stdout: String,
    pub stderr: String,
    pub answer: String,
    pub raw_exit_status: i32,
}

impl CaseProgress {
    pub fn from_result(index: u32, result: &CaseResult) -> Self {
        Self {
            index,
            status: result.status,
            score: result.score,
            time_ms: result.time_usage_ns / 1_000_000,
            memory_kb: result.memory_usage_bytes / 1024,
            stdout: String::from_utf8_lossy(&result.stdout_snippet).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr_snippet).into_owned(),
            answer: String::from_utf8_lossy(&result.expected_snippet).into_owned(),
            raw_exit_status: result.raw_exit_status,
        }
    }
}

impl ProgressEvent {
    pub fn end_from_aggregate(tag: impl Into<String>, aggregate: &AggregateResult) -> Self {
        ProgressEvent::End {
            tag: tag.into(),
            status: aggregate.status_or_accepted(),
            score: aggregate.score,
            time_ms: aggregate.time_usage_ns / 1_000_000,
            memory_kb: aggregate.memory_usage_bytes / 1024,
        }
    }
}
