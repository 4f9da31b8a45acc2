use serde::Deserialize;
use serde::Serialize;

use crate::snippet;
use crate::verdict::Verdict;

/// The outcome of judging a single case (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub status: Verdict,
    pub score: u32,
    pub time_usage_ns: u64,
    pub memory_usage_bytes: u64,
    #[serde(with = "snippet_as_string")]
    pub stdout_snippet: Vec<u8>,
    #[serde(with = "snippet_as_string")]
    pub stderr_snippet: Vec<u8>,
    #[serde(with = "snippet_as_string")]
    pub expected_snippet: Vec<u8>,
    /// Negative values indicate termination by signal `-raw_exit_status`.
    pub raw_exit_status: i32,
}

impl CaseResult {
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            status: Verdict::SystemError,
            score: 0,
            time_usage_ns: 0,
            memory_usage_bytes: 0,
            stdout_snippet: Vec::new(),
            stderr_snippet: snippet(message.into().as_bytes()),
            expected_snippet: Vec::new(),
            raw_exit_status: 0,
        }
    }

    /// Per jd4's `show_detail` gate: stderr is always forwarded for
    /// diagnostics, stdout/expected are blanked unless the caller asked for
    /// full detail.
    pub fn redact_for_caller(mut self, show_detail: bool) -> Self {
        if !show_detail {
            self.stdout_snippet.clear();
            self.expected_snippet.clear();
        }
        self
    }
}

/// Per-submission rollup (spec §3): status is the max of case statuses
/// under [`Verdict`]'s ordering, score and time sum, memory takes the max.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateResult {
    pub status: Option<Verdict>,
    pub score: u32,
    pub time_usage_ns: u64,
    pub memory_usage_bytes: u64,
}

impl AggregateResult {
    pub fn accumulate(&mut self, case: &CaseResult) {
        self.status = Some(match self.status {
            Some(current) => current.max(case.status),
            None => case.status,
        });
        self.score += case.score;
        self.time_usage_ns += case.time_usage_ns;
        self.memory_usage_bytes = self.memory_usage_bytes.max(case.memory_usage_bytes);
    }

    pub fn status_or_accepted(&self) -> Verdict {
        self.status.unwrap_or(Verdict::Accepted)
    }
}

mod snippet_as_string {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn case(status: Verdict, score: u32, time_ns: u64, mem: u64) -> CaseResult {
        CaseResult {
            status,
            score,
            time_usage_ns: time_ns,
            memory_usage_bytes: mem,
            stdout_snippet: Vec::new(),
            stderr_snippet: Vec::new(),
            expected_snippet: Vec::new(),
            raw_exit_status: 0,
        }
    }

    #[test]
    fn aggregate_takes_max_status_sum_score_sum_time_max_memory() {
        let mut agg = AggregateResult::default();
        agg.accumulate(&case(Verdict::Accepted, 5, 100, 1024));
        agg.accumulate(&case(Verdict::WrongAnswer, 0, 200, 4096));
        assert_eq!(agg.status_or_accepted(), Verdict::WrongAnswer);
        assert_eq!(agg.score, 5);
        assert_eq!(agg.time_usage_ns, 300);
        assert_eq!(agg.memory_usage_bytes, 4096);
    }

    #[test]
    fn redact_blanks_stdout_and_expected_only() {
        let mut result = case(Verdict::WrongAnswer, 0, 0, 0);
        result.stdout_snippet = b"out".to_vec();
        result.stderr_snippet = b"err".to_vec();
        result.expected_snippet = b"exp".to_vec();
        let redacted = result.redact_for_caller(false);
        assert!(redacted.stdout_snippet.is_empty());
        assert!(redacted.expected_snippet.is_empty());
        assert_eq!(redacted.stderr_snippet, b"err");
    }
}
