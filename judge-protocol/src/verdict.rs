use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Per-case (and, via [`max`](Verdict::max), aggregate) status.
///
/// Ordering matters: `Accepted` sorts lowest and `SystemError` highest, so
/// an aggregate status is simply `cases.iter().map(|c| c.status).max()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompileError,
    SystemError,
    /// Transient, never part of a stored final result.
    Judging,
    /// Transient, never part of a stored final result.
    Compiling,
}

impl Verdict {
    pub fn max(self, other: Verdict) -> Verdict {
        std::cmp::max(self, other)
    }

    /// Maps the numeric status code a custom judge program reports on its
    /// stdout (spec §4.H: `"<status> <score>"`) to a [`Verdict`]. These are
    /// the status codes the original judge's custom-judge protocol speaks
    /// on the wire (`status, score = map(int, judge_stdout.split())`);
    /// `None` for any code the judge protocol never emits on that channel
    /// (judging/compiling are daemon-internal, not judge-reported).
    pub fn from_judge_status_code(code: i64) -> Option<Verdict> {
        match code {
            1 => Some(Verdict::Accepted),
            2 => Some(Verdict::WrongAnswer),
            3 => Some(Verdict::TimeLimitExceeded),
            4 => Some(Verdict::MemoryLimitExceeded),
            6 => Some(Verdict::RuntimeError),
            7 => Some(Verdict::CompileError),
            8 => Some(Verdict::SystemError),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn accepted_is_lowest() {
        assert!(Verdict::Accepted < Verdict::WrongAnswer);
        assert!(Verdict::WrongAnswer < Verdict::SystemError);
        assert_eq!(Verdict::Accepted.max(Verdict::WrongAnswer), Verdict::WrongAnswer);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Verdict::TimeLimitExceeded).unwrap();
        assert_eq!(json, "\"TIME_LIMIT_EXCEEDED\"");
    }

    #[test]
    fn judge_status_code_one_is_accepted() {
        assert_eq!(Verdict::from_judge_status_code(1), Some(Verdict::Accepted));
        assert_eq!(Verdict::from_judge_status_code(2), Some(Verdict::WrongAnswer));
    }

    #[test]
    fn unknown_judge_status_code_is_none() {
        assert_eq!(Verdict::from_judge_status_code(99), None);
    }
}
