//! The case data model (spec §3, §9 "duck-typed case objects" redesign).
//!
//! `InputSource` replaces jd4's `partial(open, name)` callables with an
//! explicit, restartable trait: every call to [`InputSource::open`] must
//! yield a fresh stream positioned at zero, so the same source can feed a
//! FIFO writer and later be re-read by the comparator.

use std::io;
use std::io::Read;

/// A restartable byte-stream producer. Concrete implementations live in
/// `judge-core` (an archive member, an in-memory buffer, a judge-produced
/// answer) since they need access to the open problem bundle.
pub trait InputSource: Send + Sync {
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Limits and metadata shared by every case variant.
#[derive(Debug, Clone)]
pub struct CaseLimits {
    /// 1-based position in judged order.
    pub index: u32,
    pub time_limit_ns: u64,
    pub memory_limit_bytes: u64,
    pub process_limit: u32,
    pub score: u32,
    /// Per-case override of the package's execute file.
    pub execute_file: Option<String>,
    /// Per-case override of the package's argv (shell-split already).
    pub execute_args: Option<Vec<String>>,
}

impl CaseLimits {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.time_limit_ns == 0 {
            return Err("time_limit_ns must be strictly positive");
        }
        if self.memory_limit_bytes == 0 {
            return Err("memory_limit_bytes must be strictly positive");
        }
        if self.process_limit == 0 {
            return Err("process_limit must be strictly positive");
        }
        Ok(())
    }
}

/// One judged test, as a tagged union over the three variants named in
/// spec §3. Dispatch to `judge(package)` happens in `judge-core` where the
/// sandbox layer is available; this type only carries the data.
pub enum Case {
    Default(DefaultCase),
    CustomJudge(CustomJudgeCase),
    Synthetic(SyntheticCase),
}

impl Case {
    pub fn limits(&self) -> &CaseLimits {
        match self {
            Case::Default(c) => &c.limits,
            Case::CustomJudge(c) => &c.limits,
            Case::Synthetic(c) => &c.limits,
        }
    }
}

pub struct DefaultCase {
    pub limits: CaseLimits,
    pub open_input: Box<dyn InputSource>,
    pub open_output: Box<dyn InputSource>,
}

pub struct CustomJudgeCase {
    pub limits: CaseLimits,
    /// Read twice: once to feed the user program's stdin, once more to feed
    /// the judge program's "extra" input (spec §4.H) — the judge computes
    /// its own notion of the expected answer, there is no separate
    /// reference-answer source.
    pub open_input: Box<dyn InputSource>,
    pub open_judge_source: Box<dyn InputSource>,
    pub judge_language: String,
}

/// For tests: input is `"{a} {b}\n"`, expected output is `"{a+b}"`.
pub struct SyntheticCase {
    pub limits: CaseLimits,
    pub a: i64,
    pub b: i64,
}

impl InputSource for SyntheticCase {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        let text = format!("{} {}\n", self.a, self.b);
        Ok(Box::new(io::Cursor::new(text.into_bytes())))
    }
}

impl SyntheticCase {
    pub fn open_output(&self) -> Box<dyn Read + Send> {
        let text = (self.a + self.b).to_string();
        Box::new(io::Cursor::new(text.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn synthetic_case_produces_expected_streams() {
        let case = SyntheticCase {
            limits: CaseLimits {
                index: 1,
                time_limit_ns: 1_000_000_000,
                memory_limit_bytes: 256 * 1024 * 1024,
                process_limit: 1,
                score: 10,
                execute_file: None,
                execute_args: None,
            },
            a: 1,
            b: 2,
        };
        let mut input = String::new();
        case.open().unwrap().read_to_string(&mut input).unwrap();
        assert_eq!(input, "1 2\n");

        let mut output = String::new();
        case.open_output().read_to_string(&mut output).unwrap();
        assert_eq!(output, "3");
    }

    #[test]
    fn limits_reject_zero_time() {
        let limits = CaseLimits {
            index: 1,
            time_limit_ns: 0,
            memory_limit_bytes: 1,
            process_limit: 1,
            score: 0,
            execute_file: None,
            execute_args: None,
        };
        assert!(limits.validate().is_err());
    }
}
