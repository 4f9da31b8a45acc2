//! Case runners (spec §4.G, §4.H): given a built [`crate::build::Package`]
//! and a [`judge_protocol::case::Case`], run it under sandbox control and
//! produce a [`judge_protocol::CaseResult`]. Both runners share the
//! convention that a sandbox handle is always returned to the pool, even
//! when the run fails internally — a leaked handle would quietly shrink the
//! pool's capacity for the rest of the process.

pub mod custom_judge;
pub mod default;

pub use custom_judge::CustomJudgeRunner;
pub use default::DefaultCaseRunner;
