//! The judging core: ties `judge-sandbox`'s primitives to submission
//! semantics. Owns the language registry & builder (spec §4.E), the
//! problem-package loader (§4.F), the two case runners (§4.G, §4.H), and
//! the per-submission job orchestrator (§4.I). `judge-daemon` is the only
//! consumer outside this crate's own tests.

pub mod build;
pub mod compare;
pub mod error;
pub mod job;
pub mod language;
pub mod loader;
pub mod runner;
pub mod sources;

pub use build::Package;
pub use error::Error;
pub use error::Result;
pub use job::JobOutcome;
pub use job::Judge;
pub use language::LanguageCatalog;
pub use loader::ProblemBundle;
pub use loader::ProblemConfig;
