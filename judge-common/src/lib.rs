//! Small utilities shared across the judge worker crates: tracing setup and
//! elapsed-time formatting. Mirrors the role of `codex-common` in the
//! teacher workspace — a landing spot for cross-cutting helpers that don't
//! deserve their own crate.

#[cfg(feature = "cli")]
pub mod cli;
pub mod elapsed;

#[cfg(feature = "cli")]
pub use cli::CommonCliArgs;
#[cfg(feature = "cli")]
pub use cli::init_tracing;
pub use elapsed::format_elapsed;
