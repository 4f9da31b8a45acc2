//! Sandboxed execution primitives: the sandbox handle and pool (spec §4.A,
//! §4.B), the resource-group controller (§4.C), and bounded FIFO I/O
//! (§4.D). Everything above the level of "run one child with limits" lives
//! in `judge-core`.

pub mod call;
pub mod cgroup;
pub mod error;
pub mod handle;
pub mod pipe;
pub mod pool;
pub mod resource;

pub use call::CallArgs;
pub use call::CallKind;
pub use error::Error;
pub use error::Result;
pub use handle::Sandbox;
pub use pool::SandboxPool;
pub use resource::ExitOutcome;
pub use resource::ResourceLimits;
pub use resource::ResourceUsage;
