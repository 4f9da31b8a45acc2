use std::path::PathBuf;

use clap::Parser;
use judge_common::CommonCliArgs;

/// `judge-daemon`: reads submissions as NDJSON from stdin, judges each
/// against its problem bundle on disk, and streams progress events as
/// NDJSON to stdout. Shaped after `codex-exec`'s non-interactive CLI: all
/// configuration up front, then a plain read-judge-emit loop.
#[derive(Debug, Parser)]
#[command(name = "judge-daemon", version, about = "Judge worker execution core")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonCliArgs,

    /// Root directory backing each pooled sandbox's `in/`/`out/` tree.
    #[arg(long, default_value = "sandboxes")]
    pub sandbox_root: PathBuf,

    /// Root directory cgroups-v2 resource groups are created under.
    /// Must already exist as a cgroups-v2 controller directory with
    /// `cpu`/`memory`/`pids` delegated to this process.
    #[arg(long, default_value = "/sys/fs/cgroup/judge")]
    pub cgroup_root: PathBuf,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn defaults_parse_from_bare_invocation() {
        let cli = Cli::parse_from(["judge-daemon"]);
        assert_eq!(cli.common.pool_size, 4);
        assert_eq!(cli.sandbox_root, PathBuf::from("sandboxes"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from(["judge-daemon", "--pool-size", "8", "--sandbox-root", "/tmp/boxes"]);
        assert_eq!(cli.common.pool_size, 8);
        assert_eq!(cli.sandbox_root, PathBuf::from("/tmp/boxes"));
    }
}
