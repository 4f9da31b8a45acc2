//! Low-level cgroups v2 plumbing backing the resource controller. Kept
//! separate from `resource.rs` so the async orchestration (accept, select,
//! destroy) reads without interleaved `/sys/fs/cgroup` bookkeeping.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use nix::unistd::Pid;

use crate::error::Error;
use crate::error::Result;
use crate::resource::ResourceLimits;

/// A cgroup created for exactly one run. `create` and `destroy` are the
/// only ways a group's lifetime is bounded; there is no implicit `Drop`
/// cleanup because destroying a cgroup is fallible (it must be empty) and
/// callers need to observe that failure.
pub struct ResourceGroup {
    path: PathBuf,
}

impl ResourceGroup {
    /// Creates a cgroup named `name` under `cgroup_root` (typically a
    /// sandbox-specific subtree of `/sys/fs/cgroup`) with the given limits
    /// already applied.
    pub fn create(cgroup_root: &Path, name: &str, limits: &ResourceLimits) -> Result<Self> {
        let path = cgroup_root.join(name);
        fs::create_dir(&path)
            .map_err(|e| Error::ResourceGroup(format!("create {}: {e}", path.display())))?;
        let group = ResourceGroup { path };
        group.write("memory.max", &limits.memory_bytes.to_string())?;
        group.write("pids.max", &limits.process_limit.to_string())?;
        // cpu.max: "$MAX $PERIOD" in microseconds; one period (100ms) with
        // MAX scaled to the cpu time budget caps sustained CPU usage
        // without needlessly throttling a burst that finishes under the
        // wall clock limit.
        let period_us: u64 = 100_000;
        let quota_us = (limits.cpu_ns / 1_000).max(period_us);
        group.write("cpu.max", &format!("{quota_us} {period_us}"))?;
        Ok(group)
    }

    fn write(&self, file: &str, value: &str) -> Result<()> {
        fs::write(self.path.join(file), value)
            .map_err(|e| Error::ResourceGroup(format!("write {file}: {e}")))
    }

    fn read(&self, file: &str) -> Result<String> {
        fs::read_to_string(self.path.join(file))
            .map_err(|e| Error::ResourceGroup(format!("read {file}: {e}")))
    }

    /// Moves `pid` into this group. Must happen before the peer execs, per
    /// the cgroup handshake (spec §4.C step 2-3).
    pub fn add_process(&self, pid: Pid) -> Result<()> {
        self.write("cgroup.procs", &pid.as_raw().to_string())
    }

    /// Bulk-kills every process currently in the group. Requires
    /// `cgroup.kill`, available since Linux 5.14.
    pub fn kill_all(&self) -> Result<()> {
        self.write("cgroup.kill", "1")
    }

    /// Cumulative CPU time charged to the group, from `cpu.stat`'s
    /// `usage_usec` field, in nanoseconds.
    pub fn cpu_usage_ns(&self) -> Result<u64> {
        let stat = self.read("cpu.stat")?;
        parse_usage_usec(&stat).map(|usec| usec * 1_000)
    }

    /// Peak resident memory across the lifetime of the group, in bytes.
    pub fn memory_peak_bytes(&self) -> Result<u64> {
        let raw = self.read("memory.peak")?;
        raw.trim()
            .parse()
            .map_err(|_| Error::ResourceGroup("malformed memory.peak".into()))
    }

    /// Removes the (now-empty) cgroup directory.
    pub fn destroy(self) -> Result<()> {
        fs::remove_dir(&self.path)
            .map_err(|e| Error::ResourceGroup(format!("destroy {}: {e}", self.path.display())))
    }
}

fn parse_usage_usec(stat: &str) -> Result<u64> {
    stat.lines()
        .find_map(|l| l.strip_prefix("usage_usec "))
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| Error::ResourceGroup("cpu.stat missing usage_usec".into()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn cpu_stat_parsing_extracts_usage_usec() {
        let stat = "usage_usec 12345\nuser_usec 10000\nsystem_usec 2345\n";
        assert_eq!(parse_usage_usec(stat).unwrap(), 12345);
    }

    #[test]
    fn cpu_stat_parsing_rejects_missing_field() {
        assert!(parse_usage_usec("user_usec 1\n").is_err());
    }
}
