//! The sandbox primitive (spec §4.A). This crate treats the *contract* as
//! the spec: a private `in/`/`out/` filesystem root, a `reset` that empties
//! both, and a `call` that runs a file+argv inside it with stdio wired to
//! caller-chosen paths and a resource-group handshake socket. The
//! implementation here is a best-effort Linux backend (plain subprocess
//! plus the cgroup handshake) rather than a hardened namespace/seccomp
//! jail — true kernel isolation is out of scope (spec §1 "out of scope:
//! the low-level sandbox primitive itself").

use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::path::PathBuf;

use tokio::process::Child;
use tokio::process::Command;

use crate::call::CallArgs;
use crate::error::Result;

/// File descriptor the judge program reads its "extra" re-fed input from
/// (spec §4.H), matching jd4's `extra_file` sandbox-call convention.
const EXTRA_FD: std::os::fd::RawFd = 3;

/// One isolated execution environment. `id` disambiguates sandboxes
/// sharing a pool; `root` is the host directory backing `in/`/`out/`.
pub struct Sandbox {
    id: u32,
    root: PathBuf,
}

impl Sandbox {
    pub fn new(id: u32, root: PathBuf) -> Self {
        Self { id, root }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn in_dir(&self) -> PathBuf {
        self.root.join("in")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// Empties `in/` and `out/`, restoring the handle to a fresh state
    /// (spec §4.A invariant: after reset, both directories are empty).
    pub async fn reset(&mut self) -> Result<()> {
        for dir in [self.in_dir(), self.out_dir()] {
            if tokio::fs::try_exists(&dir).await? {
                tokio::fs::remove_dir_all(&dir).await?;
            }
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Resolves a guest-relative path (e.g. `/in/stdin`) to its host path
    /// under this sandbox's root.
    fn host_path(&self, guest_path: &Path) -> PathBuf {
        let relative = guest_path.strip_prefix("/").unwrap_or(guest_path);
        self.root.join(relative)
    }

    /// Runs `args.file` with `args.argv`, wiring stdio to the requested
    /// FIFOs/files and performing the cgroup handshake described in spec
    /// §4.A/§4.C: the child connects to `args.cgroup_file` and blocks until
    /// the resource controller accepts it, which happens in a `pre_exec`
    /// hook so the handshake is guaranteed to complete strictly before
    /// `exec` replaces the child's image.
    pub fn spawn(&self, args: CallArgs) -> Result<Child> {
        // `args.file` is either an absolute host path (a system compiler or
        // interpreter binary) or a path relative to `out_dir()` (a file the
        // submission's own package placed there, e.g. `./a.out`) — unlike
        // `stdin_file`/`stdout_file`/`cgroup_file`, it is never a `/in`- or
        // `/out`-rooted guest path, so it is used as-is rather than resolved
        // through `host_path`.
        let mut command = Command::new(&args.file);
        command.args(&args.argv);
        command.current_dir(self.out_dir());

        if let Some(stdin) = &args.stdin_file {
            command.stdin(std::fs::File::open(self.host_path(stdin))?);
        }
        if let Some(stdout) = &args.stdout_file {
            command.stdout(
                std::fs::OpenOptions::new()
                    .write(true)
                    .open(self.host_path(stdout))?,
            );
        }
        if let Some(stderr) = &args.stderr_file {
            command.stderr(
                std::fs::OpenOptions::new()
                    .write(true)
                    .open(self.host_path(stderr))?,
            );
        }

        // Custom-judge only (spec §4.H): the judge program reads the
        // re-fed expected input from a fixed extra file descriptor, the
        // way jd4's sandbox primitive wires `extra_file` alongside
        // stdin/stdout/stderr rather than through argv.
        let extra_handle = args
            .extra_file
            .as_ref()
            .map(|extra| std::fs::File::open(self.host_path(extra)))
            .transpose()?;

        let cgroup_socket = self.host_path(&args.cgroup_file);
        // SAFETY: the closure only performs async-signal-unsafe-free work
        // (a blocking socket connect, a 1-byte read, and an fd dup) between
        // fork and exec, as required by `pre_exec`'s contract.
        unsafe {
            command.pre_exec(move || {
                let mut stream = StdUnixStream::connect(&cgroup_socket)?;
                let mut ack = [0u8; 1];
                stream.read_exact(&mut ack)?;
                if let Some(extra) = &extra_handle {
                    nix::unistd::dup2(extra.as_raw_fd(), EXTRA_FD)
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                }
                Ok(())
            });
        }

        Ok(command.spawn()?)
    }

    /// A generic escape hatch equivalent to `call` for simple executors
    /// that don't need a real child process — used by tests that exercise
    /// the resource controller against a synthetic workload (spec §4.A:
    /// "`marshal(fn)` is an equivalent generic form for the simple
    /// executor").
    pub async fn marshal<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        f()
    }
}
