use std::path::PathBuf;

/// The two pre-defined routines a sandbox call can run (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Compile,
    Execute,
}

/// Arguments to one `Sandbox::call`. `stdin_file`/`stdout_file`/`stderr_file`/
/// `cgroup_file` are guest-relative (e.g. `/in/stdin`), matching jd4's FIFO
/// naming convention; `file` is the program to run and is either an absolute
/// host path or a path relative to the sandbox's `out_dir()` cwd.
#[derive(Debug, Clone)]
pub struct CallArgs {
    pub file: PathBuf,
    pub argv: Vec<String>,
    pub stdin_file: Option<PathBuf>,
    pub stdout_file: Option<PathBuf>,
    pub stderr_file: Option<PathBuf>,
    /// Custom-judge only: the extra FIFO re-fed the expected input.
    pub extra_file: Option<PathBuf>,
    /// Guest-relative path of the listening socket the resource-group
    /// handshake uses (spec §4.A, §4.C step 2).
    pub cgroup_file: PathBuf,
}

impl CallArgs {
    pub fn new(file: impl Into<PathBuf>, argv: Vec<String>, cgroup_file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            argv,
            stdin_file: None,
            stdout_file: None,
            stderr_file: None,
            extra_file: None,
            cgroup_file: cgroup_file.into(),
        }
    }

    pub fn with_stdio(
        mut self,
        stdin: impl Into<PathBuf>,
        stdout: impl Into<PathBuf>,
        stderr: impl Into<PathBuf>,
    ) -> Self {
        self.stdin_file = Some(stdin.into());
        self.stdout_file = Some(stdout.into());
        self.stderr_file = Some(stderr.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<PathBuf>) -> Self {
        self.extra_file = Some(extra.into());
        self
    }
}
