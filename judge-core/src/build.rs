//! The builder (spec §4.E, second half): turns a submission's code plus a
//! language spec into a [`Package`] — a directory of files ready to be
//! installed into a sandbox's `out/` before a case runs. Grounded on jd4's
//! `compile.py`: `Compiler.prepare`/`build` for compiled languages,
//! `Interpreter.build` for interpreted ones, and `Package.__del__` for the
//! directory's lifetime.

use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use judge_sandbox::CallArgs;
use judge_sandbox::ExitOutcome;
use judge_sandbox::ResourceLimits;
use judge_sandbox::Sandbox;
use judge_sandbox::SandboxPool;
use tempfile::TempDir;

use crate::error::Error;
use crate::error::Result;
use crate::language::CompilerSpec;
use crate::language::InterpreterSpec;
use crate::language::LanguageCatalog;
use crate::language::LanguageSpec;
use crate::loader::LanguageOverride;

/// Caps how much compiler stdout+stderr is kept for the caller (spec §4.E:
/// "the compiler's combined output, truncated").
const COMPILER_TEXT_CAP: usize = 20 * 1024;

/// A file known before compilation begins: either trusted support material
/// bundled with the problem (a checker stub, test harness) or the raw
/// submitted source.
pub enum CodeSource {
    Text(String),
    Archive(Vec<u8>, ArchiveKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
}

/// Everything [`build`] needs besides the language table: the submitted
/// code and the package's own trusted support files (spec §3's
/// `compile_time_files`/`runtime_files`, partially applied per case package).
pub struct BuildRequest {
    pub language: String,
    pub code: CodeSource,
    /// Trusted files written into the sandbox *after* the submitted code is
    /// extracted, so a malicious archive member sharing a trusted file's
    /// name is always overwritten by the trusted copy rather than the other
    /// way around (jd4 `Compiler.prepare`'s ordering).
    pub compile_time_files: Vec<(String, Vec<u8>)>,
    /// Trusted files copied into the finished package, needed only at
    /// execution time (e.g. reference data files).
    pub runtime_files: Vec<(String, Vec<u8>)>,
    /// This problem's `languages:` override for `language`, if it has one
    /// (spec §4.E "language-override"). Applied to the catalog entry before
    /// compiling/installing, never mutating the shared catalog itself.
    pub language_override: Option<LanguageOverride>,
}

/// A directory of files ready to install into a sandbox. Deleted from disk
/// when the last clone is dropped (jd4 `Package.__del__`); cloning is cheap
/// and safe to hand to several concurrently-running cases.
#[derive(Clone)]
pub struct Package {
    dir: Arc<TempDir>,
    execute_file: String,
    execute_argv: Vec<String>,
}

impl Package {
    fn from_interpreter(dir: TempDir, spec: &InterpreterSpec) -> Self {
        Self {
            dir: Arc::new(dir),
            execute_file: spec.execute_file.clone(),
            execute_argv: spec.execute_argv.clone(),
        }
    }

    fn from_compiler(dir: TempDir, spec: &CompilerSpec) -> Self {
        Self {
            dir: Arc::new(dir),
            execute_file: spec.execute_file.clone(),
            execute_argv: spec.execute_argv.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copies this package's files into `sandbox`'s `out/` (its execution
    /// cwd), then returns the file+argv to run there — applying a per-case
    /// override when the case descriptor names one (spec §3
    /// `CaseLimits::execute_file`/`execute_args`, jd4's execute override
    /// resolution in `JudgeHandler.judge`).
    pub async fn install(
        &self,
        sandbox: &Sandbox,
        execute_file_override: Option<&str>,
        execute_args_override: Option<&[String]>,
    ) -> Result<Executable> {
        copy_tree(self.dir.path(), &sandbox.out_dir()).await?;
        let file = execute_file_override
            .map(str::to_string)
            .unwrap_or_else(|| self.execute_file.clone());
        let argv = execute_args_override
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.execute_argv.clone());
        Ok(Executable { file, argv })
    }
}

/// A file+argv bound to a sandbox's `out/`, ready to hand to
/// [`judge_sandbox::CallArgs::new`].
#[derive(Debug, Clone)]
pub struct Executable {
    pub file: String,
    pub argv: Vec<String>,
}

/// Builds a [`Package`] for `request.language`, compiling under sandbox
/// control when the language calls for it. Returns the package plus the
/// (possibly empty) compiler output text.
pub async fn build(
    catalog: &LanguageCatalog,
    pool: &SandboxPool,
    cgroup_root: &Path,
    run_name: &str,
    request: BuildRequest,
) -> Result<(Package, Vec<u8>)> {
    let mut spec = catalog
        .get(&request.language)
        .ok_or_else(|| Error::UnknownLanguage(request.language.clone()))?
        .clone();
    if let Some(over) = &request.language_override {
        apply_language_override(&mut spec, over);
    }

    match spec {
        LanguageSpec::Interpreter(interpreter) => {
            let dir = tempfile::tempdir()?;
            materialize_code(dir.path(), &interpreter.source_filename, &request.code).await?;
            write_files(dir.path(), &request.compile_time_files).await?;
            write_files(dir.path(), &request.runtime_files).await?;
            Ok((Package::from_interpreter(dir, &interpreter), Vec::new()))
        }
        LanguageSpec::Compiler(compiler) => {
            let mut sandboxes = pool.acquire(1).await;
            let sandbox = &mut sandboxes[0];
            let result = compile_one(sandbox, cgroup_root, run_name, &compiler, &request).await;
            pool.release(sandboxes).await;
            let (dir, compiler_text) = result?;
            Ok((Package::from_compiler(dir, &compiler), compiler_text))
        }
    }
}

/// Applies a problem's `languages:` override onto a catalog entry (spec
/// §4.E: "`problem_config.lang` ... overrides compiler/execute file and
/// argv for this submission"). Fields the override leaves unset keep the
/// catalog's own value.
fn apply_language_override(spec: &mut LanguageSpec, over: &LanguageOverride) {
    match spec {
        LanguageSpec::Compiler(compiler) => {
            if let Some(file) = &over.compiler_file {
                compiler.compiler_file = file.clone();
            }
            if let Some(argv) = &over.compiler_args {
                compiler.compiler_argv = argv.clone();
            }
            if let Some(file) = &over.execute_file {
                compiler.execute_file = file.clone();
            }
            if let Some(argv) = &over.execute_args {
                compiler.execute_argv = argv.clone();
            }
        }
        LanguageSpec::Interpreter(interpreter) => {
            if let Some(file) = &over.execute_file {
                interpreter.execute_file = file.clone();
            }
            if let Some(argv) = &over.execute_args {
                interpreter.execute_argv = argv.clone();
            }
        }
    }
}

async fn compile_one(
    sandbox: &mut Sandbox,
    cgroup_root: &Path,
    run_name: &str,
    compiler: &CompilerSpec,
    request: &BuildRequest,
) -> Result<(TempDir, Vec<u8>)> {
    sandbox.reset().await?;
    materialize_code(&sandbox.out_dir(), &compiler.source_filename, &request.code).await?;
    write_files(&sandbox.out_dir(), &request.compile_time_files).await?;
    reset_permissions(&sandbox.out_dir()).await?;

    let stdout_path = sandbox.in_dir().join("compiler-stdout");
    let stderr_path = sandbox.in_dir().join("compiler-stderr");
    tokio::fs::write(&stdout_path, []).await?;
    tokio::fs::write(&stderr_path, []).await?;

    let args = CallArgs::new(
        compiler.compiler_file.clone(),
        compiler.compiler_argv.clone(),
        "/in/cgroup",
    )
    .with_stdio("/in/null", "/in/compiler-stdout", "/in/compiler-stderr");
    tokio::fs::write(sandbox.in_dir().join("null"), []).await?;

    let child = sandbox.spawn(args)?;
    let limits = ResourceLimits {
        cpu_ns: compiler.time_limit_ns,
        wall_ns: compiler.time_limit_ns.saturating_mul(2).max(Duration::from_secs(5).as_nanos() as u64),
        memory_bytes: compiler.memory_limit_bytes,
        process_limit: compiler.process_limit,
    };
    let socket_path = sandbox.in_dir().join("cgroup");
    let (outcome, usage) =
        judge_sandbox::resource::run(cgroup_root, run_name, &socket_path, limits, child).await?;

    let mut compiler_text = tokio::fs::read(&stdout_path).await.unwrap_or_default();
    compiler_text.extend(tokio::fs::read(&stderr_path).await.unwrap_or_default());
    compiler_text.truncate(COMPILER_TEXT_CAP);

    // Compile TLE/MLE gets a synthesized message rather than whatever
    // partial output the killed compiler happened to produce (spec §4.E:
    // "compile TLE/MLE -> COMPILE_ERROR with a synthesized message").
    if usage.memory_usage_bytes >= compiler.memory_limit_bytes {
        return Err(Error::Compile("compile memory limit exceeded".to_string()));
    }
    if matches!(outcome, ExitOutcome::WallTimeout(_)) || usage.time_usage_ns >= compiler.time_limit_ns {
        return Err(Error::Compile("compile time limit exceeded".to_string()));
    }
    if !matches!(outcome, ExitOutcome::Exited(0)) {
        let text = String::from_utf8_lossy(&compiler_text).into_owned();
        return Err(Error::Compile(text));
    }

    let package_dir = tempfile::tempdir()?;
    copy_tree(&sandbox.out_dir(), package_dir.path()).await?;
    write_files(package_dir.path(), &request.runtime_files).await?;
    Ok((package_dir, compiler_text))
}

async fn materialize_code(dest: &Path, source_filename: &str, code: &CodeSource) -> Result<()> {
    match code {
        CodeSource::Text(text) => {
            tokio::fs::write(dest.join(source_filename), text.as_bytes()).await?;
        }
        CodeSource::Archive(bytes, ArchiveKind::Tar) => {
            extract_tar(dest, bytes)?;
        }
        CodeSource::Archive(bytes, ArchiveKind::Zip) => {
            extract_zip(dest, bytes)?;
        }
    }
    Ok(())
}

fn extract_tar(dest: &Path, bytes: &[u8]) -> Result<()> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    archive.unpack(dest)?;
    Ok(())
}

fn extract_zip(dest: &Path, bytes: &[u8]) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(name);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }
    Ok(())
}

async fn write_files(dest: &Path, files: &[(String, Vec<u8>)]) -> Result<()> {
    for (name, contents) in files {
        let path = dest.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    }
    Ok(())
}

/// Best-effort permission reset after extracting an untrusted archive: no
/// submitted file should retain setuid/setgid bits or unusual modes once it
/// lands in the sandbox (jd4 `util.chmod_recursive`).
async fn reset_permissions(root: &Path) -> Result<()> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            let mode = if metadata.is_dir() { 0o755 } else { 0o644 };
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).await?;
            if metadata.is_dir() {
                stack.push(path);
            }
        }
    }
    Ok(())
}

async fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let mut stack = vec![PathBuf::new()];
    while let Some(relative) = stack.pop() {
        let src_dir = src.join(&relative);
        let dest_dir = dest.join(&relative);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let mut entries = tokio::fs::read_dir(&src_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let child_relative = relative.join(entry.file_name());
            if file_type.is_dir() {
                stack.push(child_relative);
            } else {
                tokio::fs::copy(entry.path(), dest.join(&child_relative)).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::language::LanguageCatalog;

    fn catalog() -> LanguageCatalog {
        LanguageCatalog::from_yaml(
            r#"
python:
  type: interpreter
  code_file: main.py
  execute_file: /usr/bin/python3
  execute_args: "main.py"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn interpreter_build_writes_source_and_support_files() {
        let pool = SandboxPool::new(vec![]);
        let request = BuildRequest {
            language: "python".to_string(),
            code: CodeSource::Text("print('hi')".to_string()),
            compile_time_files: vec![],
            runtime_files: vec![("data.txt".to_string(), b"42".to_vec())],
            language_override: None,
        };
        let (package, compiler_text) = build(
            &catalog(),
            &pool,
            Path::new("/sys/fs/cgroup/unused"),
            "test-run",
            request,
        )
        .await
        .unwrap();
        assert!(compiler_text.is_empty());
        let source = std::fs::read_to_string(package.path().join("main.py")).unwrap();
        assert_eq!(source, "print('hi')");
        let data = std::fs::read_to_string(package.path().join("data.txt")).unwrap();
        assert_eq!(data, "42");
    }

    #[tokio::test]
    async fn unknown_language_is_rejected() {
        let pool = SandboxPool::new(vec![]);
        let request = BuildRequest {
            language: "cobol".to_string(),
            code: CodeSource::Text(String::new()),
            compile_time_files: vec![],
            runtime_files: vec![],
            language_override: None,
        };
        let result = build(&catalog(), &pool, Path::new("/unused"), "test-run", request).await;
        assert!(matches!(result, Err(Error::UnknownLanguage(_))));
    }

    #[tokio::test]
    async fn language_override_replaces_execute_args() {
        let pool = SandboxPool::new(vec![]);
        let request = BuildRequest {
            language: "python".to_string(),
            code: CodeSource::Text("print('hi')".to_string()),
            compile_time_files: vec![],
            runtime_files: vec![],
            language_override: Some(LanguageOverride {
                compiler_file: None,
                compiler_args: None,
                execute_file: None,
                execute_args: Some(vec!["-O".to_string(), "main.py".to_string()]),
            }),
        };
        let (package, _compiler_text) = build(
            &catalog(),
            &pool,
            Path::new("/sys/fs/cgroup/unused"),
            "test-run",
            request,
        )
        .await
        .unwrap();
        let sandbox = Sandbox::new(0, tempfile::tempdir().unwrap().into_path());
        let executable = package.install(&sandbox, None, None).await.unwrap();
        assert_eq!(executable.argv, vec!["-O".to_string(), "main.py".to_string()]);
    }
}
