//! The problem-package loader (spec §4.F): a zip archive plus a
//! `config.yaml` descriptor, turned into a list of judge-protocol [`Case`]s
//! in submission order. Grounded on jd4's `case.py::read_config`/
//! `read_yaml_cases`: case-insensitive member lookup, category filtering,
//! and 1-based index assignment in yield order. jd4's `read_legacy_cases`
//! (`config.ini`) and `read_yaml_cases_old` were marked deprecated in
//! upstream jd4 and are intentionally not reimplemented here — both formats
//! are rejected with an explicit [`Error::Format`] rather than silently
//! misparsed.

use std::collections::HashMap;
use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use judge_protocol::FormatError;
use judge_protocol::case::Case;
use judge_protocol::case::CaseLimits;
use judge_protocol::case::CustomJudgeCase;
use judge_protocol::case::DefaultCase;
use judge_protocol::units::parse_memory_bytes;
use judge_protocol::units::parse_time_ns;
use serde::Deserialize;

use crate::error::Error;
use crate::error::Result;
use crate::sources::ArchiveMemberSource;

const DEFAULT_TIME: &str = "40s";
const DEFAULT_MEMORY: &str = "256m";
const DEFAULT_PROCESS_LIMIT: u32 = 64;

/// An opened problem zip, indexed once for case-insensitive member lookup.
pub struct ProblemBundle {
    path: Arc<PathBuf>,
    members_lower: HashMap<String, String>,
}

impl ProblemBundle {
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = std::fs::File::open(&path)?;
        let archive = zip::ZipArchive::new(file)?;
        let members_lower = archive
            .file_names()
            .map(|name| (name.to_lowercase(), name.to_string()))
            .collect();
        Ok(Self {
            path: Arc::new(path),
            members_lower,
        })
    }

    fn resolve(&self, name: &str) -> Result<String> {
        self.members_lower
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                Error::Format(FormatError {
                    input: name.to_string(),
                    message: "archive member not found".to_string(),
                })
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.members_lower.contains_key(&name.to_lowercase())
    }

    pub fn source(&self, name: &str) -> Result<ArchiveMemberSource> {
        let real = self.resolve(name)?;
        Ok(ArchiveMemberSource::new(self.path.clone(), real))
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let source = self.source(name)?;
        let mut buf = Vec::new();
        source.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Extracts every member whose name starts with `prefix` (case-
    /// insensitive), returning `(relative_name, contents)` pairs with the
    /// prefix itself stripped — the bulk-extraction operation named by
    /// spec §4.F (`extract(prefix, ...)`), adapted to return in-memory
    /// bytes rather than writing to a host directory since callers here
    /// only ever fold the result into a [`crate::build::BuildRequest`].
    pub fn extract_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix_lower = prefix.to_lowercase();
        let mut out = Vec::new();
        for (lower, real) in &self.members_lower {
            let Some(relative) = lower.strip_prefix(&prefix_lower) else {
                continue;
            };
            let relative = relative.trim_start_matches('/');
            if relative.is_empty() || real.ends_with('/') {
                continue;
            }
            let bytes = self.read(real)?;
            out.push((relative.to_string(), bytes));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Loads and parses `config.yaml`. Rejects the legacy `config.ini`
    /// format and the legacy top-level-list yaml shape outright (spec §9
    /// resolved Open Question: legacy formats are out of scope, not
    /// best-effort parsed).
    pub fn load_config(&self) -> Result<ProblemConfig> {
        if self.contains("config.ini") && !self.contains("config.yaml") {
            return Err(Error::Format(FormatError {
                input: "config.ini".to_string(),
                message: "legacy config.ini problem packages are not supported".to_string(),
            }));
        }
        let bytes = self.read("config.yaml")?;
        let text = String::from_utf8_lossy(&bytes);
        let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
        if value.is_sequence() {
            return Err(Error::Format(FormatError {
                input: "config.yaml".to_string(),
                message: "legacy list-form case config is not supported".to_string(),
            }));
        }
        let raw: RawConfig = serde_yaml::from_value(value)?;
        Ok(ProblemConfig { raw })
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    process_limit: Option<u32>,
    cases: Vec<RawCase>,
    #[serde(default)]
    languages: Vec<RawLanguageOverride>,
    #[serde(default)]
    compile_time_files: Option<String>,
    #[serde(default)]
    runtime_files: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    input: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    process_limit: Option<u32>,
    score: u32,
    #[serde(default)]
    category: Vec<String>,
    #[serde(default)]
    execute_file: Option<String>,
    #[serde(default)]
    execute_args: Option<String>,
    /// Custom-judge trigger (spec §4.F): the checker's source file,
    /// case-insensitively resolved against the archive. The judge's build
    /// language is taken from this name's extension (jd4 `case.py`:
    /// `path.splitext(case['judge'])[1][1:]`), never declared separately.
    #[serde(default)]
    judge: Option<String>,
}

/// One `languages:` entry (spec §4.E/§4.F): a per-submission-language
/// override of compiler/execute file and argv, grounded on jd4
/// `case.py::read_yaml_config`'s `data['lang']` resolution.
#[derive(Debug, Deserialize)]
struct RawLanguageOverride {
    language: String,
    #[serde(default)]
    compiler_file: Option<String>,
    #[serde(default)]
    compiler_args: Option<String>,
    #[serde(default)]
    execute_file: Option<String>,
    #[serde(default)]
    execute_args: Option<String>,
}

/// A resolved `languages:` override for one submission language.
#[derive(Debug, Clone)]
pub struct LanguageOverride {
    pub compiler_file: Option<String>,
    pub compiler_args: Option<Vec<String>>,
    pub execute_file: Option<String>,
    pub execute_args: Option<Vec<String>>,
}

/// A parsed `config.yaml`, ready to be turned into [`Case`]s for a specific
/// submission's category filter.
pub struct ProblemConfig {
    raw: RawConfig,
}

impl ProblemConfig {
    /// Builds the cases that apply to `submission_categories`, in yield
    /// order, with a freshly assigned 1-based index (spec §4.F: "case index
    /// is assigned after category filtering, not before"). An empty
    /// submission category list means "no filter" — every case is kept.
    pub fn build_cases(&self, bundle: &ProblemBundle, submission_categories: &[String]) -> Result<Vec<Case>> {
        let default_time = self.raw.time.as_deref().unwrap_or(DEFAULT_TIME);
        let default_memory = self.raw.memory.as_deref().unwrap_or(DEFAULT_MEMORY);
        let default_process_limit = self.raw.process_limit.unwrap_or(DEFAULT_PROCESS_LIMIT);

        let mut cases = Vec::new();
        let mut index = 0u32;
        for raw_case in &self.raw.cases {
            if !submission_categories.is_empty() && !raw_case.category.is_empty() {
                let overlaps = raw_case
                    .category
                    .iter()
                    .any(|c| submission_categories.contains(c));
                if !overlaps {
                    continue;
                }
            }
            index += 1;

            let limits = CaseLimits {
                index,
                time_limit_ns: parse_time_ns(raw_case.time.as_deref().unwrap_or(default_time))?,
                memory_limit_bytes: parse_memory_bytes(raw_case.memory.as_deref().unwrap_or(default_memory))?,
                process_limit: raw_case.process_limit.unwrap_or(default_process_limit),
                score: raw_case.score,
                execute_file: raw_case.execute_file.clone(),
                execute_args: raw_case
                    .execute_args
                    .as_deref()
                    .map(|s| shlex::split(s).unwrap_or_default()),
            };
            limits.validate().map_err(|message| {
                Error::Format(FormatError {
                    input: raw_case.input.clone(),
                    message: message.to_string(),
                })
            })?;

            let open_input = Box::new(bundle.source(&raw_case.input)?);
            let case = if let Some(script) = &raw_case.judge {
                let judge_language = std::path::Path::new(script)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .ok_or_else(|| {
                        Error::Format(FormatError {
                            input: raw_case.input.clone(),
                            message: format!(
                                "custom-judge script '{script}' has no file extension to infer its language from"
                            ),
                        })
                    })?
                    .to_string();
                Case::CustomJudge(CustomJudgeCase {
                    limits,
                    open_input,
                    open_judge_source: Box::new(bundle.source(script)?),
                    judge_language,
                })
            } else {
                let output_name = raw_case.output.as_deref().ok_or_else(|| {
                    Error::Format(FormatError {
                        input: raw_case.input.clone(),
                        message: "default-judge case missing output file".to_string(),
                    })
                })?;
                Case::Default(DefaultCase {
                    limits,
                    open_input,
                    open_output: Box::new(bundle.source(output_name)?),
                })
            };
            cases.push(case);
        }
        Ok(cases)
    }

    /// The `languages:` override for `lang`, if this problem's descriptor
    /// names one (spec §4.E "language-override"). At most one entry per
    /// language name is expected; the first match wins, matching jd4's
    /// `read_yaml_config` linear scan.
    pub fn language_override(&self, lang: &str) -> Option<LanguageOverride> {
        let entry = self.raw.languages.iter().find(|entry| entry.language == lang)?;
        Some(LanguageOverride {
            compiler_file: entry.compiler_file.clone(),
            compiler_args: entry
                .compiler_args
                .as_deref()
                .map(|s| shlex::split(s).unwrap_or_default()),
            execute_file: entry.execute_file.clone(),
            execute_args: entry
                .execute_args
                .as_deref()
                .map(|s| shlex::split(s).unwrap_or_default()),
        })
    }

    /// Files the builder must inject into the sandbox *before* compiling
    /// (spec §3/§4.E `compile_time_files`), or an empty list if the
    /// descriptor names no prefix.
    pub fn compile_time_files(&self, bundle: &ProblemBundle) -> Result<Vec<(String, Vec<u8>)>> {
        match &self.raw.compile_time_files {
            Some(prefix) => bundle.extract_prefix(prefix),
            None => Ok(Vec::new()),
        }
    }

    /// Files copied into the finished package for use at execution time
    /// (spec §3/§4.E `runtime_files`), or empty if none is named.
    pub fn runtime_files(&self, bundle: &ProblemBundle) -> Result<Vec<(String, Vec<u8>)>> {
        match &self.raw.runtime_files {
            Some(prefix) => bundle.extract_prefix(prefix),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Write as _;

    fn write_bundle(config_yaml: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let dir = tempfile::tempdir().unwrap().into_path();
        let path = dir.join("problem.zip");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("Config.YAML", options).unwrap();
        writer.write_all(config_yaml.as_bytes()).unwrap();
        for (name, contents) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn loads_default_judge_cases_case_insensitively() {
        let yaml = r#"
cases:
  - input: A.IN
    output: a.out
    score: 10
"#;
        let path = write_bundle(yaml, &[("a.in", b"1 2"), ("a.out", b"3")]);
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let cases = config.build_cases(&bundle, &[]).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].limits().index, 1);
        assert_eq!(cases[0].limits().score, 10);
    }

    #[test]
    fn category_filter_reindexes_from_one() {
        let yaml = r#"
cases:
  - input: a.in
    output: a.out
    score: 10
    category: [subtask1]
  - input: b.in
    output: b.out
    score: 20
    category: [subtask2]
"#;
        let path = write_bundle(yaml, &[("a.in", b""), ("a.out", b""), ("b.in", b""), ("b.out", b"")]);
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let cases = config.build_cases(&bundle, &["subtask2".to_string()]).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].limits().index, 1);
        assert_eq!(cases[0].limits().score, 20);
    }

    #[test]
    fn per_case_judge_key_mixes_default_and_custom_judge_cases() {
        let yaml = r#"
cases:
  - input: a.in
    output: a.out
    score: 10
  - input: b.in
    judge: checker.cpp
    score: 20
"#;
        let path = write_bundle(
            yaml,
            &[("a.in", b"1 2"), ("a.out", b"3"), ("b.in", b"1 2"), ("checker.cpp", b"int main(){}")],
        );
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let cases = config.build_cases(&bundle, &[]).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(matches!(cases[0], Case::Default(_)));
        match &cases[1] {
            Case::CustomJudge(custom) => assert_eq!(custom.judge_language, "cpp"),
            other => panic!("expected CustomJudge, got a different case variant: {}", other.limits().index),
        }
    }

    #[test]
    fn custom_judge_case_does_not_require_an_output_file() {
        let yaml = r#"
cases:
  - input: a.in
    judge: checker.py
    score: 10
"#;
        let path = write_bundle(yaml, &[("a.in", b"1 2"), ("checker.py", b"print(1, 10)")]);
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let cases = config.build_cases(&bundle, &[]).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(matches!(cases[0], Case::CustomJudge(_)));
    }

    #[test]
    fn language_override_is_matched_by_name() {
        let yaml = r#"
languages:
  - language: cpp
    compiler_args: "-O2 -Wall"
    execute_args: "--fast"
cases:
  - input: a.in
    output: a.out
    score: 10
"#;
        let path = write_bundle(yaml, &[("a.in", b""), ("a.out", b"")]);
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let override_ = config.language_override("cpp").unwrap();
        assert_eq!(override_.compiler_args, Some(vec!["-O2".to_string(), "-Wall".to_string()]));
        assert_eq!(override_.execute_args, Some(vec!["--fast".to_string()]));
        assert!(config.language_override("python").is_none());
    }

    #[test]
    fn compile_time_files_extracts_by_prefix_stripping_it() {
        let yaml = r#"
compile_time_files: checker/
cases:
  - input: a.in
    output: a.out
    score: 10
"#;
        let path = write_bundle(
            yaml,
            &[
                ("a.in", b"1 2"),
                ("a.out", b"3"),
                ("checker/testlib.h", b"// testlib"),
                ("checker/main.cpp", b"int main(){}"),
            ],
        );
        let bundle = ProblemBundle::open(path).unwrap();
        let config = bundle.load_config().unwrap();
        let mut files = config.compile_time_files(&bundle).unwrap();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "main.cpp");
        assert_eq!(files[1].0, "testlib.h");
    }

    #[test]
    fn config_ini_without_yaml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problem.zip");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("config.ini", options).unwrap();
        writer.write_all(b"[problem]\n").unwrap();
        writer.finish().unwrap();
        let bundle = ProblemBundle::open(path).unwrap();
        assert!(matches!(bundle.load_config(), Err(Error::Format(_))));
    }
}
