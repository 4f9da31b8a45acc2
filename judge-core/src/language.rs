//! The language registry (spec §4.E, first half): a table of known
//! languages loaded once at startup, keyed by name. Grounded on jd4's
//! `compile.py::_init`, which reads a single `langs.yaml` at process start
//! and never mutates it afterwards — this crate injects the resulting
//! catalog explicitly instead of holding it in a process-wide global (spec
//! §9 redesign note: "inject a `LanguageCatalog` at daemon startup").

use std::collections::HashMap;

use judge_protocol::units::parse_memory_bytes;
use judge_protocol::units::parse_time_ns;
use serde::Deserialize;

use crate::error::Error;
use crate::error::Result;

const DEFAULT_TIME: &str = "40s";
const DEFAULT_MEMORY: &str = "256m";
const DEFAULT_PROCESS_LIMIT: u32 = 64;

#[derive(Debug, Clone)]
pub struct CompilerSpec {
    pub compiler_file: String,
    pub compiler_argv: Vec<String>,
    pub source_filename: String,
    pub execute_file: String,
    pub execute_argv: Vec<String>,
    pub time_limit_ns: u64,
    pub memory_limit_bytes: u64,
    pub process_limit: u32,
}

#[derive(Debug, Clone)]
pub struct InterpreterSpec {
    pub source_filename: String,
    pub execute_file: String,
    pub execute_argv: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum LanguageSpec {
    Compiler(CompilerSpec),
    Interpreter(InterpreterSpec),
}

/// Raw on-disk shape of one `languages.yaml` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawLanguageEntry {
    #[serde(rename = "type")]
    kind: String,
    compiler_file: Option<String>,
    compiler_args: Option<String>,
    code_file: String,
    execute_file: String,
    execute_args: String,
    time: Option<String>,
    memory: Option<String>,
    process_limit: Option<u32>,
}

/// A table of known languages, loaded once and handed to every builder
/// call (spec §6 "Language table").
#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog {
    languages: HashMap<String, LanguageSpec>,
}

impl LanguageCatalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: HashMap<String, RawLanguageEntry> = serde_yaml::from_str(yaml)?;
        let mut languages = HashMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let spec = match entry.kind.as_str() {
                "compiler" => {
                    let compiler_file = entry.compiler_file.ok_or_else(|| {
                        Error::Format(judge_protocol::FormatError {
                            input: name.clone(),
                            message: "compiler language missing compiler_file".to_string(),
                        })
                    })?;
                    let compiler_args = entry.compiler_args.unwrap_or_default();
                    LanguageSpec::Compiler(CompilerSpec {
                        compiler_file,
                        compiler_argv: shlex::split(&compiler_args).unwrap_or_default(),
                        source_filename: entry.code_file,
                        execute_file: entry.execute_file,
                        execute_argv: shlex::split(&entry.execute_args).unwrap_or_default(),
                        time_limit_ns: parse_time_ns(entry.time.as_deref().unwrap_or(DEFAULT_TIME))?,
                        memory_limit_bytes: parse_memory_bytes(
                            entry.memory.as_deref().unwrap_or(DEFAULT_MEMORY),
                        )?,
                        process_limit: entry.process_limit.unwrap_or(DEFAULT_PROCESS_LIMIT),
                    })
                }
                "interpreter" => LanguageSpec::Interpreter(InterpreterSpec {
                    source_filename: entry.code_file,
                    execute_file: entry.execute_file,
                    execute_argv: shlex::split(&entry.execute_args).unwrap_or_default(),
                }),
                other => {
                    return Err(Error::Format(judge_protocol::FormatError {
                        input: name,
                        message: format!("unknown language type '{other}'"),
                    }));
                }
            };
            languages.insert(name, spec);
        }
        Ok(Self { languages })
    }

    pub fn get(&self, name: &str) -> Option<&LanguageSpec> {
        self.languages.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.languages.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    const SAMPLE: &str = r#"
cpp:
  type: compiler
  compiler_file: /usr/bin/g++
  compiler_args: "-O2 -o a.out a.cpp"
  code_file: a.cpp
  execute_file: ./a.out
  execute_args: ""
  time: 2s
  memory: 256m
python:
  type: interpreter
  code_file: main.py
  execute_file: /usr/bin/python3
  execute_args: "main.py"
"#;

    #[test]
    fn parses_compiler_and_interpreter_entries() {
        let catalog = LanguageCatalog::from_yaml(SAMPLE).unwrap();
        assert!(catalog.has("cpp"));
        assert!(catalog.has("python"));
        match catalog.get("cpp").unwrap() {
            LanguageSpec::Compiler(spec) => {
                assert_eq!(spec.compiler_argv, vec!["-O2", "-o", "a.out", "a.cpp"]);
                assert_eq!(spec.time_limit_ns, 2_000_000_000);
                assert_eq!(spec.process_limit, DEFAULT_PROCESS_LIMIT);
            }
            _ => panic!("expected compiler spec"),
        }
        match catalog.get("python").unwrap() {
            LanguageSpec::Interpreter(spec) => {
                assert_eq!(spec.execute_argv, vec!["main.py"]);
            }
            _ => panic!("expected interpreter spec"),
        }
    }

    #[test]
    fn unknown_language_is_none() {
        let catalog = LanguageCatalog::from_yaml(SAMPLE).unwrap();
        assert!(catalog.get("brainfuck").is_none());
    }

    #[test]
    fn rejects_unknown_type() {
        let yaml = "x:\n  type: bogus\n  code_file: a\n  execute_file: a\n  execute_args: \"\"\n";
        assert!(LanguageCatalog::from_yaml(yaml).is_err());
    }
}
