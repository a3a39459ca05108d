//! Bridge configuration

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::diagnostics::{BridgeError, BridgeResult};
use crate::locator::{DEFAULT_EXTENSION, LocatorChain};
use crate::supervisor::{CommandSpec, ExitClass, ProcessExit};

/// Placeholder replaced by the scratch or source path in argument templates.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Exit code the toolchain uses for syntax errors unless configured otherwise.
pub const DEFAULT_SYNTAX_ERROR_EXIT_CODE: i32 = 2;

/// How to invoke the toolchain.
///
/// Every field is optional in TOML:
///
/// ```toml
/// racket_path = "/usr/local/bin/racket"
/// syntax_error_exit_code = 2
/// check_args = ["-e", "(enter! (file \"{file}\"))"]
/// run_args = ["{file}"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Toolchain executable, resolved through `PATH` when not absolute.
    pub racket_path: String,

    /// Extension (without the dot) of source files the bridge accepts.
    pub source_extension: String,

    /// Exit code that marks the checker's stderr as a syntax error.
    pub syntax_error_exit_code: i32,

    /// Arguments for the one-shot checker.
    pub check_args: Vec<String>,

    /// Arguments for an interactive run.
    pub run_args: Vec<String>,

    /// Directory for scratch files. Defaults to `<temp>/frg-lsp`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            racket_path: "racket".to_string(),
            source_extension: DEFAULT_EXTENSION.to_string(),
            syntax_error_exit_code: DEFAULT_SYNTAX_ERROR_EXIT_CODE,
            check_args: vec![
                "-e".to_string(),
                format!("(enter! (file \"{FILE_PLACEHOLDER}\"))"),
            ],
            run_args: vec![FILE_PLACEHOLDER.to_string()],
            scratch_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Load config from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| BridgeError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| BridgeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config or use default, returning the load error as a warning.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<String>) {
        match path {
            Some(p) => match Self::load(p) {
                Ok(config) => (config, None),
                Err(e) => (Self::default(), Some(e.to_string())),
            },
            None => (Self::default(), None),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("frg-lsp"))
    }

    pub fn check_command(&self, path: &Path) -> CommandSpec {
        CommandSpec::new(&self.racket_path, expand_args(&self.check_args, path))
    }

    pub fn run_command(&self, path: &Path) -> CommandSpec {
        CommandSpec::new(&self.racket_path, expand_args(&self.run_args, path))
    }

    pub fn classify(&self, exit: ProcessExit) -> ExitClass {
        exit.classify(self.syntax_error_exit_code)
    }

    /// True if the path ends in `.{source_extension}`.
    pub fn is_source_path(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.to_string_lossy() == self.source_extension)
    }

    /// Location grammars for the configured extension.
    pub fn locator(&self) -> BridgeResult<Cow<'static, LocatorChain>> {
        if self.source_extension == DEFAULT_EXTENSION {
            LocatorChain::forge().map(Cow::Borrowed)
        } else {
            LocatorChain::new(&self.source_extension).map(Cow::Owned)
        }
    }
}

/// Substitute `{file}`. A bare placeholder argument receives the raw path;
/// an embedded one receives the path escaped for a Racket string literal.
fn expand_args(args: &[String], path: &Path) -> Vec<String> {
    let raw = path.to_string_lossy();
    args.iter()
        .map(|arg| {
            if arg == FILE_PLACEHOLDER {
                raw.to_string()
            } else if arg.contains(FILE_PLACEHOLDER) {
                arg.replace(FILE_PLACEHOLDER, &escape_racket_string(&raw))
            } else {
                arg.clone()
            }
        })
        .collect()
}

fn escape_racket_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
