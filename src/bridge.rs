//! Compile bridge
//!
//! The two operations the page calls: `init` warms the runtime, `compile`
//! runs one command against a file map and returns a normalized result.
//!
//! # Result shape
//!
//! ```text
//! {
//!   "output": {
//!     "dist/index.js": "...",        emitted file, relative to the mount
//!     "dist/old.js": null,           deleted during the run (or empty dir)
//!     "<stdout>": "...",             trimmed stdout, when non-empty
//!     "<stderr>": "Exit code: 2..."  diagnostics, when non-empty
//!   },
//!   "elapsedMillis": 812.4,
//!   "exitCode": 2
//! }
//! ```
//!
//! A path missing from `output` was not produced. A non-zero exit is not an
//! error: it is reported in `<stderr>`.

use crate::config::WorkerConfig;
use crate::console_log;
use crate::error::{BridgeError, BridgeResult};
use crate::host::keys;
use crate::host::{CompileJob, CompileRuntime, RawRun};
use crate::platform::Clock;
use crate::tokenize::tokenize_args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Request files: path (relative to the mount, or absolute) to content
pub type FileMap = BTreeMap<String, String>;

/// Result files: normalized path to content, `None` for deleted paths
pub type OutputMap = BTreeMap<String, Option<String>>;

/// What `compile` resolves with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub output: OutputMap,
    /// Wall time from just before the run to just after normalization
    #[serde(alias = "time")]
    pub elapsed_millis: f64,
    /// Exit code of the run (or the entry point's `exitCode`)
    #[serde(default)]
    pub exit_code: i32,
}

impl CompileResult {
    /// Captured stdout, if any
    pub fn stdout(&self) -> Option<&str> {
        self.output.get(keys::STDOUT).and_then(|v| v.as_deref())
    }

    /// Diagnostic summary, if any
    pub fn stderr(&self) -> Option<&str> {
        self.output.get(keys::STDERR).and_then(|v| v.as_deref())
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Map a volume path to the key reported to the page
///
/// The output-directory prefix is stripped first when configured, then the
/// mount prefix; anything else passes through unchanged.
pub fn normalize_output_path(config: &WorkerConfig, path: &str) -> String {
    if config.strip_output_dir {
        let out = format!("{}/", config.output_path());
        if let Some(rest) = path.strip_prefix(&out) {
            return rest.to_string();
        }
    }
    let mount = match config.mount() {
        "/" => "/".to_string(),
        mount => format!("{}/", mount),
    };
    match path.strip_prefix(&mount) {
        Some(rest) => rest.to_string(),
        None => path.to_string(),
    }
}

/// Diagnostic text for a run: stderr, prefixed with the exit code when
/// non-zero, trimmed
pub fn diagnostic_summary(exit_code: i32, diagnostics: &str) -> String {
    if exit_code == 0 {
        diagnostics.trim().to_string()
    } else {
        format!("Exit code: {}\n\n{}", exit_code, diagnostics)
            .trim()
            .to_string()
    }
}

/// Build the output map: normalized files plus the stream entries
pub fn assemble_output(config: &WorkerConfig, run: RawRun) -> OutputMap {
    let mut output = OutputMap::new();
    for (path, content) in run.files {
        let mut key = normalize_output_path(config, &path);
        if key == keys::STDOUT || key == keys::STDERR {
            // A real file must not shadow a stream entry
            key = format!("./{}", key);
        }
        output.insert(key, content);
    }

    let stdout = run.stdout.trim();
    if !stdout.is_empty() {
        output.insert(keys::STDOUT.to_string(), Some(stdout.to_string()));
    }
    let stderr = diagnostic_summary(run.exit_code, &run.diagnostics);
    if !stderr.is_empty() {
        output.insert(keys::STDERR.to_string(), Some(stderr));
    }
    output
}

/// `init` and `compile` over a runtime
pub struct CompileBridge<R> {
    runtime: R,
    config: Rc<WorkerConfig>,
    clock: Rc<dyn Clock>,
}

impl<R: CompileRuntime> CompileBridge<R> {
    pub fn new(runtime: R, config: Rc<WorkerConfig>, clock: Rc<dyn Clock>) -> Self {
        Self {
            runtime,
            config,
            clock,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Load (and boot, for resident runtimes) without compiling. Idempotent.
    pub async fn init(&self) -> BridgeResult<()> {
        self.runtime.ensure_ready().await
    }

    /// Run `command` against `files`
    pub async fn compile(&self, command: &str, files: FileMap) -> BridgeResult<CompileResult> {
        self.runtime.ensure_ready().await?;

        let args = tokenize_args(command).map_err(|e| BridgeError::InvalidCommand {
            reason: e.to_string(),
        })?;

        let started = self.clock.now_ms();
        let run = self.runtime.execute(CompileJob { args, files }).await?;
        let exit_code = run.exit_code;
        let output = assemble_output(&self.config, run);
        let elapsed_millis = self.clock.now_ms() - started;

        console_log!(
            "[worker] Compile finished: exit {}, {} entries, {:.0}ms",
            exit_code,
            output.len(),
            elapsed_millis
        );
        Ok(CompileResult {
            output,
            elapsed_millis,
            exit_code,
        })
    }
}
