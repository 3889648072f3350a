//! Worker configuration
//!
//! Every knob has a default that matches the stock deployment: the toolchain
//! is served at `/tsgo.wasm`, sources are mounted at `/app`, and emitted
//! files land under `/app/dist`.

use serde::Deserialize;

/// How the toolchain module is kept alive between compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// A fresh instance per compile; the run ends with an exit code.
    #[default]
    Oneshot,
    /// One instance boots and stays up; compiles call its entry point.
    Resident,
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// URL of the toolchain artifact
    pub artifact_url: String,
    /// Absolute mount point of the virtual volume
    pub mount_root: String,
    /// Output directory, relative to the mount
    pub output_dir: String,
    /// Report output keys relative to `output_dir` instead of the mount
    pub strip_output_dir: bool,
    /// argv[0] handed to the module
    pub program_name: String,
    pub lifecycle: Lifecycle,
    /// Global slot the resident module sets once it has booted
    pub ready_flag: String,
    /// Global slot holding the resident module's compile entry point
    pub entry_point: String,
    /// Exports the fetched module must carry to be accepted
    pub required_exports: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            artifact_url: "/tsgo.wasm".to_string(),
            mount_root: "/app".to_string(),
            output_dir: "dist".to_string(),
            strip_output_dir: false,
            program_name: "js".to_string(),
            lifecycle: Lifecycle::Oneshot,
            ready_flag: "__tsgoReady".to_string(),
            entry_point: "__tsgoCompile".to_string(),
            required_exports: vec!["mem".to_string(), "run".to_string()],
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("invalid worker config: {}", e))
    }

    pub fn artifact_url(mut self, url: impl Into<String>) -> Self {
        self.artifact_url = url.into();
        self
    }

    pub fn mount_root(mut self, root: impl Into<String>) -> Self {
        self.mount_root = root.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn strip_output_dir(mut self, strip: bool) -> Self {
        self.strip_output_dir = strip;
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn required_exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_exports = names.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Mount root without a trailing slash (`/app`)
    pub fn mount(&self) -> &str {
        let trimmed = self.mount_root.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    /// Absolute path of the output directory (`/app/dist`)
    pub fn output_path(&self) -> String {
        let dir = self.output_dir.trim_matches('/');
        match (self.mount(), dir.is_empty()) {
            (mount, true) => mount.to_string(),
            ("/", false) => format!("/{}", dir),
            (mount, false) => format!("{}/{}", mount, dir),
        }
    }
}
