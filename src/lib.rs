//! tsgo-worker - a background worker that runs a WASM-compiled TypeScript
//! toolchain against an in-memory file tree.
//!
//! Layers, leaf first:
//! - `vfs`: the file storage the toolchain sees (full volume or stub)
//! - `host`: Node-style fs shim, module loader, runtime lifecycle
//! - `bridge`: turns `compile(command, files)` into a normalized result
//! - `transport`: the two-method RPC surface exposed to the page
//!
//! Platform support:
//! - Browser worker (wasm32-unknown-unknown): fetch, WebAssembly, postMessage
//! - Native: the same core, driven by tests and fake engines

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod platform;
pub mod tokenize;
pub mod transport;
pub mod vfs;

pub use bridge::{CompileBridge, CompileResult, FileMap, OutputMap};
pub use config::{Lifecycle, WorkerConfig};
pub use error::{BridgeError, BridgeResult};

/// Initialize panic hook for better error messages in the worker console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Start the worker with default configuration. This is the WASM entry point.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
}

/// Wire the RPC transport to the worker's message channel.
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
#[wasm_bindgen]
pub fn start() -> Result<(), JsValue> {
    platform::web::start(WorkerConfig::default())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Same as [`start`], with a JSON-encoded [`WorkerConfig`].
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
#[wasm_bindgen]
pub fn start_with_config(json: &str) -> Result<(), JsValue> {
    let config = WorkerConfig::from_json(json).map_err(|e| JsValue::from_str(&e))?;
    platform::web::start(config).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

/// Log to the worker console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
