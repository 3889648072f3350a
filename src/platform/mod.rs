//! Platform Abstraction Layer
//!
//! The bridge core is host-agnostic; this layer supplies what differs per
//! host:
//!
//! - Browser worker (via wasm-bindgen, web-sys): artifact fetch, the
//!   WebAssembly engine, the message channel
//! - Native: a wall clock, so the core can be driven by tests and tools
//!
//! Only the web implementation knows about JS.

#[cfg(target_arch = "wasm32")]
#[cfg(target_os = "unknown")] // Browser WASM (no WASI)
pub mod web;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform-specific errors
#[derive(Debug, Clone)]
pub enum PlatformError {
    /// Feature not supported on this platform
    NotSupported(String),
    /// Initialization failed
    InitFailed(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::NotSupported(s) => write!(f, "Not supported: {}", s),
            PlatformError::InitFailed(s) => write!(f, "Init failed: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Time source
pub trait Clock {
    /// Monotonic milliseconds since some origin, for measuring durations
    fn now_ms(&self) -> f64;

    /// Milliseconds since the Unix epoch, for file timestamps
    fn wall_time_ms(&self) -> f64;
}

/// Native clock over `std::time`
#[cfg(not(target_arch = "wasm32"))]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wall_time_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}
