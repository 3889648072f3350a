//! Engine abstraction
//!
//! Everything that needs a real WebAssembly host sits behind [`Engine`]: the
//! browser implementation drives `WebAssembly` and the toolchain's host
//! runtime, tests drive a scripted fake. The runtimes in `lifecycle` only
//! sequence calls against this trait.

use super::handshake::Handshake;
use super::shim::FsShim;
use crate::error::{BridgeError, BridgeResult};
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// How a module instance is launched
pub struct Launch {
    /// Program name followed by the command's arguments
    pub argv: Vec<String>,
    /// Fired with the exit code when the program exits
    pub exit: ExitHook,
}

/// One-shot exit notification handed to the host runtime
///
/// Cloneable so the runtime's exit callback and its failure path can both
/// hold one; only the first code is delivered.
#[derive(Clone)]
pub struct ExitHook {
    tx: Rc<RefCell<Option<oneshot::Sender<i32>>>>,
}

impl ExitHook {
    pub fn channel() -> (ExitHook, ExitStatus) {
        let (tx, rx) = oneshot::channel();
        (
            ExitHook {
                tx: Rc::new(RefCell::new(Some(tx))),
            },
            ExitStatus { rx },
        )
    }

    /// Report the exit code. Later calls are ignored.
    pub fn exit(&self, code: i32) {
        if let Some(tx) = self.tx.borrow_mut().take() {
            // Receiver gone means nobody is waiting on this run any more
            let _ = tx.send(code);
        }
    }

    pub fn has_fired(&self) -> bool {
        self.tx.borrow().is_none()
    }
}

/// Resolves with the code passed to [`ExitHook::exit`]
pub struct ExitStatus {
    rx: oneshot::Receiver<i32>,
}

impl Future for ExitStatus {
    type Output = BridgeResult<i32>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| BridgeError::boot("module runtime dropped without exiting")))
    }
}

/// A WebAssembly host able to run the toolchain module
///
/// Ordering contract: `install_fs` must be called before `instantiate`,
/// because the host runtime captures the fs object while it initializes.
pub trait Engine {
    /// A compiled, not yet instantiated module
    type Module: Clone + 'static;

    /// An instantiated module with its host runtime, not yet started
    type Instance: 'static;

    /// Compile raw module bytes
    fn compile(&self, bytes: Vec<u8>) -> LocalBoxFuture<'static, BridgeResult<Self::Module>>;

    /// Publish the fs shim in process-wide scope, replacing any previous one
    fn install_fs(&self, shim: Rc<FsShim>) -> BridgeResult<()>;

    /// Publish the readiness flag and entry-point slots for a resident module
    fn install_handshake(&self, handshake: Rc<Handshake>) -> BridgeResult<()>;

    /// Construct a fresh host runtime and instantiate the module against it
    fn instantiate(
        &self,
        module: &Self::Module,
        launch: Launch,
    ) -> LocalBoxFuture<'static, BridgeResult<Self::Instance>>;

    /// Start the program. Returns once it is running; completion is reported
    /// through the launch's exit hook.
    fn start(&self, instance: Self::Instance) -> BridgeResult<()>;
}
