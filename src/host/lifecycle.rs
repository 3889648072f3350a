//! Runtime lifecycles
//!
//! Two ways to run the toolchain module:
//!
//! - [`OneShotRuntime`]: every compile gets a fresh volume and a fresh host
//!   runtime, runs the program to completion and harvests the volume.
//! - [`ResidentRuntime`]: one instance boots once with a stub filesystem and
//!   publishes a compile entry point; compiles call into it.
//!
//! ```text
//! Unloaded -> ModuleLoaded -> Instantiated -> Booting -> Ready     (resident)
//! Unloaded -> ModuleLoaded -> Running -> Exited -> ModuleLoaded    (one-shot)
//! ```

use super::engine::{Engine, ExitHook, Launch};
use super::handshake::{Handshake, ResidentInput};
use super::loader::{ArtifactSource, ModuleLoader};
use super::shim::{FsShim, SharedFs};
use crate::config::{Lifecycle, WorkerConfig};
use crate::console_log;
use crate::error::{BridgeError, BridgeResult};
use crate::platform::Clock;
use crate::vfs::{MemoryFs, STDERR_PATH, STDOUT_PATH, Snapshot, StubFs, resolve_under};
use futures::FutureExt;
use futures::future::{self, Either, LocalBoxFuture, Shared};
use futures::lock::Mutex;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

/// Where a runtime is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    ModuleLoaded,
    Instantiated,
    Booting,
    Ready,
    Running,
    Exited,
}

/// One compile request, already tokenized
#[derive(Debug, Clone, Default)]
pub struct CompileJob {
    pub args: Vec<String>,
    /// Relative or absolute path to content
    pub files: BTreeMap<String, String>,
}

/// What a run produced, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRun {
    pub exit_code: i32,
    pub stdout: String,
    pub diagnostics: String,
    /// Path to content, `None` for deleted paths
    pub files: Snapshot,
}

/// A runtime the bridge can compile against
pub trait CompileRuntime {
    /// Load (and for resident runtimes, boot) the module. Idempotent;
    /// concurrent callers share one attempt.
    fn ensure_ready(&self) -> impl Future<Output = BridgeResult<()>>;

    /// Run one compile. Callers must have awaited `ensure_ready`.
    fn execute(&self, job: CompileJob) -> impl Future<Output = BridgeResult<RawRun>>;

    fn phase(&self) -> Phase;
}

/// Decode captured stream bytes
fn stream_text(fs: &MemoryFs, path: &str) -> String {
    fs.read_file(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Fresh volume and fresh host runtime per compile
pub struct OneShotRuntime<E: Engine> {
    config: Rc<WorkerConfig>,
    engine: Rc<E>,
    loader: ModuleLoader<E>,
    clock: Rc<dyn Clock>,
    /// The shim lives in process-wide scope, so runs take turns
    slot: Mutex<()>,
    phase: Cell<Phase>,
}

impl<E: Engine + 'static> OneShotRuntime<E> {
    pub fn new(
        config: Rc<WorkerConfig>,
        source: Rc<dyn ArtifactSource>,
        engine: Rc<E>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let loader = ModuleLoader::new(source, engine.clone(), config.required_exports.clone());
        Self {
            config,
            engine,
            loader,
            clock,
            slot: Mutex::new(()),
            phase: Cell::new(Phase::Unloaded),
        }
    }

    async fn run(&self, job: CompileJob) -> BridgeResult<RawRun> {
        let module = self.loader.ensure_loaded().await?;
        let _turn = self.slot.lock().await;

        let mount = self.config.mount();
        let volume = Rc::new(RefCell::new(MemoryFs::new()));
        {
            let mut fs = volume.borrow_mut();
            fs.set_clock(self.clock.wall_time_ms());
            fs.seed(
                job.files.iter().map(|(path, content)| (path.as_str(), content.as_str())),
                mount,
            )
            .map_err(|e| BridgeError::InvalidFiles {
                reason: e.to_string(),
            })?;
        }

        let shared: SharedFs = volume.clone();
        self.engine.install_fs(Rc::new(FsShim::new(shared)))?;

        let mut argv = vec![self.config.program_name.clone()];
        argv.extend(job.args);
        let (exit, status) = ExitHook::channel();
        let instance = self.engine.instantiate(&module, Launch { argv, exit }).await?;
        self.engine.start(instance)?;
        self.phase.set(Phase::Running);

        let code = status.await;
        self.phase.set(Phase::Exited);
        let exit_code = code?;

        let fs = volume.borrow();
        let run = RawRun {
            exit_code,
            stdout: stream_text(&fs, STDOUT_PATH),
            diagnostics: stream_text(&fs, STDERR_PATH),
            files: fs.snapshot(&self.config.output_path()),
        };
        // Back to a loaded module, ready for the next run
        self.phase.set(Phase::ModuleLoaded);
        Ok(run)
    }
}

impl<E: Engine + 'static> CompileRuntime for OneShotRuntime<E> {
    async fn ensure_ready(&self) -> BridgeResult<()> {
        self.loader.ensure_loaded().await?;
        if self.phase.get() == Phase::Unloaded {
            self.phase.set(Phase::ModuleLoaded);
        }
        Ok(())
    }

    async fn execute(&self, job: CompileJob) -> BridgeResult<RawRun> {
        self.run(job).await
    }

    fn phase(&self) -> Phase {
        self.phase.get()
    }
}

type BootFuture = Shared<LocalBoxFuture<'static, BridgeResult<()>>>;

/// One long-lived instance with a published compile entry point
pub struct ResidentRuntime<E: Engine> {
    config: Rc<WorkerConfig>,
    engine: Rc<E>,
    loader: ModuleLoader<E>,
    stub: Rc<RefCell<StubFs>>,
    handshake: Rc<Handshake>,
    boot: Rc<RefCell<Option<BootFuture>>>,
    phase: Rc<Cell<Phase>>,
}

impl<E: Engine + 'static> ResidentRuntime<E> {
    pub fn new(config: Rc<WorkerConfig>, source: Rc<dyn ArtifactSource>, engine: Rc<E>) -> Self {
        let loader = ModuleLoader::new(source, engine.clone(), config.required_exports.clone());
        Self {
            config,
            engine,
            loader,
            stub: Rc::new(RefCell::new(StubFs::new())),
            handshake: Rc::new(Handshake::new()),
            boot: Rc::new(RefCell::new(None)),
            phase: Rc::new(Cell::new(Phase::Unloaded)),
        }
    }

    /// The handshake the instance signals through
    pub fn handshake(&self) -> &Rc<Handshake> {
        &self.handshake
    }

    /// The stdio provider the instance was booted with
    pub fn stub(&self) -> &Rc<RefCell<StubFs>> {
        &self.stub
    }

    fn boot(&self) -> impl Future<Output = BridgeResult<()>> + use<E> {
        let loading = self.loader.ensure_loaded();
        let engine = self.engine.clone();
        let stub = self.stub.clone();
        let handshake = self.handshake.clone();
        let phase = self.phase.clone();
        let slot = self.boot.clone();
        let argv = vec![self.config.program_name.clone()];

        async move {
            let result: BridgeResult<()> = async {
                let module = loading.await?;
                phase.set(Phase::ModuleLoaded);

                // The host runtime captures the fs object as it initializes
                let shared: SharedFs = stub;
                engine.install_fs(Rc::new(FsShim::new(shared)))?;
                engine.install_handshake(handshake.clone())?;

                let (exit, status) = ExitHook::channel();
                let instance = engine.instantiate(&module, Launch { argv, exit }).await?;
                phase.set(Phase::Instantiated);
                engine.start(instance)?;
                phase.set(Phase::Booting);
                console_log!("[runtime] Waiting for resident module to signal readiness");

                match future::select(handshake.wait_ready(), status).await {
                    Either::Left(((), _)) => Ok(()),
                    Either::Right((code, _)) => Err(BridgeError::boot(format!(
                        "module exited with code {} before signalling readiness",
                        code?
                    ))),
                }
            }
            .await;

            match &result {
                Ok(()) => {
                    phase.set(Phase::Ready);
                    console_log!("[runtime] Resident module ready");
                }
                Err(e) => {
                    console_log!("[runtime] Boot failed: {}", e);
                    // A failed boot leaves nothing running; the next call starts over
                    *slot.borrow_mut() = None;
                    if phase.get() != Phase::Unloaded {
                        phase.set(Phase::ModuleLoaded);
                    }
                }
            }
            result
        }
    }
}

impl<E: Engine + 'static> CompileRuntime for ResidentRuntime<E> {
    async fn ensure_ready(&self) -> BridgeResult<()> {
        if self.phase.get() == Phase::Ready {
            return Ok(());
        }
        let pending = {
            let mut slot = self.boot.borrow_mut();
            match &*slot {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.boot().boxed_local().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    async fn execute(&self, job: CompileJob) -> BridgeResult<RawRun> {
        let entry = self.handshake.entry()?;
        let mount = self.config.mount();
        let input = ResidentInput {
            files: job
                .files
                .into_iter()
                .map(|(path, content)| (resolve_under(mount, &path), content))
                .collect(),
            args: job.args,
        };

        // Anything logged between compiles is not this compile's diagnostics
        self.stub.borrow_mut().take_stderr();
        let output = entry(&input);
        let diagnostics = {
            let mut stub = self.stub.borrow_mut();
            // fd 1 was already echoed; the entry point returns its own stdout
            stub.take_stdout();
            stub.take_stderr()
        };
        let output = output?;

        Ok(RawRun {
            exit_code: output.exit_code,
            stdout: output.stdout,
            diagnostics,
            files: output.files,
        })
    }

    fn phase(&self) -> Phase {
        self.phase.get()
    }
}

/// Runtime picked by [`Lifecycle`] at startup
pub enum AnyRuntime<E: Engine> {
    OneShot(OneShotRuntime<E>),
    Resident(ResidentRuntime<E>),
}

impl<E: Engine + 'static> AnyRuntime<E> {
    pub fn new(
        config: Rc<WorkerConfig>,
        source: Rc<dyn ArtifactSource>,
        engine: Rc<E>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        match config.lifecycle {
            Lifecycle::Oneshot => Self::OneShot(OneShotRuntime::new(config, source, engine, clock)),
            Lifecycle::Resident => Self::Resident(ResidentRuntime::new(config, source, engine)),
        }
    }
}

impl<E: Engine + 'static> CompileRuntime for AnyRuntime<E> {
    async fn ensure_ready(&self) -> BridgeResult<()> {
        match self {
            Self::OneShot(runtime) => runtime.ensure_ready().await,
            Self::Resident(runtime) => runtime.ensure_ready().await,
        }
    }

    async fn execute(&self, job: CompileJob) -> BridgeResult<RawRun> {
        match self {
            Self::OneShot(runtime) => runtime.execute(job).await,
            Self::Resident(runtime) => runtime.execute(job).await,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Self::OneShot(runtime) => runtime.phase(),
            Self::Resident(runtime) => runtime.phase(),
        }
    }
}
