//! Lifecycle tests against a scripted engine
//!
//! The fake engine stands in for WebAssembly and the host runtime: "starting"
//! a one-shot instance runs a Rust closure against the installed fs shim and
//! fires the exit hook; starting a resident instance publishes an entry point
//! and (optionally) the readiness flag.

use super::loader::test_modules::toolchain_module;
use super::*;
use crate::config::{Lifecycle, WorkerConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::platform::Clock;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, block_on};
use futures::future::{LocalBoxFuture, Shared};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// Fakes
// =============================================================================

type Program = Rc<dyn Fn(&FsShim, &[String]) -> i32>;

enum Behavior {
    /// Run to completion, returning the exit code
    Program(Program),
    /// Stay alive; publish `entry` and, if `auto_ready`, the ready flag
    Resident {
        entry: Option<EntryPoint>,
        auto_ready: bool,
    },
    /// Run the program's writes, then stay alive until `kill`
    Held(Program),
    /// Exit immediately with this code
    ExitEarly(i32),
}

#[derive(Clone)]
struct FakeModule;

struct FakeInstance {
    argv: Vec<String>,
    exit: ExitHook,
}

struct FakeEngine {
    behavior: Behavior,
    fail_instantiate: Cell<bool>,
    compiles: Cell<usize>,
    instantiations: Cell<usize>,
    launches: RefCell<Vec<Vec<String>>>,
    fs: RefCell<Option<Rc<FsShim>>>,
    handshake: RefCell<Option<Rc<Handshake>>>,
    /// Exit hooks of instances that are still alive
    alive: RefCell<Vec<ExitHook>>,
}

impl FakeEngine {
    fn new(behavior: Behavior) -> Rc<Self> {
        Rc::new(Self {
            behavior,
            fail_instantiate: Cell::new(false),
            compiles: Cell::new(0),
            instantiations: Cell::new(0),
            launches: RefCell::new(Vec::new()),
            fs: RefCell::new(None),
            handshake: RefCell::new(None),
            alive: RefCell::new(Vec::new()),
        })
    }

    fn program(f: impl Fn(&FsShim, &[String]) -> i32 + 'static) -> Rc<Self> {
        Self::new(Behavior::Program(Rc::new(f)))
    }

    fn shim(&self) -> Rc<FsShim> {
        self.fs.borrow().clone().expect("fs shim installed")
    }

    fn mark_ready(&self) {
        self.handshake
            .borrow()
            .as_ref()
            .expect("handshake installed")
            .mark_ready();
    }

    fn kill(&self, code: i32) {
        for hook in self.alive.borrow_mut().drain(..) {
            hook.exit(code);
        }
    }
}

impl Engine for FakeEngine {
    type Module = FakeModule;
    type Instance = FakeInstance;

    fn compile(&self, _bytes: Vec<u8>) -> LocalBoxFuture<'static, BridgeResult<FakeModule>> {
        self.compiles.set(self.compiles.get() + 1);
        futures::future::ready(Ok(FakeModule)).boxed_local()
    }

    fn install_fs(&self, shim: Rc<FsShim>) -> BridgeResult<()> {
        *self.fs.borrow_mut() = Some(shim);
        Ok(())
    }

    fn install_handshake(&self, handshake: Rc<Handshake>) -> BridgeResult<()> {
        *self.handshake.borrow_mut() = Some(handshake);
        Ok(())
    }

    fn instantiate(
        &self,
        _module: &FakeModule,
        launch: Launch,
    ) -> LocalBoxFuture<'static, BridgeResult<FakeInstance>> {
        self.instantiations.set(self.instantiations.get() + 1);
        let result = if self.fail_instantiate.get() {
            Err(BridgeError::boot("LinkError: import object field missing"))
        } else {
            Ok(FakeInstance {
                argv: launch.argv,
                exit: launch.exit,
            })
        };
        futures::future::ready(result).boxed_local()
    }

    fn start(&self, instance: FakeInstance) -> BridgeResult<()> {
        self.launches.borrow_mut().push(instance.argv.clone());
        match &self.behavior {
            Behavior::Program(program) => {
                let code = program(&self.shim(), &instance.argv);
                instance.exit.exit(code);
            }
            Behavior::Resident { entry, auto_ready } => {
                let handshake = self.handshake.borrow().clone().expect("handshake installed");
                if let Some(entry) = entry {
                    handshake.set_entry(entry.clone());
                }
                if *auto_ready {
                    handshake.mark_ready();
                }
                self.alive.borrow_mut().push(instance.exit);
            }
            Behavior::Held(program) => {
                program(&self.shim(), &instance.argv);
                self.alive.borrow_mut().push(instance.exit);
            }
            Behavior::ExitEarly(code) => instance.exit.exit(*code),
        }
        Ok(())
    }
}

struct FakeSource {
    bytes: BridgeResult<Vec<u8>>,
    fetches: Cell<usize>,
    gate: RefCell<Option<Shared<oneshot::Receiver<()>>>>,
}

impl FakeSource {
    fn serving(bytes: Vec<u8>) -> Rc<Self> {
        Rc::new(Self {
            bytes: Ok(bytes),
            fetches: Cell::new(0),
            gate: RefCell::new(None),
        })
    }

    fn toolchain() -> Rc<Self> {
        Self::serving(toolchain_module())
    }

    fn failing(err: BridgeError) -> Rc<Self> {
        Rc::new(Self {
            bytes: Err(err),
            fetches: Cell::new(0),
            gate: RefCell::new(None),
        })
    }

    /// Hold every fetch until the returned sender fires
    fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.borrow_mut() = Some(rx.shared());
        tx
    }
}

impl ArtifactSource for FakeSource {
    fn location(&self) -> &str {
        "/tsgo.wasm"
    }

    fn fetch(&self) -> LocalBoxFuture<'static, BridgeResult<Vec<u8>>> {
        self.fetches.set(self.fetches.get() + 1);
        let result = self.bytes.clone();
        let gate = self.gate.borrow().clone();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }
        .boxed_local()
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now_ms(&self) -> f64 {
        0.0
    }

    fn wall_time_ms(&self) -> f64 {
        1_700_000_000_000.0
    }
}

fn one_shot(source: &Rc<FakeSource>, engine: &Rc<FakeEngine>) -> OneShotRuntime<FakeEngine> {
    OneShotRuntime::new(
        Rc::new(WorkerConfig::default()),
        source.clone(),
        engine.clone(),
        Rc::new(FixedClock),
    )
}

fn resident_runtime(source: &Rc<FakeSource>, engine: &Rc<FakeEngine>) -> ResidentRuntime<FakeEngine> {
    let config = WorkerConfig::default().lifecycle(Lifecycle::Resident);
    ResidentRuntime::new(Rc::new(config), source.clone(), engine.clone())
}

fn job(args: &[&str], files: &[(&str, &str)]) -> CompileJob {
    CompileJob {
        args: args.iter().map(|s| s.to_string()).collect(),
        files: files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect(),
    }
}

/// Read a whole file through the shim
fn read_all(shim: &FsShim, path: &str) -> Option<String> {
    let fd = shim.open(path, 0, 0).ok()?;
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = shim.read(fd, &mut buf, None).ok()?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    shim.close(fd).ok()?;
    String::from_utf8(out).ok()
}

fn write_all(shim: &FsShim, path: &str, content: &str) {
    // O_WRONLY | O_CREAT | O_TRUNC
    let fd = shim.open(path, 1 | 64 | 512, 0o644).expect("open for write");
    shim.write(fd, content.as_bytes(), None).expect("write");
    shim.close(fd).expect("close");
}

/// A toy "compiler": emits dist/<name>.js for every .ts file under /app
fn toy_compiler() -> Rc<FakeEngine> {
    FakeEngine::program(|shim, _argv| {
        let mut names = shim.readdir("/app").unwrap_or_default();
        names.sort();
        let sources: Vec<String> = names.into_iter().filter(|n| n.ends_with(".ts")).collect();
        if sources.is_empty() {
            shim.write_sync(2, b"error TS18003: No inputs were found.\n")
                .expect("stderr");
            return 1;
        }
        if shim.stat("/app/dist").is_err() {
            shim.mkdir("/app/dist", 0o755).expect("mkdir dist");
        }
        for name in &sources {
            let source = read_all(shim, &format!("/app/{}", name)).unwrap_or_default();
            let js = source.replace(": number", "");
            let out = format!("/app/dist/{}", name.replace(".ts", ".js"));
            write_all(shim, &out, &js);
        }
        shim.write_sync(1, format!("compiled {} file(s)\n", sources.len()).as_bytes())
            .expect("stdout");
        0
    })
}

// =============================================================================
// Loading
// =============================================================================

mod loading_tests {
    use super::*;

    #[test]
    fn test_warmup_is_idempotent() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);
        assert_eq!(runtime.phase(), Phase::Unloaded);

        block_on(runtime.ensure_ready()).unwrap();
        block_on(runtime.ensure_ready()).unwrap();

        assert_eq!(source.fetches.get(), 1);
        assert_eq!(engine.compiles.get(), 1);
        assert_eq!(engine.instantiations.get(), 0);
        assert_eq!(runtime.phase(), Phase::ModuleLoaded);
    }

    #[test]
    fn test_concurrent_warmups_share_one_attempt() {
        let source = FakeSource::toolchain();
        let release = source.hold();
        let engine = toy_compiler();
        let runtime = Rc::new(one_shot(&source, &engine));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut pool = LocalPool::new();
        for _ in 0..3 {
            let runtime = runtime.clone();
            let results = results.clone();
            pool.spawner()
                .spawn_local(async move {
                    let result = runtime.ensure_ready().await;
                    results.borrow_mut().push(result);
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(source.fetches.get(), 1);
        assert!(results.borrow().is_empty());

        release.send(()).unwrap();
        pool.run();
        assert_eq!(*results.borrow(), vec![Ok(()), Ok(()), Ok(())]);
        assert_eq!(engine.compiles.get(), 1);
    }

    #[test]
    fn test_failed_fetch_rejects_every_waiter() {
        let source = FakeSource::failing(BridgeError::load("HTTP 404 fetching /tsgo.wasm"));
        let engine = toy_compiler();
        let runtime = Rc::new(one_shot(&source, &engine));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut pool = LocalPool::new();
        for _ in 0..2 {
            let runtime = runtime.clone();
            let results = results.clone();
            pool.spawner()
                .spawn_local(async move {
                    let result = runtime.ensure_ready().await;
                    results.borrow_mut().push(result);
                })
                .unwrap();
        }
        pool.run();

        let results = results.borrow();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(BridgeError::Load { .. }))));
        assert_eq!(source.fetches.get(), 1);
        assert_eq!(engine.compiles.get(), 0);
        assert_eq!(engine.instantiations.get(), 0);
        assert_eq!(runtime.phase(), Phase::Unloaded);
    }

    #[test]
    fn test_failed_load_is_retried_by_later_calls() {
        let source = FakeSource::failing(BridgeError::load("network error"));
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);

        assert!(block_on(runtime.ensure_ready()).is_err());
        assert!(block_on(runtime.execute(job(&[], &[]))).is_err());
        assert_eq!(source.fetches.get(), 2);
    }

    #[test]
    fn test_non_module_bytes_are_rejected_before_compiling() {
        let source = FakeSource::serving(b"<!doctype html>".to_vec());
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);

        let err = block_on(runtime.ensure_ready()).unwrap_err();
        assert!(matches!(err, BridgeError::Load { .. }));
        assert_eq!(engine.compiles.get(), 0);
    }
}

// =============================================================================
// One-shot lifecycle
// =============================================================================

mod oneshot_tests {
    use super::*;

    #[test]
    fn test_compile_seeds_and_harvests() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);

        let run = block_on(runtime.execute(job(
            &["-p", "."],
            &[("index.ts", "let a: number = 1")],
        )))
        .unwrap();

        assert_eq!(run.exit_code, 0);
        assert_eq!(run.stdout, "compiled 1 file(s)\n");
        assert_eq!(run.diagnostics, "");
        assert_eq!(
            run.files,
            BTreeMap::from([("/app/dist/index.js".to_string(), Some("let a = 1".to_string()))])
        );
        assert_eq!(*engine.launches.borrow(), vec![vec!["js", "-p", "."]]);
        assert_eq!(runtime.phase(), Phase::ModuleLoaded);
    }

    #[test]
    fn test_each_run_gets_a_fresh_volume() {
        let source = FakeSource::toolchain();
        let seen_stale = Rc::new(Cell::new(false));
        let seen = seen_stale.clone();
        let engine = FakeEngine::program(move |shim, _| {
            if shim.stat("/app/stale.txt").is_ok() {
                seen.set(true);
            }
            write_all(shim, "/app/stale.txt", "left over");
            0
        });
        let runtime = one_shot(&source, &engine);

        block_on(runtime.execute(job(&[], &[("a.ts", "1")]))).unwrap();
        block_on(runtime.execute(job(&[], &[("b.ts", "2")]))).unwrap();

        assert!(!seen_stale.get());
        assert_eq!(engine.instantiations.get(), 2);
        assert_eq!(engine.compiles.get(), 1);
    }

    #[test]
    fn test_overlapping_runs_do_not_share_files() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Held(Rc::new(|shim: &FsShim, _: &[String]| {
            let names = shim.readdir("/app").unwrap_or_default();
            shim.mkdir("/app/dist", 0o755).expect("mkdir dist");
            for name in names {
                write_all(shim, &format!("/app/dist/{}", name.replace(".ts", ".js")), "built");
            }
            0
        })));
        let runtime = Rc::new(one_shot(&source, &engine));
        let runs = Rc::new(RefCell::new(BTreeMap::new()));

        let mut pool = LocalPool::new();
        for name in ["a.ts", "b.ts"] {
            let runtime = runtime.clone();
            let runs = runs.clone();
            pool.spawner()
                .spawn_local(async move {
                    let run = runtime.execute(job(&[], &[(name, "x")])).await;
                    runs.borrow_mut().insert(name, run);
                })
                .unwrap();
        }

        // The second run queues behind the first, whose exit is still held
        pool.run_until_stalled();
        assert_eq!(engine.launches.borrow().len(), 1);
        assert_eq!(runtime.phase(), Phase::Running);

        engine.kill(0);
        pool.run_until_stalled();
        assert_eq!(engine.launches.borrow().len(), 2);
        assert_eq!(runs.borrow().len(), 1);

        engine.kill(0);
        pool.run();

        let runs = runs.borrow();
        let a = runs["a.ts"].as_ref().unwrap();
        let b = runs["b.ts"].as_ref().unwrap();
        assert_eq!(a.files.keys().collect::<Vec<_>>(), vec!["/app/dist/a.js"]);
        assert_eq!(b.files.keys().collect::<Vec<_>>(), vec!["/app/dist/b.js"]);
        assert_eq!(engine.instantiations.get(), 2);
    }

    #[test]
    fn test_deleted_output_is_reported_as_null() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::program(|shim, _| {
            shim.unlink("/app/dist/old.js").expect("unlink");
            0
        });
        let runtime = one_shot(&source, &engine);

        let run = block_on(runtime.execute(job(
            &[],
            &[("dist/old.js", "stale"), ("dist/keep.js", "keep")],
        )))
        .unwrap();

        assert_eq!(run.files.get("/app/dist/old.js"), Some(&None));
        assert_eq!(run.files.get("/app/dist/keep.js"), Some(&Some("keep".to_string())));
    }

    #[test]
    fn test_failing_compile_captures_stderr() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);

        let run = block_on(runtime.execute(job(&[], &[("README.md", "# hi")]))).unwrap();
        assert_eq!(run.exit_code, 1);
        assert_eq!(run.diagnostics, "error TS18003: No inputs were found.\n");
        assert!(run.files.is_empty());
    }

    #[test]
    fn test_conflicting_file_map_is_rejected() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);

        let err = block_on(runtime.execute(job(&[], &[("src", "x"), ("src/a.ts", "y")])))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidFiles { .. }));
        assert_eq!(engine.instantiations.get(), 0);
    }

    #[test]
    fn test_instantiation_failure_is_a_boot_error() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        engine.fail_instantiate.set(true);
        let runtime = one_shot(&source, &engine);

        let err = block_on(runtime.execute(job(&[], &[]))).unwrap_err();
        assert!(matches!(err, BridgeError::Boot { .. }));
    }

    #[test]
    fn test_volume_constants_are_real() {
        let source = FakeSource::toolchain();
        let engine = toy_compiler();
        let runtime = one_shot(&source, &engine);
        block_on(runtime.execute(job(&[], &[("a.ts", "")]))).unwrap();
        assert_eq!(engine.shim().constants(), FsConstants::LINUX);
    }
}

// =============================================================================
// Resident lifecycle
// =============================================================================

mod resident_tests {
    use super::*;

    fn echo_entry() -> EntryPoint {
        Rc::new(|input: &ResidentInput| {
            let files = input
                .files
                .iter()
                .map(|(path, content)| (path.replace(".ts", ".js"), Some(content.clone())))
                .collect();
            Ok(ResidentOutput {
                exit_code: 0,
                stdout: input.args.join(" "),
                files,
            })
        })
    }

    #[test]
    fn test_boot_waits_for_readiness_signal() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: false,
        });
        let runtime = Rc::new(resident_runtime(&source, &engine));
        let done = Rc::new(RefCell::new(None));

        let mut pool = LocalPool::new();
        {
            let runtime = runtime.clone();
            let done = done.clone();
            pool.spawner()
                .spawn_local(async move {
                    *done.borrow_mut() = Some(runtime.ensure_ready().await);
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(runtime.phase(), Phase::Booting);
        assert!(done.borrow().is_none());

        engine.mark_ready();
        pool.run_until_stalled();
        assert_eq!(*done.borrow(), Some(Ok(())));
        assert_eq!(runtime.phase(), Phase::Ready);

        block_on(runtime.ensure_ready()).unwrap();
        assert_eq!(engine.instantiations.get(), 1);
        assert_eq!(*engine.launches.borrow(), vec![vec!["js"]]);
    }

    #[test]
    fn test_second_caller_during_boot_joins_it() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: false,
        });
        let runtime = Rc::new(resident_runtime(&source, &engine));
        let results = Rc::new(RefCell::new(Vec::new()));

        let mut pool = LocalPool::new();
        let spawn = |pool: &LocalPool| {
            let runtime = runtime.clone();
            let results = results.clone();
            pool.spawner()
                .spawn_local(async move {
                    let result = runtime.ensure_ready().await;
                    results.borrow_mut().push(result);
                })
                .unwrap();
        };

        spawn(&pool);
        pool.run_until_stalled();
        assert_eq!(runtime.phase(), Phase::Booting);

        spawn(&pool);
        pool.run_until_stalled();
        assert_eq!(engine.instantiations.get(), 1);
        assert!(results.borrow().is_empty());

        engine.mark_ready();
        pool.run();
        assert_eq!(*results.borrow(), vec![Ok(()), Ok(())]);
        assert_eq!(engine.instantiations.get(), 1);
        assert_eq!(engine.launches.borrow().len(), 1);
    }

    #[test]
    fn test_boot_installs_stub_filesystem() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();

        let shim = engine.shim();
        assert_eq!(shim.constants(), FsConstants::UNSUPPORTED);
        assert_eq!(shim.open("/app/a.ts", -1, 0).unwrap_err().code, Errno::Enosys);
        assert!(runtime.handshake().is_ready());
    }

    #[test]
    fn test_compile_goes_through_entry_point() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();

        let run = block_on(runtime.execute(job(&["-p", "."], &[("index.ts", "let a")]))).unwrap();
        assert_eq!(run.exit_code, 0);
        assert_eq!(run.stdout, "-p .");
        assert_eq!(run.files.get("/app/index.js"), Some(&Some("let a".to_string())));
        // Compiles do not start new instances
        assert_eq!(engine.instantiations.get(), 1);
    }

    #[test]
    fn test_stderr_between_calls_is_attributed_to_the_call() {
        let source = FakeSource::toolchain();
        let shim_slot: Rc<RefCell<Option<Rc<FsShim>>>> = Rc::new(RefCell::new(None));
        let slot = shim_slot.clone();
        let entry: EntryPoint = Rc::new(move |_input: &ResidentInput| {
            if let Some(shim) = slot.borrow().as_ref() {
                shim.write_sync(2, b"error TS2304: Cannot find name 'x'.\n").unwrap();
            }
            Ok(ResidentOutput {
                exit_code: 2,
                stdout: String::new(),
                files: BTreeMap::new(),
            })
        });
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(entry),
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();

        let shim = engine.shim();
        shim.write_sync(2, b"boot noise\n").unwrap();
        *shim_slot.borrow_mut() = Some(shim);

        let run = block_on(runtime.execute(job(&[], &[]))).unwrap();
        assert_eq!(run.exit_code, 2);
        assert_eq!(run.diagnostics, "error TS2304: Cannot find name 'x'.\n");
    }

    #[test]
    fn test_stdout_does_not_accumulate_across_calls() {
        let source = FakeSource::toolchain();
        let shim_slot: Rc<RefCell<Option<Rc<FsShim>>>> = Rc::new(RefCell::new(None));
        let slot = shim_slot.clone();
        let entry: EntryPoint = Rc::new(move |_input: &ResidentInput| {
            if let Some(shim) = slot.borrow().as_ref() {
                shim.write_sync(1, &[b'.'; 1024]).unwrap();
            }
            Ok(ResidentOutput {
                exit_code: 0,
                stdout: "ok".to_string(),
                files: BTreeMap::new(),
            })
        });
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(entry),
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();
        *shim_slot.borrow_mut() = Some(engine.shim());

        for _ in 0..100 {
            let run = block_on(runtime.execute(job(&[], &[]))).unwrap();
            assert_eq!(run.stdout, "ok");
        }
        assert_eq!(runtime.stub().borrow().stdout(), "");
        assert_eq!(runtime.stub().borrow().stderr(), "");
    }

    #[test]
    fn test_entry_point_missing_is_unavailable() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: None,
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();

        let err = block_on(runtime.execute(job(&[], &[]))).unwrap_err();
        assert_eq!(err, BridgeError::Unavailable);
    }

    #[test]
    fn test_execute_before_ready_is_unavailable() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: false,
        });
        let runtime = resident_runtime(&source, &engine);
        let err = block_on(runtime.execute(job(&[], &[]))).unwrap_err();
        assert_eq!(err, BridgeError::Unavailable);
    }

    #[test]
    fn test_exit_before_ready_fails_boot() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::ExitEarly(2));
        let runtime = resident_runtime(&source, &engine);

        let err = block_on(runtime.ensure_ready()).unwrap_err();
        assert!(err.to_string().contains("exited with code 2"));
        assert_eq!(runtime.phase(), Phase::ModuleLoaded);

        // The next call starts a new boot; the module itself stays cached
        assert!(block_on(runtime.ensure_ready()).is_err());
        assert_eq!(engine.instantiations.get(), 2);
        assert_eq!(engine.compiles.get(), 1);
    }

    #[test]
    fn test_exit_after_ready_is_ignored() {
        let source = FakeSource::toolchain();
        let engine = FakeEngine::new(Behavior::Resident {
            entry: Some(echo_entry()),
            auto_ready: true,
        });
        let runtime = resident_runtime(&source, &engine);
        block_on(runtime.ensure_ready()).unwrap();

        engine.kill(0);
        assert_eq!(runtime.phase(), Phase::Ready);
        assert!(block_on(runtime.execute(job(&[], &[]))).is_ok());
    }
}

// =============================================================================
// Runtime selection
// =============================================================================

#[test]
fn test_any_runtime_follows_config() {
    let source = FakeSource::toolchain();
    let engine = toy_compiler();
    let config = Rc::new(WorkerConfig::default().lifecycle(Lifecycle::Resident));
    let runtime = AnyRuntime::new(config, source.clone(), engine.clone(), Rc::new(FixedClock));
    assert!(matches!(runtime, AnyRuntime::Resident(_)));

    let runtime = AnyRuntime::new(
        Rc::new(WorkerConfig::default()),
        source,
        engine,
        Rc::new(FixedClock),
    );
    assert!(matches!(runtime, AnyRuntime::OneShot(_)));
    assert_eq!(runtime.phase(), Phase::Unloaded);
}
