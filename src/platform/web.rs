//! Browser Worker Platform
//!
//! Provides the pieces of the bridge that need a real JS host:
//! - `fetch` for the toolchain artifact
//! - `WebAssembly` plus the Go host runtime (`Go`, from the runtime script
//!   loaded before this crate) as the [`Engine`]
//! - `globalThis.fs` and the resident handshake globals
//! - `postMessage` / `message` events as the RPC channel

use super::{Clock, PlatformError, PlatformResult};
use crate::bridge::CompileBridge;
use crate::config::WorkerConfig;
use crate::console_log;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{
    AnyRuntime, ArtifactSource, Engine, EntryPoint, Errno, ExitHook, FsError, FsResult, FsShim,
    Handshake, Launch, ResidentInput, ResidentOutput, Stats,
};
use crate::transport::{Channel, Frame, RpcError, RpcPeer};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use js_sys::{Array, Function, Object, Reflect, Uint8Array, WebAssembly};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{DedicatedWorkerGlobalScope, MessageEvent, RequestCache, RequestInit, WorkerGlobalScope};

#[wasm_bindgen]
extern "C" {
    /// The Go `js/wasm` host runtime
    #[wasm_bindgen(js_name = Go)]
    type GoRuntime;

    #[wasm_bindgen(constructor, js_class = "Go", catch)]
    fn new() -> Result<GoRuntime, JsValue>;

    #[wasm_bindgen(method, getter, js_name = importObject)]
    fn import_object(this: &GoRuntime) -> Object;

    #[wasm_bindgen(method, setter)]
    fn set_argv(this: &GoRuntime, argv: &Array);

    #[wasm_bindgen(method, setter)]
    fn set_exit(this: &GoRuntime, exit: &Function);

    #[wasm_bindgen(method, catch)]
    fn run(this: &GoRuntime, instance: &WebAssembly::Instance) -> Result<js_sys::Promise, JsValue>;
}

/// Best-effort message for a thrown JS value
fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn worker_scope() -> PlatformResult<WorkerGlobalScope> {
    js_sys::global()
        .dyn_into::<WorkerGlobalScope>()
        .map_err(|_| PlatformError::NotSupported("not running in a worker".to_string()))
}

// ============ Artifact fetch ============

/// Fetches the artifact over HTTP, bypassing the HTTP cache
pub struct FetchSource {
    url: String,
}

impl FetchSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ArtifactSource for FetchSource {
    fn location(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> LocalBoxFuture<'static, BridgeResult<Vec<u8>>> {
        let url = self.url.clone();
        async move {
            let scope = worker_scope().map_err(|e| BridgeError::load(e.to_string()))?;

            let init = RequestInit::new();
            init.set_method("GET");
            init.set_cache(RequestCache::NoStore);
            let request = web_sys::Request::new_with_str_and_init(&url, &init)
                .map_err(|e| BridgeError::load(format!("bad request for {}: {}", url, describe(&e))))?;

            let response: web_sys::Response = JsFuture::from(scope.fetch_with_request(&request))
                .await
                .map_err(|e| BridgeError::load(format!("fetching {}: {}", url, describe(&e))))?
                .dyn_into()
                .map_err(|_| BridgeError::load("fetch did not return a Response"))?;
            if !response.ok() {
                return Err(BridgeError::load(format!(
                    "HTTP {} fetching {}",
                    response.status(),
                    url
                )));
            }

            let body = response
                .array_buffer()
                .map_err(|e| BridgeError::load(describe(&e)))?;
            let buffer = JsFuture::from(body)
                .await
                .map_err(|e| BridgeError::load(format!("reading {}: {}", url, describe(&e))))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        }
        .boxed_local()
    }
}

// ============ fs object ============

type Args = [JsValue; 6];

/// The shim the `fs` object currently forwards to
type CurrentShim = Rc<RefCell<Option<Rc<FsShim>>>>;

thread_local! {
    /// Shared `isDirectory` method for stats objects
    static IS_DIRECTORY: Function = Function::new_no_args("return (this.mode & 61440) === 16384;");
}

fn fd_arg(value: &JsValue) -> i32 {
    value.as_f64().map(|n| n as i32).unwrap_or(-1)
}

fn uint_arg(value: &JsValue) -> u32 {
    value.as_f64().map(|n| n as u32).unwrap_or(0)
}

fn position_arg(value: &JsValue) -> Option<u64> {
    value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64)
}

fn path_arg(value: &JsValue) -> FsResult<String> {
    value
        .as_string()
        .ok_or_else(|| FsError::new(Errno::Einval, "path must be a string"))
}

fn buffer_arg(value: &JsValue) -> FsResult<Uint8Array> {
    value
        .dyn_ref::<Uint8Array>()
        .cloned()
        .ok_or_else(|| FsError::new(Errno::Einval, "buffer must be a Uint8Array"))
}

fn error_object(err: &FsError) -> JsValue {
    let error = js_sys::Error::new(&err.message);
    let _ = Reflect::set(&error, &JsValue::from_str("code"), &JsValue::from_str(err.code.code()));
    error.into()
}

fn stats_object(stats: &Stats) -> FsResult<JsValue> {
    let object = Object::new();
    let fields = [
        ("dev", stats.dev as f64),
        ("ino", stats.ino as f64),
        ("mode", stats.mode as f64),
        ("nlink", stats.nlink as f64),
        ("uid", stats.uid as f64),
        ("gid", stats.gid as f64),
        ("rdev", stats.rdev as f64),
        ("size", stats.size as f64),
        ("blksize", stats.blksize as f64),
        ("blocks", stats.blocks as f64),
        ("atimeMs", stats.atime_ms),
        ("mtimeMs", stats.mtime_ms),
        ("ctimeMs", stats.ctime_ms),
    ];
    let set = |key: &str, value: &JsValue| {
        Reflect::set(&object, &JsValue::from_str(key), value)
            .map(|_| ())
            .map_err(|e| FsError::new(Errno::Eio, describe(&e)))
    };
    for (key, value) in fields {
        set(key, &JsValue::from_f64(value))?;
    }
    IS_DIRECTORY.with(|method| set("isDirectory", method.as_ref()))?;
    Ok(object.into())
}

fn constants_object(shim: &FsShim) -> Result<Object, JsValue> {
    let object = Object::new();
    for (name, value) in shim.constants().entries() {
        Reflect::set(&object, &JsValue::from_str(name), &JsValue::from(value))?;
    }
    Ok(object)
}

/// Register one fs method
///
/// With `callback` set, the method follows Node's convention: the result is
/// delivered to the function found at that argument index before the method
/// returns. Go's `fsCall` blocks on that callback, and inside a `FuncOf`
/// handler there is no later turn to deliver it on. Without `callback`, the
/// method returns its result or throws.
fn define<F>(target: &Object, current: &CurrentShim, name: &str, callback: Option<usize>, op: F) -> Result<(), JsValue>
where
    F: Fn(&FsShim, &Args) -> FsResult<JsValue> + 'static,
{
    let current = current.clone();
    let method_name = name.to_string();
    let closure = Closure::wrap(Box::new(
        move |a: JsValue, b: JsValue, c: JsValue, d: JsValue, e: JsValue, f: JsValue| -> Result<JsValue, JsValue> {
            let args = [a, b, c, d, e, f];
            let shim = current.borrow().clone();
            let result = match shim {
                Some(shim) => op(&shim, &args),
                None => Err(FsError::new(Errno::Enosys, "no filesystem installed")),
            };

            let Some(at) = callback else {
                return result.map_err(|err| error_object(&err));
            };
            let callback: Function = args[at]
                .clone()
                .dyn_into()
                .map_err(|_| JsValue::from_str(&format!("fs.{}: callback is not a function", method_name)))?;
            let outcome = match result {
                Ok(value) => callback.call2(&JsValue::NULL, &JsValue::NULL, &value),
                Err(err) => callback.call1(&JsValue::NULL, &error_object(&err)),
            };
            if let Err(e) = outcome {
                console_log!("[fs] {} callback threw: {}", method_name, describe(&e));
            }
            Ok(JsValue::UNDEFINED)
        },
    )
        as Box<dyn Fn(JsValue, JsValue, JsValue, JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>);

    Reflect::set(target, &JsValue::from_str(name), closure.as_ref())?;
    closure.forget();
    Ok(())
}

fn done() -> JsValue {
    JsValue::UNDEFINED
}

fn count(n: usize) -> JsValue {
    JsValue::from_f64(n as f64)
}

/// Build the Node-style `fs` object over whatever shim is current
fn fs_object(current: &CurrentShim) -> Result<Object, JsValue> {
    let fs = Object::new();

    define(&fs, current, "writeSync", None, |shim, a| {
        let data = buffer_arg(&a[1])?.to_vec();
        Ok(count(shim.write_sync(fd_arg(&a[0]), &data)?))
    })?;
    define(&fs, current, "write", Some(5), |shim, a| {
        let buffer = buffer_arg(&a[1])?;
        let offset = uint_arg(&a[2]);
        let length = uint_arg(&a[3]);
        let data = buffer.subarray(offset, offset.saturating_add(length)).to_vec();
        Ok(count(shim.write(fd_arg(&a[0]), &data, position_arg(&a[4]))?))
    })?;
    define(&fs, current, "open", Some(3), |shim, a| {
        let fd = shim.open(&path_arg(&a[0])?, fd_arg(&a[1]), uint_arg(&a[2]))?;
        Ok(JsValue::from(fd))
    })?;
    define(&fs, current, "read", Some(5), |shim, a| {
        let buffer = buffer_arg(&a[1])?;
        let offset = uint_arg(&a[2]).min(buffer.length());
        // Never read more than fits after `offset`; the rest stays unread
        let length = uint_arg(&a[3]).min(buffer.length() - offset);
        let mut data = vec![0u8; length as usize];
        let n = shim.read(fd_arg(&a[0]), &mut data, position_arg(&a[4]))?;
        buffer.subarray(offset, offset + n as u32).copy_from(&data[..n]);
        Ok(count(n))
    })?;
    define(&fs, current, "close", Some(1), |shim, a| {
        shim.close(fd_arg(&a[0]))?;
        Ok(done())
    })?;
    define(&fs, current, "fstat", Some(1), |shim, a| {
        stats_object(&shim.fstat(fd_arg(&a[0]))?)
    })?;
    define(&fs, current, "stat", Some(1), |shim, a| {
        stats_object(&shim.stat(&path_arg(&a[0])?)?)
    })?;
    define(&fs, current, "lstat", Some(1), |shim, a| {
        stats_object(&shim.lstat(&path_arg(&a[0])?)?)
    })?;
    define(&fs, current, "mkdir", Some(2), |shim, a| {
        shim.mkdir(&path_arg(&a[0])?, uint_arg(&a[1]))?;
        Ok(done())
    })?;
    define(&fs, current, "readdir", Some(1), |shim, a| {
        let names: Array = shim
            .readdir(&path_arg(&a[0])?)?
            .iter()
            .map(|name| JsValue::from_str(name))
            .collect();
        Ok(names.into())
    })?;
    define(&fs, current, "unlink", Some(1), |shim, a| {
        shim.unlink(&path_arg(&a[0])?)?;
        Ok(done())
    })?;
    define(&fs, current, "rmdir", Some(1), |shim, a| {
        shim.rmdir(&path_arg(&a[0])?)?;
        Ok(done())
    })?;
    define(&fs, current, "rename", Some(2), |shim, a| {
        shim.rename(&path_arg(&a[0])?, &path_arg(&a[1])?)?;
        Ok(done())
    })?;
    define(&fs, current, "chmod", Some(2), |shim, a| {
        shim.chmod(&path_arg(&a[0])?, uint_arg(&a[1]))?;
        Ok(done())
    })?;
    define(&fs, current, "fchmod", Some(2), |shim, a| {
        shim.fchmod(fd_arg(&a[0]), uint_arg(&a[1]))?;
        Ok(done())
    })?;
    define(&fs, current, "chown", Some(3), |shim, a| {
        shim.chown(&path_arg(&a[0])?, uint_arg(&a[1]), uint_arg(&a[2]))?;
        Ok(done())
    })?;
    define(&fs, current, "fchown", Some(3), |shim, a| {
        shim.fchown(fd_arg(&a[0]), uint_arg(&a[1]), uint_arg(&a[2]))?;
        Ok(done())
    })?;
    define(&fs, current, "lchown", Some(3), |shim, a| {
        shim.lchown(&path_arg(&a[0])?, uint_arg(&a[1]), uint_arg(&a[2]))?;
        Ok(done())
    })?;
    define(&fs, current, "utimes", Some(3), |shim, a| {
        let atime = a[1].as_f64().unwrap_or(0.0);
        let mtime = a[2].as_f64().unwrap_or(0.0);
        shim.utimes(&path_arg(&a[0])?, atime, mtime)?;
        Ok(done())
    })?;
    define(&fs, current, "fsync", Some(1), |shim, a| {
        shim.fsync(fd_arg(&a[0]))?;
        Ok(done())
    })?;
    define(&fs, current, "ftruncate", Some(2), |shim, a| {
        shim.ftruncate(fd_arg(&a[0]), position_arg(&a[1]).unwrap_or(0))?;
        Ok(done())
    })?;
    define(&fs, current, "truncate", Some(2), |shim, a| {
        shim.truncate(&path_arg(&a[0])?, position_arg(&a[1]).unwrap_or(0))?;
        Ok(done())
    })?;
    define(&fs, current, "link", Some(2), |shim, a| {
        shim.link(&path_arg(&a[0])?, &path_arg(&a[1])?)?;
        Ok(done())
    })?;
    define(&fs, current, "symlink", Some(2), |shim, a| {
        shim.symlink(&path_arg(&a[0])?, &path_arg(&a[1])?)?;
        Ok(done())
    })?;
    define(&fs, current, "readlink", Some(1), |shim, a| {
        Ok(JsValue::from_str(&shim.readlink(&path_arg(&a[0])?)?))
    })?;

    Ok(fs)
}

// ============ Handshake globals ============

fn define_accessor(
    name: &str,
    get: Closure<dyn Fn() -> JsValue>,
    set: Closure<dyn Fn(JsValue)>,
) -> Result<(), JsValue> {
    let descriptor = Object::new();
    Reflect::set(&descriptor, &JsValue::from_str("get"), get.as_ref())?;
    Reflect::set(&descriptor, &JsValue::from_str("set"), set.as_ref())?;
    Reflect::set(&descriptor, &JsValue::from_str("configurable"), &JsValue::TRUE)?;
    Object::define_property(&js_sys::global(), &JsValue::from_str(name), &descriptor);
    get.forget();
    set.forget();
    Ok(())
}

/// Wrap the module's JS entry point. Payloads cross as JSON.
fn entry_from_js(function: Function) -> EntryPoint {
    Rc::new(move |input: &ResidentInput| -> BridgeResult<ResidentOutput> {
        let json = serde_json::to_string(input).map_err(|e| BridgeError::protocol(e.to_string()))?;
        let argument = js_sys::JSON::parse(&json).map_err(|e| BridgeError::protocol(describe(&e)))?;
        let value = function
            .call1(&JsValue::NULL, &argument)
            .map_err(|e| BridgeError::protocol(format!("entry point threw: {}", describe(&e))))?;
        if value.is_undefined() || value.is_null() {
            return Err(BridgeError::protocol("entry point returned nothing"));
        }
        let json: String = js_sys::JSON::stringify(&value)
            .map_err(|e| BridgeError::protocol(describe(&e)))?
            .into();
        serde_json::from_str(&json).map_err(|e| BridgeError::protocol(e.to_string()))
    })
}

// ============ Engine ============

/// An instantiated module and the runtime that will drive it
pub struct GoInstance {
    go: GoRuntime,
    instance: WebAssembly::Instance,
    exit: ExitHook,
    on_exit: Closure<dyn FnMut(JsValue)>,
}

/// Runs the module under the Go host runtime
pub struct JsEngine {
    ready_flag: String,
    entry_point: String,
    current: CurrentShim,
    fs: RefCell<Option<Object>>,
}

impl JsEngine {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            ready_flag: config.ready_flag.clone(),
            entry_point: config.entry_point.clone(),
            current: Rc::new(RefCell::new(None)),
            fs: RefCell::new(None),
        }
    }

    fn publish_fs(&self, shim: &FsShim) -> Result<(), JsValue> {
        let mut slot = self.fs.borrow_mut();
        let fs = match slot.as_ref() {
            Some(fs) => fs.clone(),
            None => {
                let fs = fs_object(&self.current)?;
                *slot = Some(fs.clone());
                fs
            }
        };
        Reflect::set(&fs, &JsValue::from_str("constants"), &constants_object(shim)?)?;
        Reflect::set(&js_sys::global(), &JsValue::from_str("fs"), &fs)?;
        Ok(())
    }

    fn publish_handshake(&self, handshake: Rc<Handshake>) -> Result<(), JsValue> {
        let flag = handshake.clone();
        let get_ready = Closure::wrap(Box::new(move || JsValue::from_bool(flag.is_ready())) as Box<dyn Fn() -> JsValue>);
        let flag = handshake.clone();
        let set_ready = Closure::wrap(Box::new(move |value: JsValue| {
            if value.is_truthy() {
                flag.mark_ready();
            }
        }) as Box<dyn Fn(JsValue)>);
        define_accessor(&self.ready_flag, get_ready, set_ready)?;

        let slot = Rc::new(RefCell::new(JsValue::UNDEFINED));
        let published = slot.clone();
        let get_entry = Closure::wrap(Box::new(move || published.borrow().clone()) as Box<dyn Fn() -> JsValue>);
        let set_entry = Closure::wrap(Box::new(move |value: JsValue| {
            match value.dyn_ref::<Function>() {
                Some(function) => handshake.set_entry(entry_from_js(function.clone())),
                None => console_log!("[runtime] Ignoring non-function entry point"),
            }
            *slot.borrow_mut() = value;
        }) as Box<dyn Fn(JsValue)>);
        define_accessor(&self.entry_point, get_entry, set_entry)
    }
}

impl Engine for JsEngine {
    type Module = WebAssembly::Module;
    type Instance = GoInstance;

    fn compile(&self, bytes: Vec<u8>) -> LocalBoxFuture<'static, BridgeResult<Self::Module>> {
        async move {
            let array = Uint8Array::from(bytes.as_slice());
            let module = JsFuture::from(WebAssembly::compile(&array))
                .await
                .map_err(|e| BridgeError::load(format!("compile failed: {}", describe(&e))))?;
            module
                .dyn_into::<WebAssembly::Module>()
                .map_err(|_| BridgeError::load("compile did not produce a module"))
        }
        .boxed_local()
    }

    fn install_fs(&self, shim: Rc<FsShim>) -> BridgeResult<()> {
        self.publish_fs(&shim)
            .map_err(|e| BridgeError::boot(format!("installing fs: {}", describe(&e))))?;
        *self.current.borrow_mut() = Some(shim);
        Ok(())
    }

    fn install_handshake(&self, handshake: Rc<Handshake>) -> BridgeResult<()> {
        self.publish_handshake(handshake)
            .map_err(|e| BridgeError::boot(format!("installing handshake: {}", describe(&e))))
    }

    fn instantiate(
        &self,
        module: &Self::Module,
        launch: Launch,
    ) -> LocalBoxFuture<'static, BridgeResult<Self::Instance>> {
        let module = module.clone();
        async move {
            let go = GoRuntime::new()
                .map_err(|e| BridgeError::boot(format!("host runtime unavailable: {}", describe(&e))))?;
            let argv: Array = launch.argv.iter().map(|arg| JsValue::from_str(arg)).collect();
            go.set_argv(&argv);

            let hook = launch.exit.clone();
            let on_exit = Closure::wrap(Box::new(move |code: JsValue| {
                hook.exit(code.as_f64().map(|n| n as i32).unwrap_or(1));
            }) as Box<dyn FnMut(JsValue)>);
            go.set_exit(on_exit.as_ref().unchecked_ref());

            let instance = JsFuture::from(WebAssembly::instantiate_module(&module, &go.import_object()))
                .await
                .map_err(|e| BridgeError::boot(format!("instantiate failed: {}", describe(&e))))?
                .dyn_into::<WebAssembly::Instance>()
                .map_err(|_| BridgeError::boot("instantiate did not produce an instance"))?;

            Ok(GoInstance {
                go,
                instance,
                exit: launch.exit,
                on_exit,
            })
        }
        .boxed_local()
    }

    fn start(&self, launched: Self::Instance) -> BridgeResult<()> {
        let GoInstance {
            go,
            instance,
            exit,
            on_exit,
        } = launched;
        let run = go
            .run(&instance)
            .map_err(|e| BridgeError::boot(format!("run failed: {}", describe(&e))))?;

        // The runtime resolves `run` only after calling its exit hook, so the
        // hook closure must outlive the promise.
        spawn_local(async move {
            if let Err(e) = JsFuture::from(run).await {
                console_log!("[runtime] Module trapped: {}", describe(&e));
                exit.exit(1);
            }
            drop(on_exit);
            drop(go);
        });
        Ok(())
    }
}

// ============ Clock ============

/// `performance.now()` for durations, `Date.now()` for file times
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            performance: worker_scope().ok().and_then(|scope| scope.performance()),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        self.performance
            .as_ref()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn wall_time_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

// ============ Channel ============

/// Posts frames to the page that owns this worker
pub struct WorkerChannel {
    scope: DedicatedWorkerGlobalScope,
}

impl Channel for WorkerChannel {
    fn post(&self, frame: &Frame) -> Result<(), RpcError> {
        let message = js_sys::JSON::parse(&frame.to_json()?)
            .map_err(|e| RpcError::Malformed(describe(&e)))?;
        self.scope
            .post_message(&message)
            .map_err(|e| RpcError::Channel(describe(&e)))
    }
}

fn frame_from_event(event: &MessageEvent) -> Result<Frame, RpcError> {
    let json: String = js_sys::JSON::stringify(&event.data())
        .map_err(|e| RpcError::Malformed(describe(&e)))?
        .into();
    Frame::from_json(&json)
}

// ============ Entry ============

/// Wire the bridge to this worker's message channel
pub fn start(config: WorkerConfig) -> PlatformResult<()> {
    let scope: DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .map_err(|_| PlatformError::NotSupported("not running in a dedicated worker".to_string()))?;

    let config = Rc::new(config);
    let engine = Rc::new(JsEngine::new(&config));
    let source: Rc<dyn ArtifactSource> = Rc::new(FetchSource::new(config.artifact_url.clone()));
    let clock: Rc<dyn Clock> = Rc::new(PerformanceClock::new());

    let runtime = AnyRuntime::new(config.clone(), source, engine, clock.clone());
    let bridge = Rc::new(CompileBridge::new(runtime, config.clone(), clock));
    let peer = RpcPeer::new(
        bridge,
        WorkerChannel {
            scope: scope.clone(),
        },
    );

    let on_message = Closure::wrap(Box::new(move |event: MessageEvent| match frame_from_event(&event) {
        Ok(frame) => {
            if let Some(task) = peer.receive(frame) {
                spawn_local(task);
            }
        }
        Err(e) => console_log!("[rpc] Dropping message: {}", e),
    }) as Box<dyn FnMut(MessageEvent)>);
    scope
        .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
        .map_err(|e| PlatformError::InitFailed(describe(&e)))?;
    on_message.forget();

    console_log!("[worker] Ready for requests ({:?} lifecycle)", config.lifecycle);
    Ok(())
}
