//! Module loader
//!
//! Fetches the toolchain artifact, checks it is a WebAssembly module with
//! the exports the host runtime needs, and compiles it once. Concurrent
//! callers share the in-flight attempt; a failed attempt is forgotten so a
//! later call starts over.

use super::engine::Engine;
use crate::console_log;
use crate::error::{BridgeError, BridgeResult};
use futures::FutureExt;
use futures::future::{self, Either, LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// WASM magic number: \0asm
const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// WASM version 1
const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Export section id
const EXPORT_SECTION: u8 = 7;

/// Where module bytes come from
pub trait ArtifactSource {
    /// Human-readable location, for logs
    fn location(&self) -> &str;

    /// Fetch the artifact. Non-success responses are load errors.
    fn fetch(&self) -> LocalBoxFuture<'static, BridgeResult<Vec<u8>>>;
}

/// Checks raw bytes before they are handed to the engine
pub struct ModuleValidator;

impl ModuleValidator {
    /// Validate a WASM module binary
    ///
    /// Checks:
    /// - Valid WASM magic number and version
    /// - Every name in `required` is exported
    pub fn validate(bytes: &[u8], required: &[String]) -> BridgeResult<()> {
        if bytes.len() < 8 {
            return Err(BridgeError::load("module too small"));
        }
        if bytes[0..4] != WASM_MAGIC {
            return Err(BridgeError::load("invalid magic number"));
        }
        if bytes[4..8] != WASM_VERSION {
            return Err(BridgeError::load("unsupported WASM version"));
        }

        let exported = export_names(bytes)?;
        match required.iter().find(|name| !exported.contains(name)) {
            Some(name) => Err(BridgeError::load(format!(
                "module does not export \"{}\"",
                name
            ))),
            None => Ok(()),
        }
    }
}

/// Names from every export section
fn export_names(bytes: &[u8]) -> BridgeResult<Vec<String>> {
    let mut names = Vec::new();
    let mut offset = 8;
    while offset < bytes.len() {
        let section_id = bytes[offset];
        offset += 1;

        let (size, size_bytes) = read_leb128(&bytes[offset..])?;
        offset += size_bytes;

        let section_end = offset
            .checked_add(size as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| BridgeError::load("section extends past end of module"))?;

        if section_id == EXPORT_SECTION {
            names.extend(parse_export_section(&bytes[offset..section_end])?);
        }

        offset = section_end;
    }
    Ok(names)
}

/// Read an unsigned LEB128 value
fn read_leb128(bytes: &[u8]) -> BridgeResult<(u32, usize)> {
    let mut result = 0u32;
    let mut shift = 0;
    let mut bytes_read = 0;

    for &byte in bytes.iter().take(5) {
        bytes_read += 1;
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, bytes_read));
        }
        shift += 7;
    }

    Err(BridgeError::load("invalid LEB128"))
}

/// Export names in one export section
fn parse_export_section(data: &[u8]) -> BridgeResult<Vec<String>> {
    let mut names = Vec::new();
    if data.is_empty() {
        return Ok(names);
    }

    let (count, count_bytes) = read_leb128(data)?;
    let mut offset = count_bytes;

    for _ in 0..count {
        let (name_len, len_bytes) = read_leb128(&data[offset..])?;
        offset += len_bytes;

        let name_end = offset
            .checked_add(name_len as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| BridgeError::load("export name extends past section"))?;
        names.push(String::from_utf8_lossy(&data[offset..name_end]).into_owned());
        offset = name_end;

        // Kind byte, then the index
        if offset >= data.len() {
            return Err(BridgeError::load("unexpected end of export section"));
        }
        offset += 1;
        let (_, index_bytes) = read_leb128(&data[offset..])?;
        offset += index_bytes;
    }

    Ok(names)
}

type LoadFuture<M> = Shared<LocalBoxFuture<'static, BridgeResult<M>>>;

enum LoadState<M> {
    Idle,
    Loading(LoadFuture<M>),
    Loaded(M),
}

/// Loads and compiles the artifact at most once per successful attempt
pub struct ModuleLoader<E: Engine> {
    source: Rc<dyn ArtifactSource>,
    engine: Rc<E>,
    required_exports: Rc<[String]>,
    state: Rc<RefCell<LoadState<E::Module>>>,
}

impl<E: Engine + 'static> ModuleLoader<E> {
    pub fn new(source: Rc<dyn ArtifactSource>, engine: Rc<E>, required_exports: Vec<String>) -> Self {
        Self {
            source,
            engine,
            required_exports: required_exports.into(),
            state: Rc::new(RefCell::new(LoadState::Idle)),
        }
    }

    /// The compiled module, loading it if needed
    ///
    /// The returned future does not borrow the loader, so it can be folded
    /// into longer-lived boot futures.
    pub fn ensure_loaded(&self) -> impl Future<Output = BridgeResult<E::Module>> + use<E> {
        let mut state = self.state.borrow_mut();
        let pending = match &*state {
            LoadState::Loaded(module) => return Either::Left(future::ready(Ok(module.clone()))),
            LoadState::Loading(pending) => pending.clone(),
            LoadState::Idle => {
                let pending = self.load().boxed_local().shared();
                *state = LoadState::Loading(pending.clone());
                pending
            }
        };
        Either::Right(pending)
    }

    fn load(&self) -> impl Future<Output = BridgeResult<E::Module>> + use<E> {
        let source = self.source.clone();
        let engine = self.engine.clone();
        let required = self.required_exports.clone();
        let state = self.state.clone();
        async move {
            console_log!("[loader] Loading {}", source.location());
            let result: BridgeResult<E::Module> = async {
                let bytes = source.fetch().await?;
                console_log!(
                    "[loader] Loaded WASM: {:.1}MB",
                    bytes.len() as f64 / (1024.0 * 1024.0)
                );
                ModuleValidator::validate(&bytes, &required)?;
                engine.compile(bytes).await
            }
            .await;

            *state.borrow_mut() = match &result {
                Ok(module) => LoadState::Loaded(module.clone()),
                Err(e) => {
                    console_log!("[loader] {}", e);
                    LoadState::Idle
                }
            };
            result
        }
    }
}
