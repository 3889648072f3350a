//! Resident module handshake
//!
//! A resident module announces itself by writing two well-known globals: a
//! readiness flag and a callable compile entry point. The platform layer
//! turns writes to those globals into calls on [`Handshake`], so readiness is
//! a one-shot notification rather than something to poll.

use crate::error::{BridgeError, BridgeResult};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

/// Payload handed to the resident entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentInput {
    /// Absolute path to content
    pub files: BTreeMap<String, String>,
    /// Command arguments, without the program name
    pub args: Vec<String>,
}

/// What the resident entry point returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentOutput {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    /// Path to content; `None` for deleted paths
    #[serde(default)]
    pub files: BTreeMap<String, Option<String>>,
}

/// The resident module's compile callable
pub type EntryPoint = Rc<dyn Fn(&ResidentInput) -> BridgeResult<ResidentOutput>>;

/// Readiness flag and entry-point slot for one resident instance
pub struct Handshake {
    ready: Cell<bool>,
    entry: RefCell<Option<EntryPoint>>,
    notify: RefCell<Option<oneshot::Sender<()>>>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl Handshake {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            ready: Cell::new(false),
            entry: RefCell::new(None),
            notify: RefCell::new(Some(tx)),
            signal: rx.shared(),
        }
    }

    /// Set the readiness flag. It is never cleared.
    pub fn mark_ready(&self) {
        self.ready.set(true);
        if let Some(tx) = self.notify.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    /// Store the entry point the module published
    pub fn set_entry(&self, entry: EntryPoint) {
        *self.entry.borrow_mut() = Some(entry);
    }

    /// The entry point, if the module is ready and has published one
    pub fn entry(&self) -> BridgeResult<EntryPoint> {
        if !self.is_ready() {
            return Err(BridgeError::Unavailable);
        }
        self.entry.borrow().clone().ok_or(BridgeError::Unavailable)
    }

    /// Resolves once [`mark_ready`](Self::mark_ready) has been called
    pub fn wait_ready(&self) -> impl Future<Output = ()> + Unpin + use<> {
        self.signal.clone().map(|_| ())
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn echo_entry() -> EntryPoint {
        Rc::new(|input: &ResidentInput| {
            Ok(ResidentOutput {
                exit_code: 0,
                stdout: input.args.join(" "),
                files: BTreeMap::new(),
            })
        })
    }

    #[test]
    fn test_entry_unavailable_until_ready() {
        let handshake = Handshake::new();
        handshake.set_entry(echo_entry());
        assert_eq!(handshake.entry().err(), Some(BridgeError::Unavailable));

        handshake.mark_ready();
        let entry = handshake.entry().unwrap();
        let input = ResidentInput {
            files: BTreeMap::new(),
            args: vec!["-p".into(), ".".into()],
        };
        assert_eq!(entry(&input).unwrap().stdout, "-p .");
    }

    #[test]
    fn test_ready_without_entry() {
        let handshake = Handshake::new();
        handshake.mark_ready();
        assert_eq!(handshake.entry().err(), Some(BridgeError::Unavailable));
    }

    #[test]
    fn test_wait_ready_after_signal() {
        let handshake = Handshake::new();
        let waiter = handshake.wait_ready();
        handshake.mark_ready();
        handshake.mark_ready();
        block_on(waiter);
        // Late waiters resolve immediately
        block_on(handshake.wait_ready());
    }

    #[test]
    fn test_output_wire_format() {
        let output: ResidentOutput = serde_json::from_str(
            r#"{"exitCode":1,"files":{"/app/dist/a.js":"x","/app/old.js":null}}"#,
        )
        .unwrap();
        assert_eq!(output.exit_code, 1);
        assert_eq!(output.stdout, "");
        assert_eq!(output.files["/app/old.js"], None);

        let input = ResidentInput {
            files: BTreeMap::from([("/app/a.ts".to_string(), "let a".to_string())]),
            args: vec![],
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["files"]["/app/a.ts"], "let a");
    }
}
