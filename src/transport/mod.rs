//! Message transport
//!
//! A small duplex RPC over a message channel. Frames are plain JSON objects
//! so they survive structured clone unchanged:
//!
//! ```text
//! request   {"t":"q", "i":"<id>", "m":"<method>", "a":[...args]}
//! response  {"t":"s", "i":"<id>", "r":<result>}
//!           {"t":"s", "i":"<id>", "e":{"name":"...", "message":"..."}}
//! ```
//!
//! Either side may call the other; each peer keeps a table of its own
//! outstanding calls keyed by id.

pub mod functions;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Error payload carried in a response frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
}

/// One message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Frame {
    #[serde(rename = "q")]
    Request {
        i: String,
        m: String,
        #[serde(default)]
        a: Vec<Value>,
    },
    #[serde(rename = "s")]
    Response {
        i: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        r: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        e: Option<ErrorBody>,
    },
}

impl Frame {
    pub fn from_json(json: &str) -> Result<Self, RpcError> {
        serde_json::from_str(json).map_err(|e| RpcError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, RpcError> {
        serde_json::to_string(self).map_err(|e| RpcError::Malformed(e.to_string()))
    }
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No such method on the receiving side
    UnknownMethod(String),
    /// Arguments did not match the method's signature
    InvalidArguments(String),
    /// A frame could not be encoded or decoded
    Malformed(String),
    /// The channel refused a frame
    Channel(String),
    /// The peer answered with an error
    Remote(ErrorBody),
    /// The call was dropped before an answer arrived
    Closed,
}

impl RpcError {
    /// Error payload for a response frame
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::Remote(body) => body.clone(),
            Self::UnknownMethod(_) | Self::InvalidArguments(_) => ErrorBody {
                name: "TypeError".to_string(),
                message: self.to_string(),
            },
            _ => ErrorBody {
                name: "Error".to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod(m) => write!(f, "function \"{}\" not found", m),
            Self::InvalidArguments(s) => write!(f, "invalid arguments: {}", s),
            Self::Malformed(s) => write!(f, "malformed frame: {}", s),
            Self::Channel(s) => write!(f, "channel error: {}", s),
            Self::Remote(body) => write!(f, "{}: {}", body.name, body.message),
            Self::Closed => write!(f, "call closed before a response arrived"),
        }
    }
}

impl std::error::Error for RpcError {}

/// Outbound side of a message channel
pub trait Channel {
    fn post(&self, frame: &Frame) -> Result<(), RpcError>;
}

/// Methods a peer exposes
pub trait RpcHandler {
    fn call(
        self: Rc<Self>,
        method: &str,
        args: Vec<Value>,
    ) -> LocalBoxFuture<'static, Result<Value, RpcError>>;
}

type Reply = oneshot::Sender<Result<Value, RpcError>>;

/// One end of the duplex RPC
pub struct RpcPeer<H, C> {
    handler: Rc<H>,
    channel: C,
    next_id: Cell<u64>,
    pending: RefCell<HashMap<String, Reply>>,
}

impl<H: RpcHandler + 'static, C: Channel + 'static> RpcPeer<H, C> {
    pub fn new(handler: Rc<H>, channel: C) -> Rc<Self> {
        Rc::new(Self {
            handler,
            channel,
            next_id: Cell::new(0),
            pending: RefCell::new(HashMap::new()),
        })
    }

    /// Calls awaiting an answer
    pub fn pending_calls(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Handle one inbound frame
    ///
    /// Responses settle the matching call immediately. Requests produce a
    /// task that runs the method and posts the reply; the caller spawns it.
    pub fn receive(self: &Rc<Self>, frame: Frame) -> Option<LocalBoxFuture<'static, ()>> {
        match frame {
            Frame::Request { i, m, a } => {
                let peer = self.clone();
                let call = self.handler.clone().call(&m, a);
                Some(
                    async move {
                        let reply = match call.await {
                            Ok(value) => Frame::Response {
                                i,
                                r: Some(value),
                                e: None,
                            },
                            Err(err) => {
                                crate::console_log!("[rpc] {} failed: {}", m, err);
                                Frame::Response {
                                    i,
                                    r: None,
                                    e: Some(err.to_body()),
                                }
                            }
                        };
                        if let Err(e) = peer.channel.post(&reply) {
                            crate::console_log!("[rpc] could not post reply: {}", e);
                        }
                    }
                    .boxed_local(),
                )
            }
            Frame::Response { i, r, e } => {
                let reply = self.pending.borrow_mut().remove(&i);
                match reply {
                    Some(reply) => {
                        let result = match e {
                            Some(body) => Err(RpcError::Remote(body)),
                            None => Ok(r.unwrap_or(Value::Null)),
                        };
                        let _ = reply.send(result);
                    }
                    None => crate::console_log!("[rpc] response for unknown call {}", i),
                }
                None
            }
        }
    }

    /// Call a method on the other side
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, RpcError>> + use<H, C> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let id = format!("w{}", id);

        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(id.clone(), tx);
        let frame = Frame::Request {
            i: id.clone(),
            m: method.to_string(),
            a: args,
        };
        let posted = self.channel.post(&frame);
        if posted.is_err() {
            self.pending.borrow_mut().remove(&id);
        }

        async move {
            posted?;
            rx.await.unwrap_or(Err(RpcError::Closed))
        }
    }
}
