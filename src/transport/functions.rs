//! The worker's exposed functions
//!
//! Exactly two methods cross the channel:
//!
//! ```text
//! init()                  -> null
//! compile(command, files) -> CompileResult
//! ```

use super::{ErrorBody, RpcError, RpcHandler};
use crate::bridge::{CompileBridge, FileMap};
use crate::error::BridgeError;
use crate::host::CompileRuntime;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::rc::Rc;

impl From<BridgeError> for RpcError {
    fn from(err: BridgeError) -> Self {
        RpcError::Remote(ErrorBody {
            name: err.name().to_string(),
            message: err.to_string(),
        })
    }
}

/// Decode `compile`'s positional arguments
fn compile_args(args: Vec<Value>) -> Result<(String, FileMap), RpcError> {
    let mut args = args.into_iter();
    let command = match args.next() {
        Some(Value::String(command)) => command,
        Some(other) => {
            return Err(RpcError::InvalidArguments(format!(
                "command must be a string, got {}",
                other
            )));
        }
        None => return Err(RpcError::InvalidArguments("missing command".to_string())),
    };
    let files = match args.next() {
        Some(Value::Null) | None => FileMap::new(),
        Some(files) => serde_json::from_value(files)
            .map_err(|e| RpcError::InvalidArguments(format!("files: {}", e)))?,
    };
    Ok((command, files))
}

impl<R: CompileRuntime + 'static> RpcHandler for CompileBridge<R> {
    fn call(
        self: Rc<Self>,
        method: &str,
        args: Vec<Value>,
    ) -> LocalBoxFuture<'static, Result<Value, RpcError>> {
        match method {
            "init" => async move {
                self.init().await?;
                Ok::<_, RpcError>(Value::Null)
            }
            .boxed_local(),
            "compile" => async move {
                let (command, files) = compile_args(args)?;
                let result = self.compile(&command, files).await?;
                serde_json::to_value(&result).map_err(|e| RpcError::Malformed(e.to_string()))
            }
            .boxed_local(),
            other => futures::future::ready(Err(RpcError::UnknownMethod(other.to_string())))
                .boxed_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_args() {
        let (command, files) =
            compile_args(vec![json!("-p ."), json!({"index.ts": "let a = 1"})]).unwrap();
        assert_eq!(command, "-p .");
        assert_eq!(files["index.ts"], "let a = 1");

        let (_, files) = compile_args(vec![json!("")]).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_compile_args_rejects_bad_shapes() {
        assert!(matches!(
            compile_args(vec![]),
            Err(RpcError::InvalidArguments(_))
        ));
        assert!(matches!(
            compile_args(vec![json!(42)]),
            Err(RpcError::InvalidArguments(_))
        ));
        assert!(matches!(
            compile_args(vec![json!("-p ."), json!({"a.ts": 1})]),
            Err(RpcError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_bridge_errors_keep_their_class() {
        let err: RpcError = BridgeError::load("HTTP 404").into();
        let body = err.to_body();
        assert_eq!(body.name, "LoadError");
        assert_eq!(body.message, "failed to load module: HTTP 404");
    }
}
