//! Tool catalogue and dispatch onto the upstream invoker.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::{RpcError, RpcInvoker};
use crate::protocol::format::format_result;
use crate::protocol::validate::{validate_address, validate_block, validate_method_name, validate_tx_hash};

/// Tool metadata advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Errors raised by tool dispatch.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Executes tools by name.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Run `name` with `arguments`, returning the formatted result.
    async fn call(&self, name: &str, arguments: Value) -> Result<String, ToolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    BlockNumber,
    GasPrice,
    Balance,
    TransactionReceipt,
    CallRpc,
}

impl Tool {
    const ALL: [Tool; 5] = [
        Tool::BlockNumber,
        Tool::GasPrice,
        Tool::Balance,
        Tool::TransactionReceipt,
        Tool::CallRpc,
    ];

    fn name(self) -> &'static str {
        match self {
            Tool::BlockNumber => "get_block_number",
            Tool::GasPrice => "get_gas_price",
            Tool::Balance => "get_balance",
            Tool::TransactionReceipt => "get_transaction_receipt",
            Tool::CallRpc => "call_rpc",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn descriptor(self) -> ToolDescriptor {
        let network = json!({
            "type": "string",
            "description": "Target network, e.g. eth-mainnet. Defaults to the configured network."
        });
        let (description, properties, required): (&'static str, Value, Vec<&str>) = match self {
            Tool::BlockNumber => (
                "Get the latest block number.",
                json!({ "network": network }),
                vec![],
            ),
            Tool::GasPrice => (
                "Get the current gas price in wei and gwei.",
                json!({ "network": network }),
                vec![],
            ),
            Tool::Balance => (
                "Get the native token balance of an address.",
                json!({
                    "address": { "type": "string", "description": "0x-prefixed address" },
                    "block": { "type": "string", "description": "Block tag or hex number, default latest" },
                    "network": network,
                }),
                vec!["address"],
            ),
            Tool::TransactionReceipt => (
                "Get the receipt of a transaction by hash.",
                json!({
                    "hash": { "type": "string", "description": "0x-prefixed transaction hash" },
                    "network": network,
                }),
                vec!["hash"],
            ),
            Tool::CallRpc => (
                "Call any read-only JSON-RPC method on the provider.",
                json!({
                    "method": { "type": "string", "description": "Method name, e.g. eth_getBlockByNumber" },
                    "params": { "type": "array", "description": "Positional parameters" },
                    "network": network,
                }),
                vec!["method"],
            ),
        };

        ToolDescriptor {
            name: self.name(),
            description,
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Upstream method and positional params for validated arguments.
    fn request(self, args: &Map<String, Value>) -> Result<(String, Vec<Value>), ToolError> {
        match self {
            Tool::BlockNumber => Ok(("eth_blockNumber".to_string(), vec![])),
            Tool::GasPrice => Ok(("eth_gasPrice".to_string(), vec![])),
            Tool::Balance => {
                let address = required_str(args, "address")?;
                validate_address(address).map_err(ToolError::Validation)?;
                let block = optional_str(args, "block")?.unwrap_or("latest");
                validate_block(block).map_err(ToolError::Validation)?;
                Ok(("eth_getBalance".to_string(), vec![json!(address), json!(block)]))
            }
            Tool::TransactionReceipt => {
                let hash = required_str(args, "hash")?;
                validate_tx_hash(hash).map_err(ToolError::Validation)?;
                Ok(("eth_getTransactionReceipt".to_string(), vec![json!(hash)]))
            }
            Tool::CallRpc => {
                let method = required_str(args, "method")?;
                validate_method_name(method).map_err(ToolError::Validation)?;
                let params = match args.get("params") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items.clone(),
                    Some(_) => {
                        return Err(ToolError::Validation("'params' must be an array".to_string()))
                    }
                };
                Ok((method.to_string(), params))
            }
        }
    }
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ToolError::Validation(format!("'{key}' must be a string"))),
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    optional_str(args, key)?.ok_or_else(|| ToolError::Validation(format!("'{key}' is required")))
}

/// Tools backed by the upstream provider.
#[derive(Debug)]
pub struct RelayTools {
    invoker: Arc<RpcInvoker>,
    max_response_chars: usize,
}

impl RelayTools {
    pub fn new(invoker: Arc<RpcInvoker>, max_response_chars: usize) -> Self {
        Self {
            invoker,
            max_response_chars,
        }
    }
}

#[async_trait]
impl ToolDispatcher for RelayTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        Tool::ALL.into_iter().map(Tool::descriptor).collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let tool = Tool::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ToolError::Validation("arguments must be an object".to_string())),
        };

        let (method, params) = tool.request(&args)?;
        let target = optional_str(&args, "network")?
            .unwrap_or_else(|| self.invoker.default_target())
            .to_string();

        tracing::debug!(tool = name, method = %method, target = %target, "Dispatching tool call");
        let result = self.invoker.invoke(&method, params, &target).await?;
        Ok(format_result(&method, &result, self.max_response_chars))
    }
}
