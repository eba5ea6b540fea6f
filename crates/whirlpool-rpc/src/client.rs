//! Minimal Solana JSON-RPC client
//!
//! Only the two account-loading methods the pool reader needs. Every request
//! is bounded by the configured timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use whirlroute_core::{Pubkey, ReaderError, RpcConfig};

/// Solana caps `getMultipleAccounts` at 100 keys per call
pub const MAX_ACCOUNTS_PER_REQUEST: usize = 100;

/// `getMultipleAccounts` chunks in flight at once
pub const MAX_CONCURRENT_REQUESTS: usize = 8;

type Result<T> = std::result::Result<T, ReaderError>;

/// `getProgramAccounts` filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    DataSize(u64),
    /// Base58-encoded bytes expected at `offset`
    Memcmp { offset: usize, bytes: String },
}

impl AccountFilter {
    fn to_json(&self) -> Value {
        match self {
            Self::DataSize(size) => json!({ "dataSize": size }),
            Self::Memcmp { offset, bytes } => json!({
                "memcmp": { "offset": offset, "bytes": bytes }
            }),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    commitment: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("whirlroute")
            .build()
            .map_err(|e| ReaderError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            url: config.url.clone(),
            commitment: config.commitment.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw account data for each address, `None` where no account exists.
    /// Output order matches `addresses`.
    pub async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        // buffered keeps chunk order
        let requests: Vec<_> = addresses
            .chunks(MAX_ACCOUNTS_PER_REQUEST)
            .map(|chunk| self.get_multiple_accounts_chunk(chunk))
            .collect();
        let results: Vec<Vec<Option<Vec<u8>>>> = stream::iter(requests)
        .buffered(MAX_CONCURRENT_REQUESTS)
        .try_collect()
        .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn get_multiple_accounts_chunk(&self, chunk: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        let keys: Vec<String> = chunk.iter().map(Pubkey::to_string).collect();
        let params = json!([
            keys,
            { "encoding": "base64", "commitment": self.commitment }
        ]);

        let result = self.call("getMultipleAccounts", params).await?;
        let values = result
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| ReaderError::Transport {
                message: "getMultipleAccounts: missing value array".to_string(),
            })?;

        if values.len() != chunk.len() {
            return Err(ReaderError::IncompleteBatch {
                requested: chunk.len(),
                returned: values.len(),
            });
        }

        chunk
            .iter()
            .zip(values)
            .map(|(address, value)| decode_account_data(address, value))
            .collect()
    }

    /// Every account owned by `program_id` that passes all `filters`
    pub async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let filters: Vec<Value> = filters.iter().map(AccountFilter::to_json).collect();
        let params = json!([
            program_id.to_string(),
            {
                "encoding": "base64",
                "commitment": self.commitment,
                "filters": filters,
            }
        ]);

        let result = self.call("getProgramAccounts", params).await?;
        let items = result.as_array().ok_or_else(|| ReaderError::Transport {
            message: "getProgramAccounts: expected array".to_string(),
        })?;

        let mut accounts = Vec::with_capacity(items.len());
        for item in items {
            let key = item
                .get("pubkey")
                .and_then(Value::as_str)
                .ok_or_else(|| ReaderError::Transport {
                    message: "getProgramAccounts: missing pubkey".to_string(),
                })?;
            let address: Pubkey = key.parse().map_err(|e| ReaderError::Decode {
                address: key.to_string(),
                message: format!("invalid pubkey: {}", e),
            })?;
            let account = item.get("account").unwrap_or(&Value::Null);
            if let Some(data) = decode_account_data(&address, account)? {
                accounts.push((address, data));
            }
        }
        Ok(accounts)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "RPC request");

        let body: Value = self
            .timed_request(async {
                let response = self
                    .http
                    .post(&self.url)
                    .json(&request)
                    .send()
                    .await?
                    .error_for_status()?;
                response.json::<Value>().await
            })
            .await?;

        parse_rpc_response(body)
    }

    async fn timed_request<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, reqwest::Error>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ReaderError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| match e.status() {
                Some(status) => ReaderError::Rpc {
                    code: i64::from(status.as_u16()),
                    message: e.to_string(),
                },
                None => ReaderError::Transport {
                    message: e.to_string(),
                },
            })
    }
}

/// Unwrap a JSON-RPC 2.0 envelope into its `result`
pub fn parse_rpc_response(mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(ReaderError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ReaderError::Transport {
            message: "response has neither result nor error".to_string(),
        }),
    }
}

/// Decode one account object (`{ "data": [b64, "base64"], ... }` or null)
pub fn decode_account_data(address: &Pubkey, value: &Value) -> Result<Option<Vec<u8>>> {
    if value.is_null() {
        return Ok(None);
    }

    let decode_err = |message: String| ReaderError::Decode {
        address: address.to_string(),
        message,
    };

    let encoded = match value.get("data") {
        Some(Value::Array(parts)) => {
            let encoding = parts.get(1).and_then(Value::as_str).unwrap_or("base64");
            if encoding != "base64" {
                return Err(decode_err(format!("unsupported encoding {}", encoding)));
            }
            parts.first().and_then(Value::as_str)
        }
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
    .ok_or_else(|| decode_err("missing data field".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(Some)
        .map_err(|e| decode_err(format!("invalid base64: {}", e)))
}
