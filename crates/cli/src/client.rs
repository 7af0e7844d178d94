use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

const SOCKET_RELATIVE_PATH: &str = ".folio/daemon.sock";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Sync calls run git against a remote; allow them far longer than a connect.
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct DaemonUnavailable {
    socket_path: PathBuf,
    source: io::Error,
}

#[cfg(test)]
impl DaemonUnavailable {
    pub(crate) fn for_test(socket_path: &str) -> Self {
        Self {
            socket_path: PathBuf::from(socket_path),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
    }
}

impl fmt::Display for DaemonUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daemon is not running (socket `{}`)", self.socket_path.display())
    }
}

impl std::error::Error for DaemonUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A JSON-RPC error returned by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    /// Stable application code from `data.code`, when the daemon sent one.
    pub fn app_code(&self) -> Option<&str> {
        self.data.as_ref()?.get("code")?.as_str()
    }

    /// Human detail from `data.reason`, falling back to the message.
    pub fn detail(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|data| data.get("reason"))
            .and_then(Value::as_str)
            .unwrap_or(&self.message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daemon error {}: {}", self.code, self.detail())
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    data: Option<Value>,
}

#[derive(Debug)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    next_request_id: AtomicU64,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path, timeout: DEFAULT_RESPONSE_TIMEOUT, next_request_id: AtomicU64::new(1) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One request, one response. Only the connect step is retried: a sync
    /// call that reached the daemon must never be sent twice.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest { jsonrpc: "2.0", id, method, params };
        let mut payload =
            serde_json::to_vec(&request).context("failed to serialize json-rpc request")?;
        payload.push(b'\n');

        let stream = match self.connect().await {
            Ok(stream) => stream,
            Err(first_error) => {
                debug!(error = %format!("{first_error:#}"), "retrying daemon connect");
                self.connect().await?
            }
        };

        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(&payload).await.context("failed writing json-rpc request")?;
        write_half.flush().await.context("failed flushing json-rpc request")?;

        let mut reader = BufReader::new(read_half);
        let mut response_line = Vec::new();
        timeout(self.timeout, reader.read_until(b'\n', &mut response_line))
            .await
            .with_context(|| format!("timed out waiting for `{method}` response"))?
            .context("failed reading json-rpc response from daemon socket")?;

        if response_line.is_empty() {
            anyhow::bail!("daemon closed the connection without answering `{method}`");
        }

        let response: JsonRpcResponse<R> = serde_json::from_slice(&response_line)
            .context("failed to decode daemon json-rpc response")?;

        if let Some(error) = response.error {
            return Err(anyhow!(RpcError {
                code: error.code,
                message: error.message,
                data: error.data,
            }));
        }

        response.result.context("daemon json-rpc response missing `result` field")
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .context("timed out connecting to daemon socket")?
            .map_err(|source| {
                if matches!(source.kind(), io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused)
                {
                    anyhow!(DaemonUnavailable { socket_path: self.socket_path.clone(), source })
                } else {
                    anyhow!(source).context(format!(
                        "failed to connect to daemon socket `{}`",
                        self.socket_path.display()
                    ))
                }
            })
    }
}

fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SOCKET_RELATIVE_PATH)
}
