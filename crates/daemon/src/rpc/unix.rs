use anyhow::{Context, Result};
use folio_common::protocol::jsonrpc::Response;
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::rpc::methods::{handle_raw_request, RpcServerState};

/// Accept folio clients on `listener` forever; each connection gets its own
/// task. Returns only when accepting fails.
#[cfg(unix)]
pub async fn serve_unix(listener: UnixListener, state: RpcServerState) -> Result<()> {
    loop {
        let (stream, _) =
            listener.accept().await.context("failed to accept folio rpc connection")?;
        let state = state.clone();
        tokio::spawn(async move {
            match serve_connection(stream, state).await {
                Ok(handled) => debug!(handled, "folio rpc client disconnected"),
                Err(error) => warn!(?error, "folio rpc connection closed with error"),
            }
        });
    }
}

/// Like [`serve_unix`], but returns `Ok(())` once `shutdown` fires.
#[cfg(unix)]
pub async fn serve_unix_until_shutdown(
    listener: UnixListener,
    state: RpcServerState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    tokio::select! {
        result = serve_unix(listener, state) => result,
        _ = shutdown.recv() => {
            info!("shutdown requested, closing rpc listener");
            Ok(())
        }
    }
}

/// Answer newline-delimited JSON-RPC requests on `stream` until the peer
/// hangs up. Blank lines are ignored and `\r\n` endings are accepted; a line
/// that is not UTF-8 ends the connection. Returns the number of requests
/// answered.
pub async fn serve_connection<IO>(stream: IO, state: RpcServerState) -> Result<usize>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await.context("failed to read json-rpc request")? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        let response = handle_raw_request(request.as_bytes(), &state).await;
        write_response(&mut write_half, &response).await?;
        handled += 1;
    }

    Ok(handled)
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(response).context("failed to encode json-rpc response")?;
    frame.push(b'\n');
    writer.write_all(&frame).await.context("failed to send json-rpc response")?;
    writer.flush().await.context("failed to send json-rpc response")
}
