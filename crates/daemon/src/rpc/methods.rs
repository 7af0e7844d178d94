use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use folio_common::protocol::jsonrpc::{
    Request, RequestId, Response, RpcError, INTERNAL_ERROR, INVALID_PARAMS,
    MERGE_CONFLICT, METHOD_NOT_FOUND, NOT_FOUND, PARSE_ERROR, SYNC_FAILED, SYNC_TIMEOUT,
};
use folio_common::protocol::rpc_methods::{
    ChapterGetParams, ChapterPutParams, OriginResult, SyncPullParams, SyncPushParams,
    SyncStatusResult, UpdateParagraphsParams, CHAPTER_GET, CHAPTER_LIST, CHAPTER_PUT,
    CHAPTER_UPDATE_PARAGRAPHS, DAEMON_SHUTDOWN, RPC_PING, SYNC_ORIGIN, SYNC_PULL, SYNC_PUSH,
    SYNC_RETRY_PUSH, SYNC_STATUS,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::store::ChapterRepository;
use crate::sync::{SyncCoordinator, SyncError};
use crate::versioning::{update_paragraphs, UpdateError};

pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct RpcServerState {
    chapters: Arc<dyn ChapterRepository>,
    sync: Arc<SyncCoordinator>,
    shutdown_notifier: Option<broadcast::Sender<()>>,
    pull_timeout: Duration,
}

impl RpcServerState {
    pub fn new(chapters: Arc<dyn ChapterRepository>, sync: Arc<SyncCoordinator>) -> Self {
        Self { chapters, sync, shutdown_notifier: None, pull_timeout: DEFAULT_PULL_TIMEOUT }
    }

    pub fn with_shutdown_notifier(mut self, notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(notifier);
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }
}

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError::new(PARSE_ERROR, "Parse error")
                    .with_data(json!({ "reason": error.to_string() })),
            );
        }
    };

    if let Some(error) = request.envelope_error() {
        return Response::error(request.id, error);
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    debug!(method = %request.method, "dispatching rpc request");
    match request.method.as_str() {
        RPC_PING => Response::success(request.id, json!({ "ok": true })),
        DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(request.id, json!({ "ok": true }))
        }
        CHAPTER_GET => handle_chapter_get(request, state).await,
        CHAPTER_LIST => handle_chapter_list(request, state).await,
        CHAPTER_PUT => handle_chapter_put(request, state).await,
        CHAPTER_UPDATE_PARAGRAPHS => handle_update_paragraphs(request, state).await,
        SYNC_ORIGIN => handle_sync_origin(request, state).await,
        SYNC_PUSH => handle_sync_push(request, state).await,
        SYNC_RETRY_PUSH => handle_sync_retry_push(request, state).await,
        SYNC_PULL => handle_sync_pull(request, state).await,
        SYNC_STATUS => Response::success(
            request.id,
            json!(SyncStatusResult { phase: state.sync.phase() }),
        ),
        _ => Response::error(request.id, RpcError::new(METHOD_NOT_FOUND, "Method not found")),
    }
}

async fn handle_chapter_get(request: Request, state: &RpcServerState) -> Response {
    let params: ChapterGetParams = match parse_params(request.params, CHAPTER_GET) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    let chapters = Arc::clone(&state.chapters);
    match run_blocking(move || chapters.find(params.id)).await {
        Ok(Some(chapter)) => Response::success(request.id, json!(chapter)),
        Ok(None) => not_found_response(request.id, params.id),
        Err(error) => internal_error_response(request.id, format!("{error:#}")),
    }
}

async fn handle_chapter_list(request: Request, state: &RpcServerState) -> Response {
    let chapters = Arc::clone(&state.chapters);
    match run_blocking(move || chapters.list()).await {
        Ok(summaries) => Response::success(request.id, json!(summaries)),
        Err(error) => internal_error_response(request.id, format!("{error:#}")),
    }
}

async fn handle_chapter_put(request: Request, state: &RpcServerState) -> Response {
    let params: ChapterPutParams = match parse_params(request.params, CHAPTER_PUT) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };
    if let Err(error) = params.validate() {
        return invalid_params_response(request.id, error.to_string());
    }

    let chapters = Arc::clone(&state.chapters);
    match run_blocking(move || chapters.save(&params.chapter)).await {
        Ok(()) => Response::success(request.id, json!({ "ok": true })),
        Err(error) => internal_error_response(request.id, format!("{error:#}")),
    }
}

async fn handle_update_paragraphs(request: Request, state: &RpcServerState) -> Response {
    let params: UpdateParagraphsParams =
        match parse_params(request.params, CHAPTER_UPDATE_PARAGRAPHS) {
            Ok(params) => params,
            Err(reason) => return invalid_params_response(request.id, reason),
        };

    let chapters = Arc::clone(&state.chapters);
    let outcome = run_blocking(move || {
        update_paragraphs(chapters.as_ref(), params, Utc::now()).map_err(anyhow::Error::from)
    })
    .await;

    match outcome {
        Ok(chapter) => Response::success(request.id, json!(chapter)),
        Err(error) => match error.downcast::<UpdateError>() {
            Ok(UpdateError::Validation(error)) => {
                invalid_params_response(request.id, error.to_string())
            }
            Ok(UpdateError::NotFound(id)) => not_found_response(request.id, id),
            Ok(error) => internal_error_response(request.id, error.to_string()),
            Err(error) => internal_error_response(request.id, format!("{error:#}")),
        },
    }
}

async fn handle_sync_origin(request: Request, state: &RpcServerState) -> Response {
    let sync = Arc::clone(&state.sync);
    match run_blocking(move || sync.origin().map_err(anyhow::Error::from)).await {
        Ok(origin) => Response::success(request.id, json!(OriginResult { origin })),
        Err(error) => sync_error_response(request.id, error),
    }
}

async fn handle_sync_push(request: Request, state: &RpcServerState) -> Response {
    let params: SyncPushParams = match parse_params(request.params, SYNC_PUSH) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };
    if let Err(error) = params.validate() {
        return invalid_params_response(request.id, error.to_string());
    }

    let sync = Arc::clone(&state.sync);
    let outcome = run_blocking(move || {
        sync.sync_push(&params.chapters, &params.message).map_err(anyhow::Error::from)
    })
    .await;

    match outcome {
        Ok(report) => Response::success(request.id, json!(report)),
        Err(error) => sync_error_response(request.id, error),
    }
}

async fn handle_sync_retry_push(request: Request, state: &RpcServerState) -> Response {
    let sync = Arc::clone(&state.sync);
    match run_blocking(move || sync.retry_push().map_err(anyhow::Error::from)).await {
        Ok(()) => Response::success(request.id, json!({ "pushed": true })),
        Err(error) => sync_error_response(request.id, error),
    }
}

async fn handle_sync_pull(request: Request, state: &RpcServerState) -> Response {
    let params: SyncPullParams = match parse_params(request.params, SYNC_PULL) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };
    if let Err(error) = params.validate() {
        return invalid_params_response(request.id, error.to_string());
    }

    let sync = Arc::clone(&state.sync);
    let pull = run_blocking(move || sync.sync_pull(&params.message).map_err(anyhow::Error::from));

    // The blocking task keeps running after a timeout; the single-flight
    // guard holds off later syncs until it finishes.
    match tokio::time::timeout(state.pull_timeout, pull).await {
        Ok(Ok(report)) => Response::success(request.id, json!(report)),
        Ok(Err(error)) => sync_error_response(request.id, error),
        Err(_) => {
            let timeout_ms = u64::try_from(state.pull_timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(timeout_ms, "sync.pull timed out");
            Response::error(
                request.id,
                RpcError::new(SYNC_TIMEOUT, "sync.pull timed out").with_data(json!({
                    "timeout_secs": state.pull_timeout.as_secs(),
                    "timeout_ms": timeout_ms,
                })),
            )
        }
    }
}

async fn run_blocking<T, F>(work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(error) => Err(anyhow::anyhow!("blocking rpc task failed: {error}")),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> Result<T, String> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|error| format!("failed to decode {method} params: {error}"))
}

fn sync_error_response(request_id: RequestId, error: anyhow::Error) -> Response {
    let error = match error.downcast::<SyncError>() {
        Ok(error) => error,
        Err(error) => return internal_error_response(request_id, format!("{error:#}")),
    };

    let code = match &error {
        SyncError::Validation(_) => {
            return invalid_params_response(request_id, error.to_string());
        }
        SyncError::MergeConflict(_) | SyncError::UnresolvedMerge => MERGE_CONFLICT,
        SyncError::Store(_) => INTERNAL_ERROR,
        SyncError::DirtyCheck { .. } | SyncError::Export { .. } | SyncError::Git(_) => SYNC_FAILED,
    };
    Response::error(
        request_id,
        RpcError::new(code, error.to_string()).with_data(json!({ "code": error.code() })),
    )
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError::new(INVALID_PARAMS, "Invalid params").with_data(json!({ "reason": reason })),
    )
}

fn not_found_response(request_id: RequestId, chapter: i64) -> Response {
    Response::error(
        request_id,
        RpcError::new(NOT_FOUND, format!("chapter {chapter} not found"))
            .with_data(json!({ "chapter": chapter })),
    )
}

fn internal_error_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError::new(INTERNAL_ERROR, "Internal error").with_data(json!({ "reason": reason })),
    )
}
