// Consistent exit codes for the folio CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error (rejected params)
//   3  = chapter not found
//   10 = daemon not reachable
//   12 = merge conflict, resolve in the working tree
//   13 = git or network failure during sync
//   14 = committed locally but the push failed, run `folio retry-push`

use std::process;

use folio_common::protocol::jsonrpc::{
    INVALID_PARAMS, MERGE_CONFLICT, NOT_FOUND, SYNC_FAILED, SYNC_TIMEOUT,
};

use crate::client::{DaemonUnavailable, RpcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 3,
    DaemonDown = 10,
    Conflict = 12,
    Sync = 13,
    PushPending = 14,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<DaemonUnavailable>().is_some() {
                return Self::DaemonDown;
            }
            if let Some(rpc_err) = cause.downcast_ref::<RpcError>() {
                return Self::from_rpc_code(rpc_err.code);
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => Self::DaemonDown,
                    std::io::ErrorKind::TimedOut => Self::Sync,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }

    pub fn from_rpc_code(code: i32) -> Self {
        match code {
            INVALID_PARAMS => Self::Usage,
            NOT_FOUND => Self::NotFound,
            MERGE_CONFLICT => Self::Conflict,
            SYNC_FAILED | SYNC_TIMEOUT => Self::Sync,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
