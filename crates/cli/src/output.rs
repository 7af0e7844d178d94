// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use folio_common::protocol::jsonrpc::{INVALID_PARAMS, NOT_FOUND, SYNC_TIMEOUT};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::client::{DaemonUnavailable, RpcError};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "error", ANSI_RED, code, message);
}

pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "warning", ANSI_YELLOW, code, message);
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, &code, &message);
}

fn print_diagnostic(format: OutputFormat, label: &str, color: &str, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let mut obj = serde_json::Map::new();
            obj.insert(label.to_string(), serde_json::json!({ "code": code, "message": message }));
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

fn actionable_error(error: &anyhow::Error) -> (String, String) {
    if error.chain().any(|cause| cause.downcast_ref::<DaemonUnavailable>().is_some()) {
        return (
            "DAEMON_NOT_RUNNING".to_string(),
            "Daemon is not running. Start it from the repository with: foliod".to_string(),
        );
    }

    if let Some(rpc) = error.chain().find_map(|cause| cause.downcast_ref::<RpcError>()) {
        return match (rpc.app_code(), rpc.code) {
            (Some("MERGE_CONFLICT"), _) => (
                "MERGE_CONFLICT".to_string(),
                format!(
                    "{}\nResolve the conflicts in the repository, commit, then run: folio pull",
                    rpc.message
                ),
            ),
            (Some(code), _) => (code.to_string(), rpc.message.clone()),
            (None, INVALID_PARAMS) => ("INVALID_PARAMS".to_string(), rpc.detail().to_string()),
            (None, NOT_FOUND) => (
                "NOT_FOUND".to_string(),
                format!("{}. Run: folio chapter list", rpc.message),
            ),
            (None, SYNC_TIMEOUT) => (
                "SYNC_TIMEOUT".to_string(),
                "Pull timed out; the remote may be unreachable.".to_string(),
            ),
            (None, _) => ("RPC_ERROR".to_string(), rpc.detail().to_string()),
        };
    }

    let message = format!("{error:#}");
    if message.to_ascii_lowercase().contains("timed out") {
        return (
            "DAEMON_TIMEOUT".to_string(),
            format!("{message}. Check that foliod is running: ps aux | grep foliod"),
        );
    }

    ("ERROR".to_string(), message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Info {
            name: String,
        }
        let info = Info { name: "ch01.txt".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &info, |i| format!("File: {}", i.name))
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "File: ch01.txt\n");
    }

    #[test]
    fn write_output_json_does_not_call_human_fn() {
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &json!({ "count": 2 }), |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["count"], 2);
    }

    #[test]
    fn render_human_line_colors_only_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED) && line.contains(ANSI_RESET));
        assert_eq!(render_human_stderr_line("warning", "careful", false, ANSI_YELLOW), "warning: careful");
    }

    #[test]
    fn actionable_error_daemon_not_running() {
        let err = anyhow::Error::new(DaemonUnavailable::for_test("/tmp/x.sock"));
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "DAEMON_NOT_RUNNING");
        assert!(message.contains("foliod"));
    }

    #[test]
    fn actionable_error_merge_conflict_explains_next_step() {
        let err = anyhow::Error::new(RpcError {
            code: -32011,
            message: "merge stopped on conflicts".into(),
            data: Some(json!({ "code": "MERGE_CONFLICT" })),
        });
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "MERGE_CONFLICT");
        assert!(message.contains("folio pull"));
    }

    #[test]
    fn actionable_error_invalid_params_uses_reason() {
        let err = anyhow::Error::new(RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".into(),
            data: Some(json!({ "reason": "at least one chapter id is required" })),
        });
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "INVALID_PARAMS");
        assert_eq!(message, "at least one chapter id is required");
    }

    #[test]
    fn actionable_error_falls_back_to_message_chain() {
        let err = anyhow::anyhow!("disk full").context("failed to read chapter file");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "ERROR");
        assert_eq!(message, "failed to read chapter file: disk full");
    }
}
