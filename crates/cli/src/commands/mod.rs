// CLI subcommand dispatch.

use std::future::Future;

use anyhow::Context;
use clap::Subcommand;

use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

pub mod chapter;
pub mod origin;
pub mod pull;
pub mod push;
pub mod retry_push;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// Inspect, seed or edit chapters
    Chapter(chapter::ChapterArgs),
    /// Export dirty chapters, commit them together and push
    Push(push::PushArgs),
    /// Push a commit left behind by a failed push
    RetryPush(retry_push::RetryPushArgs),
    /// Fetch and merge remote work, then record the remote state
    Pull(pull::PullArgs),
    /// Show the last remote state recorded by a pull
    Origin(origin::OriginArgs),
    /// Show the sync coordinator phase
    Status(status::StatusArgs),
}

pub fn run(cmd: Command) -> ExitCode {
    match cmd {
        Command::Chapter(args) => chapter::run(args),
        Command::Push(args) => push::run(args),
        Command::RetryPush(args) => retry_push::run(args),
        Command::Pull(args) => pull::run(args),
        Command::Origin(args) => origin::run(args),
        Command::Status(args) => status::run(args),
    }
}

/// Drive one daemon call to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(future)
}

/// Print `result` in `format`, or report the error and map it to an exit code.
pub(crate) fn finish<T, F>(format: OutputFormat, result: anyhow::Result<T>, human_fn: F) -> ExitCode
where
    T: serde::Serialize,
    F: FnOnce(&T) -> String,
{
    match result.and_then(|value| {
        output::print_output(format, &value, human_fn).context("failed to write output")
    }) {
        Ok(()) => ExitCode::Success,
        Err(error) => fail(format, error),
    }
}

pub(crate) fn fail(format: OutputFormat, error: anyhow::Error) -> ExitCode {
    tracing::debug!(error = %format!("{error:#}"), "command failed");
    output::print_anyhow_error(format, &error);
    ExitCode::from_error(&error)
}

/// Trimmed commit message; rejected locally when blank.
pub(crate) fn resolve_message(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("--message must not be empty");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_message_trims_and_rejects_blank() {
        assert_eq!(resolve_message("  publish chapter 3 ").unwrap(), "publish chapter 3");
        let error = resolve_message("   ").expect_err("blank message");
        assert!(error.to_string().contains("must not be empty"));
    }

    #[test]
    fn block_on_runs_future() {
        let value = block_on(async { Ok::<_, anyhow::Error>(7) }).unwrap();
        assert_eq!(value, 7);
    }
}
