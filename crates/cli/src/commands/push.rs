// `folio push`: commit dirty chapters together and push them.

use clap::Args;
use folio_common::protocol::rpc_methods::{self, PushReport, SyncPushParams};
use folio_common::types::ChapterId;

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Chapter ids to consider, in order.
    #[arg(required = true, num_args = 1..)]
    chapters: Vec<ChapterId>,

    /// Commit message.
    #[arg(short, long)]
    message: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: PushArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    let message = match super::resolve_message(&args.message) {
        Ok(message) => message,
        Err(error) => return super::fail(format, error),
    };

    let params = SyncPushParams { chapters: args.chapters, message };
    let report: PushReport = match super::block_on(async move {
        DaemonClient::default().call(rpc_methods::SYNC_PUSH, params).await
    }) {
        Ok(report) => report,
        Err(error) => return super::fail(format, error),
    };

    let exit = if report.needs_push_retry() {
        output::print_warning(
            format,
            "PUSH_PENDING",
            &format!(
                "local commits were not pushed: {}. Run: folio retry-push",
                report.push_error.as_deref().unwrap_or("unknown error")
            ),
        );
        ExitCode::PushPending
    } else {
        ExitCode::Success
    };

    match super::finish(format, Ok(report), format_human) {
        ExitCode::Success => exit,
        failed => failed,
    }
}

fn format_human(report: &PushReport) -> String {
    if report.exported.is_empty() {
        return match (report.pushed, report.push_error.is_some()) {
            (true, _) => "No chapter changes; pushed the pending commit.".to_string(),
            (false, true) => "No chapter changes; the pending commit is still not pushed.".to_string(),
            (false, false) => "Nothing to push: all chapters match the last commit.".to_string(),
        };
    }
    let ids: Vec<String> = report.exported.iter().map(ToString::to_string).collect();
    let state = if report.pushed { "committed and pushed" } else { "committed, not pushed" };
    format!("{} chapter(s) {state}: {}", report.exported.len(), ids.join(", "))
}
