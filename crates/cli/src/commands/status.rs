// `folio status`: daemon liveness and sync coordinator phase.

use std::time::Duration;

use clap::Args;
use folio_common::protocol::rpc_methods::{self, SyncPhase, SyncStatusResult};
use serde_json::json;

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: StatusArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(async {
        DaemonClient::default()
            .with_timeout(STATUS_TIMEOUT)
            .call::<_, SyncStatusResult>(rpc_methods::SYNC_STATUS, json!({}))
            .await
    });
    super::finish(format, result, format_human)
}

fn format_human(status: &SyncStatusResult) -> String {
    let hint = match status.phase {
        SyncPhase::Idle => "idle",
        SyncPhase::PushFailed => "last push failed; run `folio retry-push`",
        SyncPhase::MergeConflict => "merge conflict; resolve it in the repository, then `folio pull`",
        SyncPhase::Exporting
        | SyncPhase::Committed
        | SyncPhase::Pushed
        | SyncPhase::Fetched
        | SyncPhase::Merged
        | SyncPhase::CursorUpdated => "sync in progress",
    };
    format!("Sync: {hint}")
}
