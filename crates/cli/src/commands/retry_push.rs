// `folio retry-push`: push an existing commit without exporting again.

use clap::Args;
use folio_common::protocol::rpc_methods;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct RetryPushArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPushResult {
    pub pushed: bool,
}

pub fn run(args: RetryPushArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(async {
        DaemonClient::default().call(rpc_methods::SYNC_RETRY_PUSH, json!({})).await
    });
    super::finish(format, result, |_: &RetryPushResult| "Pushed.".to_string())
}
