// `folio origin`: last remote state recorded by a pull.

use clap::Args;
use folio_common::protocol::rpc_methods::{self, OriginResult};
use serde_json::json;

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct OriginArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: OriginArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(async {
        DaemonClient::default().call::<_, OriginResult>(rpc_methods::SYNC_ORIGIN, json!({})).await
    });
    super::finish(format, result, format_human)
}

fn format_human(result: &OriginResult) -> String {
    match &result.origin {
        Some(origin) => origin.clone(),
        None => "No pull recorded yet.".to_string(),
    }
}
