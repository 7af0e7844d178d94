// `folio pull`: merge the remote branch and record its state.

use clap::Args;
use folio_common::protocol::rpc_methods::{self, PullReport, SyncPullParams};

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

const DEFAULT_MERGE_MESSAGE: &str = "Merge remote changes";

#[derive(Debug, Args)]
pub struct PullArgs {
    /// Merge commit message.
    #[arg(short, long, default_value = DEFAULT_MERGE_MESSAGE)]
    message: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: PullArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    let result = super::resolve_message(&args.message).and_then(|message| {
        super::block_on(async move {
            DaemonClient::default()
                .call::<_, PullReport>(rpc_methods::SYNC_PULL, SyncPullParams { message })
                .await
        })
    });
    super::finish(format, result, format_human)
}

fn format_human(report: &PullReport) -> String {
    format!("Merged remote changes. Origin is now {}", short(&report.origin))
}

fn short(state: &str) -> &str {
    state.get(..12).unwrap_or(state)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: PullArgs,
    }

    #[test]
    fn message_has_default() {
        let parsed = Harness::try_parse_from(["pull"]).unwrap();
        assert_eq!(parsed.args.message, DEFAULT_MERGE_MESSAGE);
    }

    #[test]
    fn human_format_abbreviates_origin() {
        let report = PullReport { origin: "0123456789abcdef0123".into() };
        assert_eq!(format_human(&report), "Merged remote changes. Origin is now 0123456789ab");
        assert_eq!(short("abc"), "abc");
    }
}
