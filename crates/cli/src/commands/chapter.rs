// `folio chapter`: inspect and edit chapters held by the daemon.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use clap::{Args, Subcommand};
use folio_common::protocol::rpc_methods::{
    self, ChapterGetParams, ChapterPutParams, UpdateParagraphsParams,
};
use folio_common::types::{Chapter, ChapterId, ChapterSummary, ParagraphDraft};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::client::DaemonClient;
use crate::exit_code::ExitCode;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct ChapterArgs {
    #[command(subcommand)]
    command: ChapterCommand,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum ChapterCommand {
    /// Print one chapter with its paragraphs.
    Show {
        #[arg(long)]
        id: ChapterId,
    },
    /// List known chapters.
    List,
    /// Insert or replace a whole chapter from a JSON file (`-` for stdin).
    Put {
        #[arg(long)]
        file: String,
    },
    /// Submit edited paragraphs; changed sources are recorded in history.
    Update {
        #[arg(long)]
        id: ChapterId,
        /// Change note stored with each history entry.
        #[arg(short, long)]
        message: String,
        /// JSON array of `{id, source, translation}` drafts (`-` for stdin).
        #[arg(long)]
        file: String,
    },
}

pub fn run(args: ChapterArgs) -> ExitCode {
    let format = OutputFormat::detect(args.json);
    match args.command {
        ChapterCommand::Show { id } => {
            let result = super::block_on(async move {
                DaemonClient::default()
                    .call::<_, Chapter>(rpc_methods::CHAPTER_GET, ChapterGetParams { id })
                    .await
            });
            super::finish(format, result, format_chapter)
        }
        ChapterCommand::List => {
            let result = super::block_on(async {
                DaemonClient::default()
                    .call::<_, Vec<ChapterSummary>>(rpc_methods::CHAPTER_LIST, json!({}))
                    .await
            });
            super::finish(format, result, |rows: &Vec<ChapterSummary>| format_list(rows))
        }
        ChapterCommand::Put { file } => {
            let result = read_json::<Chapter>(&file).and_then(|chapter| {
                let id = chapter.id;
                super::block_on(async move {
                    DaemonClient::default()
                        .call::<_, Value>(rpc_methods::CHAPTER_PUT, ChapterPutParams { chapter })
                        .await
                })
                .map(|_| json!({ "id": id, "ok": true }))
            });
            super::finish(format, result, |value: &Value| format!("Saved chapter {}.", value["id"]))
        }
        ChapterCommand::Update { id, message, file } => {
            let result = super::resolve_message(&message).and_then(|message| {
                let paragraphs = read_json::<Vec<ParagraphDraft>>(&file)?;
                super::block_on(async move {
                    DaemonClient::default()
                        .call::<_, Chapter>(
                            rpc_methods::CHAPTER_UPDATE_PARAGRAPHS,
                            UpdateParagraphsParams { id, message, paragraphs },
                        )
                        .await
                })
            });
            super::finish(format, result, format_chapter)
        }
    }
}

fn read_json<T: DeserializeOwned>(file: &str) -> anyhow::Result<T> {
    let raw = if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(Path::new(file)).with_context(|| format!("failed to read `{file}`"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("`{file}` is not valid JSON for this command"))
}

fn format_chapter(chapter: &Chapter) -> String {
    let mut out = format!("Chapter {} ({})", chapter.id, chapter.file.display());
    if !chapter.title.is_empty() {
        out.push_str(&format!(": {}", chapter.title));
    }
    for paragraph in &chapter.paragraphs {
        out.push_str(&format!("\n\n[{}] {}", paragraph.id, paragraph.source));
        if !paragraph.translation.is_empty() {
            out.push_str(&format!("\n    {}", paragraph.translation));
        }
        if !paragraph.history.is_empty() {
            out.push_str(&format!("\n    ({} earlier version(s))", paragraph.history.len()));
        }
    }
    out
}

fn format_list(rows: &[ChapterSummary]) -> String {
    if rows.is_empty() {
        return "No chapters.".to_string();
    }
    rows.iter()
        .map(|row| {
            format!(
                "{:>4}  {:<28}  {:>3} para  {}",
                row.id,
                row.file.display(),
                row.paragraph_count,
                row.updated.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
