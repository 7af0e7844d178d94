// Chapter export: render paragraphs to text and overwrite the chapter file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use folio_common::types::{Chapter, Paragraph};
use tracing::debug;

const TEMP_SUFFIX: &str = ".folio-tmp";

/// Turns a paragraph sequence into the text stored in the repository.
pub trait SourceRenderer: Send + Sync {
    fn render_source(&self, paragraphs: &[Paragraph]) -> String;
}

/// Paragraph sources separated by a blank line, newline-terminated.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl SourceRenderer for PlainRenderer {
    fn render_source(&self, paragraphs: &[Paragraph]) -> String {
        let mut out = String::new();
        for (index, paragraph) in paragraphs.iter().enumerate() {
            if index > 0 {
                out.push_str("\n\n");
            }
            out.push_str(paragraph.source.trim_end_matches('\n'));
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

#[derive(Clone)]
pub struct ChapterExporter {
    repo_root: PathBuf,
    renderer: Arc<dyn SourceRenderer>,
    atomic: bool,
}

impl ChapterExporter {
    pub fn new(repo_root: impl Into<PathBuf>, renderer: Arc<dyn SourceRenderer>) -> Self {
        Self { repo_root: repo_root.into(), renderer, atomic: true }
    }

    /// Write through a temp file and rename (default), or overwrite in place.
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn render(&self, chapter: &Chapter) -> String {
        self.renderer.render_source(&chapter.paragraphs)
    }

    /// Absolute destination of a chapter. Rejects paths escaping the repo.
    pub fn destination(&self, chapter: &Chapter) -> Result<PathBuf> {
        let relative = &chapter.file;
        if relative.as_os_str().is_empty() {
            bail!("chapter {} has no file path", chapter.id);
        }
        let escapes = relative.components().any(|component| {
            matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            bail!(
                "chapter {} file `{}` must stay inside the repository",
                chapter.id,
                relative.display()
            );
        }
        Ok(self.repo_root.join(relative))
    }

    /// Overwrite the chapter's file with its rendered paragraphs.
    pub fn export(&self, chapter: &Chapter) -> Result<PathBuf> {
        let target = self.destination(chapter)?;
        let content = self.render(chapter);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create export directory `{}`", parent.display())
            })?;
        }

        if self.atomic {
            write_atomic(&target, content.as_bytes())?;
        } else {
            fs::write(&target, content.as_bytes())
                .with_context(|| format!("failed to write `{}`", target.display()))?;
        }

        debug!(chapter = chapter.id, path = %target.display(), bytes = content.len(), "exported chapter");
        Ok(target)
    }
}

fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let tmp_path = temp_path_for(target);
    let mut file = File::create(&tmp_path)
        .with_context(|| format!("failed to open temp export `{}`", tmp_path.display()))?;
    file.write_all(content)
        .with_context(|| format!("failed to write temp export `{}`", tmp_path.display()))?;
    file.sync_data().context("failed to fsync exported chapter")?;
    drop(file);

    fs::rename(&tmp_path, target).with_context(|| {
        format!(
            "failed to atomically move `{}` to `{}`",
            tmp_path.display(),
            target.display()
        )
    })
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    target.with_file_name(format!(".{}", name.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn chapter(file: &str, sources: &[&str]) -> Chapter {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let mut chapter = Chapter::new(1, file, now);
        chapter.paragraphs = sources
            .iter()
            .enumerate()
            .map(|(index, source)| Paragraph {
                id: index as i64 + 1,
                source: source.to_string(),
                translation: String::new(),
                updated: now,
                history: Vec::new(),
            })
            .collect();
        chapter
    }

    fn exporter(dir: &TempDir) -> ChapterExporter {
        ChapterExporter::new(dir.path(), Arc::new(PlainRenderer))
    }

    #[test]
    fn plain_renderer_separates_paragraphs_with_blank_line() {
        let rendered = PlainRenderer.render_source(&chapter("x", &["one", "two\nlines\n"]).paragraphs);
        assert_eq!(rendered, "one\n\ntwo\nlines\n");
        assert_eq!(PlainRenderer.render_source(&[]), "");
    }

    #[test]
    fn export_overwrites_existing_file_completely() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ch01.txt");
        fs::write(&path, "stale content that is much longer than the new one\n").unwrap();

        let written = exporter(&dir).export(&chapter("ch01.txt", &["fresh"])).unwrap();
        assert_eq!(written, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn export_creates_parent_directories_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        exporter(&dir).export(&chapter("book/part1/ch01.txt", &["a"])).unwrap();

        let parent = dir.path().join("book/part1");
        let names: Vec<_> = fs::read_dir(&parent)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ch01.txt".to_string()]);
    }

    #[test]
    fn non_atomic_export_writes_in_place() {
        let dir = TempDir::new().unwrap();
        let path = exporter(&dir).with_atomic(false).export(&chapter("ch02.txt", &["b"])).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "b\n");
    }

    #[test]
    fn export_rejects_paths_outside_repository() {
        let dir = TempDir::new().unwrap();
        let error = exporter(&dir).export(&chapter("../escape.txt", &["x"])).expect_err("escape");
        assert!(error.to_string().contains("must stay inside the repository"));

        let error = exporter(&dir).export(&chapter("/etc/passwd", &["x"])).expect_err("absolute");
        assert!(error.to_string().contains("must stay inside the repository"));
    }

    #[test]
    fn temp_path_is_hidden_sibling() {
        let tmp = temp_path_for(Path::new("/repo/book/ch01.txt"));
        assert_eq!(tmp, PathBuf::from("/repo/book/.ch01.txt.folio-tmp"));
    }
}
