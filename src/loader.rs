//! Document loading from directories and crawler output.

use std::path::Path;

use scraper::Html;
use tokio::fs;
use tracing::{debug, warn};

use crate::crawler::WebCrawler;
use crate::types::{Document, PipelineError};

/// Outcome of scanning a directory: the documents that loaded plus the
/// files that had to be skipped. One unreadable file never aborts the
/// batch — it lands in `skipped` with its error and the scan continues.
#[derive(Debug, Default)]
pub struct DirectoryScan {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// A file the scan could not turn into a document.
#[derive(Debug)]
pub struct SkippedFile {
    pub filename: String,
    pub error: PipelineError,
}

/// Loads every recognized file under `dir` into a [`Document`].
///
/// Recognized extensions are `.txt` and `.md` (read as UTF-8 text), `.html`
/// (markup stripped, visible text kept) and `.pdf` (pages extracted and
/// concatenated in natural order). The document id is
/// the filename. Files are processed in name order so batches are
/// deterministic. A missing or unreadable directory is a configuration
/// error; individual file failures are recorded, not raised.
pub async fn load_directory(dir: impl AsRef<Path>) -> Result<DirectoryScan, PipelineError> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await.map_err(|err| {
        PipelineError::Configuration(format!("cannot read document directory {dir:?}: {err}"))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| PipelineError::Configuration(err.to_string()))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;
        if file_type.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut scan = DirectoryScan::default();
    for path in paths {
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let filename = filename.to_string();
        match load_file(&path).await {
            Ok(Some(content)) => {
                debug!(filename, bytes = content.len(), "loaded document");
                scan.documents.push(Document::new(filename, content));
            }
            Ok(None) => {} // unrecognized extension
            Err(error) => {
                warn!(filename, %error, "skipping unreadable file");
                scan.skipped.push(SkippedFile { filename, error });
            }
        }
    }
    Ok(scan)
}

async fn load_file(path: &Path) -> Result<Option<String>, PipelineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt") | Some("md") => {
            let content = fs::read_to_string(path).await?;
            require_content(content, path)
        }
        Some("html") | Some("htm") => {
            let markup = fs::read_to_string(path).await?;
            require_content(html_to_text(&markup), path)
        }
        Some("pdf") => {
            let bytes = fs::read(path).await?;
            let content = pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|err| PipelineError::EmptyContent(format!("pdf extraction: {err}")))?;
            require_content(content, path)
        }
        _ => Ok(None),
    }
}

/// Flattens an HTML document to its visible text, one whitespace-joined
/// run per text node.
fn html_to_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut parts = Vec::new();
    for text in document.root_element().text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts.join(" ")
}

fn require_content(content: String, path: &Path) -> Result<Option<String>, PipelineError> {
    if content.trim().is_empty() {
        Err(PipelineError::EmptyContent(format!(
            "{path:?} produced no text"
        )))
    } else {
        Ok(Some(content))
    }
}

/// Crawls each seed and yields one [`Document`] per seed whose crawl
/// produced a table, with the table rendered to text as content. Seeds
/// whose crawls fail or come back empty are logged and omitted.
pub async fn load_crawled(
    crawler: &WebCrawler,
    seeds: &[&str],
    max_depth: usize,
) -> Vec<Document> {
    let mut documents = Vec::new();
    for seed in seeds {
        match crawler.crawl(seed, max_depth).await {
            Ok(Some(table)) => {
                documents.push(Document::new(seed.to_string(), table.to_text()));
            }
            Ok(None) => {
                debug!(seed, "no table found within depth bound");
            }
            Err(error) => {
                warn!(seed, %error, "crawl failed for seed");
            }
        }
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_text_files_in_name_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second document").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first document").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# markdown notes").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let scan = load_directory(dir.path()).await.unwrap();
        let ids: Vec<&str> = scan.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt", "notes.md"]);
        assert!(scan.skipped.is_empty(), "unrecognized files are not errors");
    }

    #[tokio::test]
    async fn html_files_are_stripped_to_visible_text() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("report.html"),
            "<html><body><h1>Q3 Report</h1><p>Revenue grew <b>9%</b>.</p></body></html>",
        )
        .unwrap();

        let scan = load_directory(dir.path()).await.unwrap();
        assert_eq!(scan.documents.len(), 1);
        assert_eq!(scan.documents[0].content, "Q3 Report Revenue grew 9% .");
    }

    #[tokio::test]
    async fn bad_file_is_recorded_without_aborting() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "fine").unwrap();
        // Invalid UTF-8 cannot be read as text.
        std::fs::write(dir.path().join("broken.txt"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let scan = load_directory(dir.path()).await.unwrap();
        assert_eq!(scan.documents.len(), 1);
        assert_eq!(scan.documents[0].id, "good.txt");
        assert_eq!(scan.skipped.len(), 2);
    }

    #[tokio::test]
    async fn missing_directory_is_a_configuration_error() {
        let err = load_directory("/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
