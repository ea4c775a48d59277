//! Terminal-result interpretation: turn a completed task's opaque `result`
//! into something a presentation layer can show or download.
//!
//! Each action kind has its own result shape (see the HTTP contract in the
//! crate docs). [`interpret`] decodes it and enforces the fields the action
//! cannot do without; a missing output id or saved path becomes
//! [`WorkbenchError::UnexpectedResult`] instead of a silent no-op.

use crate::action::ActionKind;
use crate::error::WorkbenchError;
use crate::session::FileSession;
use crate::transport::{download_url, image_download_url, image_url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Folder the service stores generated artifacts in.
pub const PROCESSED_FOLDER: &str = "processed";

/// Extracted text: per-page map, or one string for services that flatten it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextContent {
    Pages(BTreeMap<u32, String>),
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub text: TextContent,
    #[serde(default)]
    pub extracted_pages: u32,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlExtraction {
    pub html: String,
    #[serde(default)]
    pub extracted_pages: u32,
}

/// One table: a row-major matrix of optional cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub col_count: u32,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExtraction {
    #[serde(default)]
    pub total_tables: u32,
    /// Page number → tables found on that page.
    #[serde(default)]
    pub tables: BTreeMap<u32, Vec<Table>>,
}

/// Per-image metadata reported by `/extract-images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// An extracted image with its retrieval URLs resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedImage {
    #[serde(flatten)]
    pub info: ImageInfo,
    pub thumbnail_url: Option<String>,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageExtraction {
    pub total_images: u32,
    /// Server-side directory the images were written to, when a custom
    /// export path was honoured.
    pub saved_to: Option<String>,
    pub images: Vec<ExtractedImage>,
}

#[derive(Debug, Deserialize)]
struct RawImageResult {
    #[serde(default)]
    total_images: u32,
    #[serde(default)]
    saved_to_custom_path: bool,
    #[serde(default)]
    export_path: Option<String>,
    #[serde(default)]
    images: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct RawOutputFile {
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    rotated_pages: Option<u32>,
    #[serde(default)]
    deleted_pages: Option<u32>,
    #[serde(default)]
    remaining_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawConvertResult {
    #[serde(default)]
    saved_to_local: bool,
    #[serde(default)]
    saved_path: Option<String>,
    #[serde(default)]
    output_file_id: Option<String>,
}

/// A generated file waiting on the service for a single retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTarget {
    pub file_id: String,
    pub folder: String,
    /// Retrieval URL; the service deletes the artifact after one fetch.
    pub url: String,
    /// File name to save under, derived from the uploaded document's name.
    pub suggested_name: String,
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutcome {
    Text(TextExtraction),
    Html(HtmlExtraction),
    Tables(TableExtraction),
    Images(ImageExtraction),
    /// A new document is ready to download.
    Download {
        target: DownloadTarget,
        summary: String,
    },
    /// The service wrote the output to a path on its own file system.
    SavedOnServer { path: String },
}

impl ActionOutcome {
    pub fn download_target(&self) -> Option<&DownloadTarget> {
        match self {
            ActionOutcome::Download { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Short line suitable for a toast/status message.
    pub fn headline(&self) -> String {
        match self {
            ActionOutcome::Text(t) => format!("Extracted text from {} pages", t.extracted_pages),
            ActionOutcome::Html(h) => format!("Extracted {} pages with layout", h.extracted_pages),
            ActionOutcome::Tables(t) => format!("Extracted {} tables", t.total_tables),
            ActionOutcome::Images(i) => match &i.saved_to {
                Some(dir) => format!("Extracted {} images, saved to {dir}", i.total_images),
                None => format!("Extracted {} images", i.total_images),
            },
            ActionOutcome::Download { summary, .. } => summary.clone(),
            ActionOutcome::SavedOnServer { path } => format!("Saved to {path}"),
        }
    }

    /// Render the outcome as a plain-text content block.
    pub fn render(&self) -> String {
        match self {
            ActionOutcome::Text(t) => match &t.text {
                TextContent::Plain(s) => s.clone(),
                TextContent::Pages(pages) => pages
                    .iter()
                    .map(|(page, text)| format!("── page {page} ──\n{}", text.trim_end()))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            },
            ActionOutcome::Html(h) => h.html.clone(),
            ActionOutcome::Tables(t) => render_tables(t),
            ActionOutcome::Images(i) => {
                let mut out = self.headline();
                for img in &i.images {
                    out.push_str(&format!(
                        "\n  p{:<3} {:<32} {:>8.1} KB  {}",
                        img.info.page,
                        img.info.filename,
                        img.info.size as f64 / 1024.0,
                        img.download_url.as_deref().unwrap_or("-"),
                    ));
                }
                out
            }
            ActionOutcome::Download { target, summary } => {
                format!("{summary}\n{}", target.url)
            }
            ActionOutcome::SavedOnServer { .. } => self.headline(),
        }
    }
}

fn render_tables(t: &TableExtraction) -> String {
    let mut out = format!("{} tables", t.total_tables);
    for (page, tables) in t.tables.iter().filter(|(_, v)| !v.is_empty()) {
        for (idx, table) in tables.iter().enumerate() {
            out.push_str(&format!(
                "\n\npage {page}, table {} ({} rows × {} cols)",
                idx + 1,
                table.row_count,
                table.col_count
            ));
            for (row_idx, row) in table.data.iter().enumerate() {
                let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("")).collect();
                out.push_str(&format!("\n| {} |", cells.join(" | ")));
                if row_idx == 0 {
                    out.push_str(&format!("\n|{}", "---|".repeat(cells.len().max(1))));
                }
            }
        }
    }
    out
}

/// Decode a completed task's `result` for the given action.
pub fn interpret(
    kind: ActionKind,
    result: Value,
    session: &FileSession,
    base_url: &str,
) -> Result<ActionOutcome, WorkbenchError> {
    if result.is_null() {
        return Err(WorkbenchError::unexpected(kind.to_string(), "no result returned"));
    }

    match kind {
        ActionKind::ExtractText | ActionKind::ExtractTextClean => {
            Ok(ActionOutcome::Text(decode(kind, result)?))
        }
        ActionKind::ExtractTextEnhanced => Ok(ActionOutcome::Html(decode(kind, result)?)),
        ActionKind::ExtractTables => Ok(ActionOutcome::Tables(decode(kind, result)?)),
        ActionKind::ExtractImages => {
            let raw: RawImageResult = decode(kind, result)?;
            let saved_to = if raw.saved_to_custom_path {
                Some(raw.export_path.ok_or_else(|| {
                    WorkbenchError::unexpected(kind.to_string(), "saved to a custom path but no export_path given")
                })?)
            } else {
                None
            };
            let images = raw
                .images
                .into_iter()
                .map(|info| ExtractedImage {
                    thumbnail_url: info.thumbnail.as_deref().map(|t| image_url(base_url, t)),
                    download_url: info.path.as_deref().map(|p| image_download_url(base_url, p)),
                    info,
                })
                .collect();
            Ok(ActionOutcome::Images(ImageExtraction {
                total_images: raw.total_images,
                saved_to,
                images,
            }))
        }
        ActionKind::RotatePages
        | ActionKind::DeletePages
        | ActionKind::Encrypt
        | ActionKind::Decrypt => {
            let raw: RawOutputFile = decode(kind, result)?;
            let file_id = require_output_id(kind, raw.output_file_id)?;
            let summary = match kind {
                ActionKind::RotatePages => {
                    format!("Rotated {} pages", raw.rotated_pages.unwrap_or(0))
                }
                ActionKind::DeletePages => format!(
                    "Deleted {} pages, {} remaining",
                    raw.deleted_pages.unwrap_or(0),
                    raw.remaining_pages.unwrap_or(0)
                ),
                ActionKind::Encrypt => "Document encrypted".to_string(),
                _ => "Document decrypted".to_string(),
            };
            Ok(ActionOutcome::Download {
                target: download_target(kind, file_id, session, base_url),
                summary,
            })
        }
        ActionKind::ConvertToWord => {
            let raw: RawConvertResult = decode(kind, result)?;
            if raw.saved_to_local {
                let path = raw.saved_path.filter(|p| !p.is_empty()).ok_or_else(|| {
                    WorkbenchError::unexpected(kind.to_string(), "saved locally but no saved_path given")
                })?;
                return Ok(ActionOutcome::SavedOnServer { path });
            }
            let file_id = require_output_id(kind, raw.output_file_id)?;
            Ok(ActionOutcome::Download {
                target: download_target(kind, file_id, session, base_url),
                summary: "Converted to Word".to_string(),
            })
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ActionKind, result: Value) -> Result<T, WorkbenchError> {
    serde_json::from_value(result)
        .map_err(|e| WorkbenchError::unexpected(kind.to_string(), e.to_string()))
}

fn require_output_id(kind: ActionKind, id: Option<String>) -> Result<String, WorkbenchError> {
    id.filter(|s| !s.is_empty())
        .ok_or_else(|| WorkbenchError::unexpected(kind.to_string(), "missing output_file_id"))
}

fn download_target(
    kind: ActionKind,
    file_id: String,
    session: &FileSession,
    base_url: &str,
) -> DownloadTarget {
    DownloadTarget {
        url: download_url(base_url, &file_id, PROCESSED_FOLDER),
        suggested_name: suggested_name(&session.filename, kind),
        folder: PROCESSED_FOLDER.to_string(),
        file_id,
    }
}

/// Output file name for an action run on `original`.
pub fn suggested_name(original: &str, kind: ActionKind) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    match kind {
        ActionKind::ConvertToWord => format!("{stem}.docx"),
        ActionKind::RotatePages => format!("{stem}_rotated.pdf"),
        ActionKind::Encrypt => format!("{stem}_encrypted.pdf"),
        ActionKind::Decrypt => format!("{stem}_decrypted.pdf"),
        _ => format!("{stem}_edited.pdf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UploadInfo;
    use serde_json::json;

    const BASE: &str = "http://svc/api";

    fn session() -> FileSession {
        FileSession::from_upload(UploadInfo {
            file_id: "f1".into(),
            filename: "Report.PDF".into(),
            size: 1024,
            pages: 3,
            is_encrypted: false,
        })
    }

    #[test]
    fn text_result_accepts_page_map() {
        let out = interpret(
            ActionKind::ExtractText,
            json!({"text": {"2": "second", "1": "first"}, "extracted_pages": 2, "total_pages": 3}),
            &session(),
            BASE,
        )
        .unwrap();
        let rendered = out.render();
        assert!(rendered.find("first").unwrap() < rendered.find("second").unwrap());
        assert_eq!(out.headline(), "Extracted text from 2 pages");
    }

    #[test]
    fn text_result_accepts_plain_string() {
        let out = interpret(
            ActionKind::ExtractTextClean,
            json!({"text": "all of it", "extracted_pages": 1}),
            &session(),
            BASE,
        )
        .unwrap();
        assert_eq!(out.render(), "all of it");
    }

    #[test]
    fn tables_render_with_null_cells() {
        let out = interpret(
            ActionKind::ExtractTables,
            json!({"total_tables": 1, "tables": {
                "1": [],
                "3": [{"row_count": 2, "col_count": 2, "data": [["a", "b"], [null, "d"]]}]
            }}),
            &session(),
            BASE,
        )
        .unwrap();
        let r = out.render();
        assert!(r.contains("page 3, table 1 (2 rows × 2 cols)"), "got: {r}");
        assert!(r.contains("| a | b |"));
        assert!(r.contains("|  | d |"));
        assert!(!r.contains("page 1,"));
    }

    #[test]
    fn images_saved_to_custom_path() {
        let out = interpret(
            ActionKind::ExtractImages,
            json!({"total_images": 2, "saved_to_custom_path": true, "export_path": "/srv/img", "images": []}),
            &session(),
            BASE,
        )
        .unwrap();
        match out {
            ActionOutcome::Images(i) => assert_eq!(i.saved_to.as_deref(), Some("/srv/img")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn images_not_saved_list_download_urls() {
        let out = interpret(
            ActionKind::ExtractImages,
            json!({"total_images": 1, "saved_to_custom_path": false, "export_path": null, "images": [
                {"filename": "p1_0.png", "page": 1, "size": 2048, "format": "png",
                 "thumbnail": "thumb_p1_0.png", "path": "/tmp/x y.png"}
            ]}),
            &session(),
            BASE,
        )
        .unwrap();
        let ActionOutcome::Images(i) = out else {
            panic!("expected images");
        };
        assert!(i.saved_to.is_none());
        let img = &i.images[0];
        assert_eq!(img.thumbnail_url.as_deref(), Some("http://svc/api/images/thumb_p1_0.png"));
        assert_eq!(
            img.download_url.as_deref(),
            Some("http://svc/api/download-image?path=%2Ftmp%2Fx%20y.png")
        );
    }

    #[test]
    fn rotate_result_becomes_download() {
        let out = interpret(
            ActionKind::RotatePages,
            json!({"output_file_id": "out9", "rotated_pages": 1}),
            &session(),
            BASE,
        )
        .unwrap();
        let target = out.download_target().unwrap();
        assert_eq!(
            target.url,
            "http://svc/api/download/out9?folder=processed&delete_after=true"
        );
        assert_eq!(target.suggested_name, "Report_rotated.pdf");
        assert_eq!(out.headline(), "Rotated 1 pages");
    }

    #[test]
    fn missing_output_id_is_unexpected() {
        let err = interpret(ActionKind::Decrypt, json!({}), &session(), BASE).unwrap_err();
        assert!(matches!(err, WorkbenchError::UnexpectedResult { .. }));
        assert!(err.to_string().contains("output_file_id"));
    }

    #[test]
    fn null_result_is_unexpected() {
        let err = interpret(ActionKind::Encrypt, Value::Null, &session(), BASE).unwrap_err();
        assert!(err.to_string().contains("no result"));
    }

    #[test]
    fn convert_distinguishes_saved_and_download() {
        let saved = interpret(
            ActionKind::ConvertToWord,
            json!({"saved_to_local": true, "saved_path": "/srv/out/Report.docx", "output_file_id": null}),
            &session(),
            BASE,
        )
        .unwrap();
        assert_eq!(
            saved,
            ActionOutcome::SavedOnServer {
                path: "/srv/out/Report.docx".into()
            }
        );

        let dl = interpret(
            ActionKind::ConvertToWord,
            json!({"saved_to_local": false, "saved_path": null, "output_file_id": "w1"}),
            &session(),
            BASE,
        )
        .unwrap();
        assert_eq!(dl.download_target().unwrap().suggested_name, "Report.docx");

        let broken = interpret(
            ActionKind::ConvertToWord,
            json!({"saved_to_local": true}),
            &session(),
            BASE,
        );
        assert!(broken.is_err());
    }

    #[test]
    fn suggested_name_falls_back_for_odd_names() {
        assert_eq!(suggested_name("", ActionKind::Encrypt), "document_encrypted.pdf");
        assert_eq!(suggested_name("a.b.pdf", ActionKind::DeletePages), "a.b_edited.pdf");
    }
}
