//! Side artefacts: page images, the char-count manifest, and the report.
//!
//! None of these files are read back by the run. JSON files are written to a
//! sibling `*.tmp` path and renamed into place so a crash never leaves a
//! truncated report behind.

use crate::config::PageImageFormat;
use crate::error::BenchError;
use crate::pipeline::paginate::{Document, Page};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name for page `number`, e.g. `page3.jpg`.
pub fn page_file_name(number: usize, format: PageImageFormat) -> String {
    format!("page{}.{}", number, format.extension())
}

/// Write every page into `dir` (created if missing). Returns the written paths.
pub fn persist_pages(
    pages: &[Page],
    dir: &Path,
    format: PageImageFormat,
) -> Result<Vec<PathBuf>, BenchError> {
    std::fs::create_dir_all(dir).map_err(|e| BenchError::OutputDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let path = dir.join(page_file_name(page.number(), format));
        page.image()
            .save_with_format(&path, format.as_image_format())
            .map_err(|e| BenchError::ImageWriteFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    info!("Wrote {} page images to {}", written.len(), dir.display());
    Ok(written)
}

/// Write the page-number → character-count manifest.
pub fn write_page_manifest(document: &Document, path: &Path) -> Result<(), BenchError> {
    write_json_atomic(&document.char_counts(), path, 4)
}

/// Serialise `value` as indented JSON and move it into place at `path`.
pub fn write_json_atomic<T: Serialize>(
    value: &T,
    path: &Path,
    indent: usize,
) -> Result<(), BenchError> {
    let body = to_json_indented(value, indent).map_err(|e| BenchError::ReportSerializeFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BenchError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, body).map_err(|e| BenchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| BenchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

fn to_json_indented<T: Serialize>(value: &T, indent: usize) -> Result<Vec<u8>, serde_json::Error> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageGeometry;
    use crate::pipeline::paginate::paginate;
    use crate::pipeline::render::tests::test_font;
    use std::collections::BTreeMap;

    #[test]
    fn page_file_names() {
        assert_eq!(page_file_name(1, PageImageFormat::Jpeg), "page1.jpg");
        assert_eq!(page_file_name(12, PageImageFormat::Png), "page12.png");
    }

    #[test]
    fn json_uses_requested_indent_and_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        let counts: BTreeMap<usize, usize> = [(1, 120), (2, 42)].into_iter().collect();

        write_json_atomic(&counts, &path, 4).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("\n    \"1\": 120"), "got: {body}");
        let parsed: BTreeMap<String, usize> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["2"], 42);
        assert!(!dir.path().join("pages.json.tmp").exists());
    }

    #[test]
    fn json_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/results.json");
        write_json_atomic(&serde_json::json!({"ok": true}), &path, 2).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn persist_writes_one_file_per_page() {
        let Some(font) = test_font(9.0) else {
            println!("SKIP — no system font found; set PAGEBENCH_TEST_FONT");
            return;
        };
        let geometry = PageGeometry {
            width: 200,
            height: 120,
            ..PageGeometry::default()
        };
        let doc = paginate(&"word ".repeat(400), &geometry, &font).unwrap();
        assert!(doc.len() > 1);

        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let written = persist_pages(doc.pages(), &images, PageImageFormat::Png).unwrap();

        assert_eq!(written.len(), doc.len());
        for (i, path) in written.iter().enumerate() {
            assert_eq!(path.file_name().unwrap(), format!("page{}.png", i + 1).as_str());
            let img = image::open(path).unwrap();
            assert_eq!((img.width(), img.height()), (200, 120));
        }

        let manifest = dir.path().join("pages.json");
        write_page_manifest(&doc, &manifest).unwrap();
        let parsed: BTreeMap<String, usize> =
            serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
        assert_eq!(parsed.len(), doc.len());
    }

    #[test]
    fn persist_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("images");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let err = persist_pages(&[], &blocker, PageImageFormat::Jpeg).unwrap_err();
        assert!(matches!(err, BenchError::OutputDirFailed { .. }));
    }
}
