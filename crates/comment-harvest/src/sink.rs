//! JSON capture sink: the admitted pages as one UTF-8 JSON array.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::types::{CommentablePage, HarvestResult};

/// Write all pages in one go, creating parent directories as needed.
pub fn write_pages(path: &Path, pages: &[CommentablePage]) -> HarvestResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, pages)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::info!("wrote {} pages to {}", pages.len(), path.display());
    Ok(())
}

/// Load a previously written sink.
pub fn read_pages(path: &Path) -> HarvestResult<Vec<CommentablePage>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_keeps_order_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let pages = vec![
            CommentablePage::new(json!({"id": "1", "comments": {"edges": [{"node": {"body": "héllo 👋"}}]}})),
            CommentablePage::new(json!({"id": "2"})),
        ];
        write_pages(&path, &pages).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with('['));
        assert!(text.contains("héllo 👋"));

        let back = read_pages(&path).unwrap();
        assert_eq!(back, pages);
    }

    #[test]
    fn test_empty_collection_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_pages(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_pages(Path::new("/nonexistent/definitely/missing.json")).unwrap_err();
        assert!(matches!(err, crate::types::HarvestError::Io(_)));
    }
}
