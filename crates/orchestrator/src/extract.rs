use std::path::Path;

use async_trait::async_trait;

/// Document text extraction capability. A real deployment plugs in an OCR
/// engine here; the default implementation only reads text formats verbatim.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Best-effort plain text for the file. Empty on failure or for formats
    /// the extractor cannot handle.
    async fn extract(&self, path: &Path) -> String;

    /// Rendered page images (data URLs) for paged documents such as PDFs.
    async fn page_images(&self, path: &Path) -> Vec<String>;
}

pub(crate) fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reads text files verbatim; everything else yields empty text. Images are
/// intentionally left blank, they are handled visually by the describer.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> String {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match extension(name).as_str() {
            "txt" | "csv" | "json" | "xml" => {
                tokio::fs::read_to_string(path).await.unwrap_or_default()
            }
            _ => String::new(),
        }
    }

    async fn page_images(&self, _path: &Path) -> Vec<String> {
        Vec::new()
    }
}
