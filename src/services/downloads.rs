use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const BUNDLE_FILENAME: &str = "qrcodes.zip";

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("Nothing to download")]
    Empty,

    #[error("Corrupt manifest entry: {0}")]
    CorruptEntry(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One downloadable PNG. The image travels base64-encoded so the manifest
/// can live in the session as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub qrcode_id: String,
    pub filename: String,
    pub png_base64: String,
}

impl DownloadEntry {
    pub fn new(qrcode_id: &str, filename: String, png: &[u8]) -> Self {
        Self {
            qrcode_id: qrcode_id.to_string(),
            filename,
            png_base64: STANDARD.encode(png),
        }
    }

    pub fn png(&self) -> Result<Vec<u8>, DownloadError> {
        STANDARD
            .decode(&self.png_base64)
            .map_err(|e| DownloadError::CorruptEntry(format!("{}: {}", self.filename, e)))
    }
}

/// `{prefix}{index}.png`, with `index` counted from 1.
pub fn download_filename(prefix: &str, index: u32) -> String {
    format!("{}{}.png", prefix, index)
}

/// Images produced by the latest issuance batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub entries: Vec<DownloadEntry>,
}

impl DownloadManifest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DownloadEntry> {
        self.entries.get(index)
    }

    /// Packs every entry into one ZIP archive, in manifest order.
    pub fn bundle_zip(&self) -> Result<Vec<u8>, DownloadError> {
        if self.entries.is_empty() {
            return Err(DownloadError::Empty);
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        // PNG is already compressed.
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for entry in &self.entries {
            zip.start_file(entry.filename.as_str(), options)?;
            zip.write_all(&entry.png()?)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn manifest() -> DownloadManifest {
        DownloadManifest {
            entries: vec![
                DownloadEntry::new("id-1", download_filename("lote", 1), b"first"),
                DownloadEntry::new("id-2", download_filename("lote", 2), b"second"),
            ],
        }
    }

    #[test]
    fn test_filename() {
        assert_eq!(download_filename("promo_", 3), "promo_3.png");
        assert_eq!(download_filename("", 1), "1.png");
    }

    #[test]
    fn test_bundle_contains_entries_in_order() {
        let bytes = manifest().bundle_zip().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        let mut file = archive.by_index(0).unwrap();
        assert_eq!(file.name(), "lote1.png");
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "first");
        drop(file);

        assert_eq!(archive.by_index(1).unwrap().name(), "lote2.png");
    }

    #[test]
    fn test_empty_manifest_has_no_bundle() {
        assert!(matches!(
            DownloadManifest::default().bundle_zip(),
            Err(DownloadError::Empty)
        ));
    }

    #[test]
    fn test_corrupt_entry() {
        let mut manifest = manifest();
        manifest.entries[1].png_base64 = "%%%".to_string();
        assert!(matches!(
            manifest.bundle_zip(),
            Err(DownloadError::CorruptEntry(_))
        ));
    }
}
