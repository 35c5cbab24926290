//! Recording files and download sinks

use super::format::RecordingFormat;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// A finished recording held in memory
#[derive(Debug, Clone)]
pub struct RecordingFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl RecordingFile {
    /// Join buffered chunks into one file named after the stop time
    pub fn assemble(chunks: Vec<Vec<u8>>, format: &RecordingFormat, at: DateTime<Utc>) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }

        Self {
            filename: recording_filename(format, at),
            mime_type: format.mime_type.clone(),
            data,
        }
    }
}

/// `recording-<ISO-8601 timestamp>.<ext>`, with `:` replaced so the name is
/// valid on every file system
pub fn recording_filename(format: &RecordingFormat, at: DateTime<Utc>) -> String {
    format!(
        "recording-{}.{}",
        at.format("%Y-%m-%dT%H-%M-%S%.3fZ"),
        format.extension()
    )
}

/// Destination of finished recordings
pub trait DownloadSink: Send + Sync {
    /// Persist the file and return where it ended up
    fn save(&self, file: &RecordingFile) -> std::io::Result<PathBuf>;
}

/// Writes recordings into a directory
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn save(&self, file: &RecordingFile) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(&file.filename);
        fs::write(&path, &file.data)?;

        tracing::info!(
            "Saved recording {:?} ({} bytes, {})",
            path,
            file.data.len(),
            file.mime_type
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_filename_uses_container_extension() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 30, 5).unwrap();

        let webm = RecordingFormat::new("video/webm;codecs=vp9,opus");
        assert_eq!(
            recording_filename(&webm, at),
            "recording-2026-10-17T12-30-05.000Z.webm"
        );

        let mp4 = RecordingFormat::new("video/mp4");
        assert_eq!(
            recording_filename(&mp4, at),
            "recording-2026-10-17T12-30-05.000Z.mp4"
        );
    }

    #[test]
    fn test_assemble_joins_chunks_in_order() {
        let format = RecordingFormat::new("video/webm");
        let file = RecordingFile::assemble(
            vec![b"ab".to_vec(), Vec::new(), b"cd".to_vec()],
            &format,
            Utc::now(),
        );
        assert_eq!(file.data, b"abcd");
        assert_eq!(file.mime_type, "video/webm");
    }

    #[test]
    fn test_directory_downloads_creates_dir() {
        let dir = tempdir().unwrap();
        let sink = DirectoryDownloads::new(dir.path().join("nested/downloads"));
        let file = RecordingFile {
            filename: "recording-test.webm".to_string(),
            mime_type: "video/webm".to_string(),
            data: vec![1, 2, 3],
        };

        let path = sink.save(&file).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert!(path.starts_with(sink.dir()));
    }
}
