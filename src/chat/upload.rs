use super::model::{Attachment, AttachmentKind, MAX_ATTACHMENTS};
use super::ChatError;
use crate::api::ApiClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A file picked on the device, not yet uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub path: PathBuf,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
            filename: None,
        }
    }

    pub fn resolved_filename(&self) -> String {
        self.filename
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "file".to_string())
    }

    pub fn resolved_mime(&self) -> String {
        self.mime_type
            .clone()
            .filter(|m| m.contains('/'))
            .unwrap_or_else(|| guess_mime(&self.path))
    }
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn guess_mime(path: &Path) -> String {
    new_mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub fn check_attachment_count(count: usize) -> Result<(), ChatError> {
    if count > MAX_ATTACHMENTS {
        return Err(ChatError::TooManyAttachments {
            count,
            max: MAX_ATTACHMENTS,
        });
    }
    Ok(())
}

/// File contents plus the metadata the upload endpoint needs.
#[derive(Debug)]
pub struct PreparedFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl PreparedFile {
    pub async fn read(file: &LocalFile) -> Result<Self, ChatError> {
        let bytes = tokio::fs::read(&file.path).await?;
        Ok(Self {
            bytes,
            filename: file.resolved_filename(),
            mime_type: file.resolved_mime(),
        })
    }
}

/// Turns local files into hosted attachments before a message is composed.
#[derive(Debug, Clone)]
pub struct AttachmentUploader {
    api: ApiClient,
}

impl AttachmentUploader {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn upload(&self, file: &LocalFile) -> Result<Attachment, ChatError> {
        let prepared = PreparedFile::read(file).await?;
        let size = prepared.bytes.len() as u64;
        let uploaded = self
            .api
            .upload_attachment(prepared.bytes, &prepared.filename, &prepared.mime_type)
            .await
            .inspect_err(|e| warn!(file = %prepared.filename, error = %e, "attachment upload failed"))?;
        info!(file = %prepared.filename, size, "attachment uploaded");
        Ok(Attachment {
            kind: AttachmentKind::from_mime(&prepared.mime_type),
            url: uploaded.url,
            filename: prepared.filename,
            mime_type: prepared.mime_type,
            size: Some(size),
            thumbnail: uploaded.thumbnail,
        })
    }

    /// Uploads in order. Rejects more than five files before touching the
    /// network; stops at the first failure.
    pub async fn upload_all(&self, files: &[LocalFile]) -> Result<Vec<Attachment>, ChatError> {
        check_attachment_count(files.len())?;
        let mut attachments = Vec::with_capacity(files.len());
        for file in files {
            attachments.push(self.upload(file).await?);
        }
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use std::io::Write;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("lecture.mp4")), "video/mp4");
        assert_eq!(guess_mime(Path::new("diagram.svg")), "image/svg+xml");
        assert_eq!(guess_mime(Path::new("grades.csv")), "text/csv");
        assert_eq!(guess_mime(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn test_guessed_kinds() {
        let kind = |name: &str| AttachmentKind::from_mime(&guess_mime(Path::new(name)));
        assert_eq!(kind("podcast.ogg"), AttachmentKind::Audio);
        assert_eq!(kind("recording.mkv"), AttachmentKind::Video);
        assert_eq!(kind("slides.pptx"), AttachmentKind::Document);
    }

    #[test]
    fn test_resolved_metadata() {
        let file = LocalFile::new("/tmp/voice.m4a");
        assert_eq!(file.resolved_filename(), "voice.m4a");
        assert!(file.resolved_mime().starts_with("audio/"));

        let declared = LocalFile {
            path: "/tmp/blob".into(),
            mime_type: Some("image/png".into()),
            filename: Some("screenshot.png".into()),
        };
        assert_eq!(declared.resolved_filename(), "screenshot.png");
        assert_eq!(declared.resolved_mime(), "image/png");
    }

    #[tokio::test]
    async fn test_more_than_five_rejected_before_upload() {
        // unroutable base url: any network attempt would fail differently
        let uploader = AttachmentUploader::new(ApiClient::new(ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            token: None,
        }));
        let files: Vec<LocalFile> = (0..6)
            .map(|i| LocalFile::new(format!("/nonexistent/{i}.png")))
            .collect();
        let err = uploader.upload_all(&files).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::TooManyAttachments { count: 6, max: 5 }
        ));
    }

    #[tokio::test]
    async fn test_prepare_reads_file() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4").unwrap();
        let prepared = PreparedFile::read(&LocalFile::new(tmp.path())).await.unwrap();
        assert_eq!(prepared.bytes, b"%PDF-1.4");
        assert_eq!(prepared.mime_type, "application/pdf");
        assert!(prepared.filename.ends_with(".pdf"));
    }
}
