//! Persistence of finished recordings.

use crate::models::{MediaBlob, UserId};
use crate::storage::{RECORDINGS_BUCKET, RemoteStore, UploadOptions};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a recording ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRecording {
    /// Local file.
    pub local_path: PathBuf,
    /// Object path in the recordings bucket, when the backup succeeded.
    pub remote_path: Option<String>,
}

/// Saves recordings locally and backs them up to the store.
#[derive(Clone)]
pub struct RecordingArchiver {
    store: Arc<dyn RemoteStore>,
    download_dir: PathBuf,
    upload: bool,
}

impl RecordingArchiver {
    /// Creates an archiver that saves recordings locally and uploads them.
    ///
    /// # Arguments
    ///
    /// * `store` - Remote store receiving uploads in the `recordings` bucket
    /// * `download_dir` - Directory local copies are written to; created on
    ///   first save
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            download_dir: download_dir.into(),
            upload: true,
        }
    }

    /// Enables or disables the remote backup.
    #[must_use]
    pub const fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    /// Directory local copies are written to.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Writes `blob` to the download directory, then uploads a backup.
    ///
    /// The backup needs a user and is best effort: its failure is logged and
    /// reported as `remote_path: None`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the local file cannot be written.
    pub fn archive(&self, blob: &MediaBlob, user: Option<&UserId>) -> Result<ArchivedRecording> {
        let kind = blob.kind();
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
        let file_name = format!(
            "emergency-{}-{timestamp}.{}",
            kind.as_str(),
            kind.extension()
        );

        std::fs::create_dir_all(&self.download_dir).map_err(|e| {
            Error::operation(
                "create_download_dir",
                format!("{}: {e}", self.download_dir.display()),
            )
        })?;
        let local_path = self.download_dir.join(&file_name);
        std::fs::write(&local_path, &blob.data).map_err(|e| {
            Error::operation("save_recording", format!("{}: {e}", local_path.display()))
        })?;
        tracing::info!(
            path = %local_path.display(),
            bytes = blob.len(),
            mime_type = %blob.mime_type,
            "Recording saved locally"
        );

        let remote_path = match user {
            Some(user) if self.upload => {
                let path = format!(
                    "recordings/{user}/{}-{timestamp}.{}",
                    kind.as_str(),
                    kind.extension()
                );
                self.backup(blob, &path).then_some(path)
            },
            _ => None,
        };

        Ok(ArchivedRecording {
            local_path,
            remote_path,
        })
    }

    fn backup(&self, blob: &MediaBlob, path: &str) -> bool {
        let options = UploadOptions {
            content_type: blob.mime_type.clone(),
            upsert: true,
        };
        match self
            .store
            .upload(RECORDINGS_BUCKET, path, &blob.data, &options)
        {
            Ok(()) => {
                metrics::counter!("haven_recording_backups_total", "result" => "ok").increment(1);
                tracing::info!(path = %path, "Recording backed up");
                true
            },
            Err(e) => {
                metrics::counter!("haven_recording_backups_total", "result" => "error")
                    .increment(1);
                tracing::warn!(path = %path, error = %e, "Recording backup failed");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn video_blob() -> MediaBlob {
        MediaBlob::from_chunks(vec![vec![1, 2], vec![3]], "video/webm;codecs=vp9,opus")
    }

    #[test]
    fn test_saves_and_uploads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let archiver = RecordingArchiver::new(store.clone(), dir.path());

        let archived = archiver
            .archive(&video_blob(), Some(&UserId::new("u1")))
            .expect("archive");

        let name = archived
            .local_path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert!(name.starts_with("emergency-video-"));
        assert!(name.ends_with(".webm"));
        assert_eq!(std::fs::read(&archived.local_path).expect("read"), vec![1, 2, 3]);

        let remote = archived.remote_path.expect("uploaded");
        assert!(remote.starts_with("recordings/u1/video-"));
        let object = store.object(RECORDINGS_BUCKET, &remote).expect("object");
        assert_eq!(object.data, vec![1, 2, 3]);
        assert_eq!(object.content_type, "video/webm;codecs=vp9,opus");
    }

    #[test]
    fn test_audio_uses_mp3_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archiver = RecordingArchiver::new(Arc::new(MemoryStore::new()), dir.path());
        let blob = MediaBlob::from_chunks(vec![vec![9]], "audio/webm");
        let archived = archiver.archive(&blob, None).expect("archive");
        assert!(
            archived
                .local_path
                .to_string_lossy()
                .contains("emergency-audio-")
        );
        assert_eq!(
            archived.local_path.extension().and_then(|e| e.to_str()),
            Some("mp3")
        );
        assert!(archived.remote_path.is_none());
    }

    #[test]
    fn test_upload_failure_keeps_local_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new().with_failing_uploads());
        let archiver = RecordingArchiver::new(store, dir.path());

        let archived = archiver
            .archive(&video_blob(), Some(&UserId::new("u1")))
            .expect("local save succeeds");
        assert!(archived.local_path.exists());
        assert!(archived.remote_path.is_none());
    }
}
