//! Completed recordings.

/// Broad kind of a recording, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio-only recording.
    Audio,
    /// Video (with or without audio).
    Video,
}

impl MediaKind {
    /// Returns the lowercase name used in file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// File extension used when saving this kind.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "webm",
        }
    }
}

/// An in-memory recording: the concatenated chunks plus their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    /// Raw encoded media.
    pub data: Vec<u8>,
    /// Negotiated MIME type, e.g. `video/webm;codecs=vp9,opus`.
    pub mime_type: String,
}

impl MediaBlob {
    /// Concatenates chunks into one blob.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: chunks.concat(),
            mime_type: mime_type.into(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the blob holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Audio if the MIME type mentions audio, otherwise video.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        if self.mime_type.contains("audio") {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}
