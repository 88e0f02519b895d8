use bytes::Bytes;
use std::fmt;

/// One user-selected photograph together with its displayable encoding.
///
/// Immutable once built. Cloning is cheap for the payload (`Bytes` is
/// reference counted) but copies the data URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    raw_bytes: Bytes,
    display_encoding: String,
    source_filename: String,
    mime_type: String,
}

impl ImageAsset {
    pub fn new(
        raw_bytes: Bytes,
        display_encoding: String,
        source_filename: String,
        mime_type: String,
    ) -> Self {
        Self {
            raw_bytes,
            display_encoding,
            source_filename,
            mime_type,
        }
    }

    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    /// `data:<mime>;base64,<payload>`
    pub fn display_encoding(&self) -> &str {
        &self.display_encoding
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

// Keep the payload and the data URI out of logs.
impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("source_filename", &self.source_filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.raw_bytes.len())
            .finish()
    }
}
