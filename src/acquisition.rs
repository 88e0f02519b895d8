use crate::config::{AcquisitionConfig, InvalidInputPolicy};
use crate::error::AcquisitionError;
use crate::image_asset::ImageAsset;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use std::path::Path;
use tracing::instrument;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A file as handed over by either input channel, before validation.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub bytes: Bytes,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    DragEnter,
    DragOver,
    DragLeave,
    Drop(Vec<FileInput>),
    FilePicked(Vec<FileInput>),
}

/// A validated image selection waiting for its display encoding.
#[derive(Debug, Clone)]
pub struct ImageChosen {
    pub bytes: Bytes,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTicket(u64);

#[derive(Debug)]
pub struct PendingConversion {
    pub ticket: ConversionTicket,
    pub chosen: ImageChosen,
}

#[derive(Debug)]
pub struct InputAcquisition {
    dragging: bool,
    latest_ticket: u64,
    policy: InvalidInputPolicy,
}

impl InputAcquisition {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            dragging: false,
            latest_ticket: 0,
            policy: config.invalid_input,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Returns the conversion to run for a valid image, `None` when the event
    /// selects nothing, or a validation error under the `surface` policy.
    pub fn handle(
        &mut self,
        event: InputEvent,
    ) -> Result<Option<PendingConversion>, AcquisitionError> {
        match event {
            InputEvent::DragEnter => {
                self.dragging = true;
                Ok(None)
            }
            InputEvent::DragOver => Ok(None),
            InputEvent::DragLeave => {
                self.dragging = false;
                Ok(None)
            }
            InputEvent::Drop(files) => {
                self.dragging = false;
                self.choose(files)
            }
            InputEvent::FilePicked(files) => self.choose(files),
        }
    }

    fn choose(
        &mut self,
        files: Vec<FileInput>,
    ) -> Result<Option<PendingConversion>, AcquisitionError> {
        let Some(file) = files.into_iter().next() else {
            return Ok(None);
        };
        let Some(chosen) = self.validate(file)? else {
            return Ok(None);
        };

        Ok(Some(PendingConversion {
            ticket: self.reserve(),
            chosen,
        }))
    }

    fn validate(&self, file: FileInput) -> Result<Option<ImageChosen>, AcquisitionError> {
        if !file.mime_type.starts_with("image/") {
            tracing::debug!(
                filename = %file.filename,
                mime_type = %file.mime_type,
                "Ignoring non-image input"
            );
            return match self.policy {
                InvalidInputPolicy::Silent => Ok(None),
                InvalidInputPolicy::Surface => Err(AcquisitionError::NotAnImage {
                    filename: file.filename,
                    mime_type: file.mime_type,
                }),
            };
        }

        Ok(Some(ImageChosen {
            bytes: file.bytes,
            filename: file.filename,
            mime_type: file.mime_type,
        }))
    }

    /// Claims the next ticket. Every read or conversion issued before it is
    /// superseded from here on.
    pub fn reserve(&mut self) -> ConversionTicket {
        self.latest_ticket += 1;
        ConversionTicket(self.latest_ticket)
    }

    /// Supersedes every outstanding read and conversion without selecting
    /// anything new.
    pub fn invalidate(&mut self) {
        self.latest_ticket += 1;
    }

    pub fn is_current(&self, ticket: ConversionTicket) -> bool {
        ticket.0 == self.latest_ticket
    }

    /// Validates a file read under a reserved ticket. The drag state was
    /// settled when the read was issued and is left alone.
    pub fn complete(
        &mut self,
        ticket: ConversionTicket,
        file: FileInput,
    ) -> Result<Option<PendingConversion>, AcquisitionError> {
        if !self.is_current(ticket) {
            tracing::debug!(filename = %file.filename, "Discarding superseded file read");
            return Ok(None);
        }

        Ok(self
            .validate(file)?
            .map(|chosen| PendingConversion { ticket, chosen }))
    }

    /// Latest wins: only the most recently issued conversion may become the
    /// active image.
    pub fn accept(&self, ticket: ConversionTicket, asset: ImageAsset) -> Option<ImageAsset> {
        if ticket.0 == self.latest_ticket {
            Some(asset)
        } else {
            tracing::debug!(
                filename = asset.source_filename(),
                "Discarding superseded conversion"
            );
            None
        }
    }
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

#[instrument(skip(chosen), fields(filename = %chosen.filename, len = chosen.bytes.len()))]
pub async fn convert(chosen: ImageChosen) -> Result<ImageAsset, AcquisitionError> {
    tokio::task::spawn_blocking(move || {
        let display_encoding = encode_data_uri(&chosen.mime_type, &chosen.bytes);
        ImageAsset::new(
            chosen.bytes,
            display_encoding,
            chosen.filename,
            chosen.mime_type,
        )
    })
    .await
    .map_err(|e| AcquisitionError::Encoding(e.to_string()))
}

/// Reads a picked or dropped path, guessing its MIME type from the extension.
pub async fn read_file(path: &Path) -> Result<FileInput, AcquisitionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AcquisitionError::Read {
            path: path.display().to_string(),
            source,
        })?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string();

    Ok(FileInput {
        bytes: Bytes::from(bytes),
        filename,
        mime_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime_type: &str) -> FileInput {
        FileInput {
            bytes: Bytes::from_static(b"\xff\xd8\xff"),
            filename: name.into(),
            mime_type: mime_type.into(),
        }
    }

    fn acquisition(policy: InvalidInputPolicy) -> InputAcquisition {
        InputAcquisition::new(&AcquisitionConfig {
            invalid_input: policy,
        })
    }

    #[test]
    fn test_drag_state_is_idempotent() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);

        acquisition.handle(InputEvent::DragEnter).unwrap();
        acquisition.handle(InputEvent::DragEnter).unwrap();
        acquisition.handle(InputEvent::DragOver).unwrap();
        assert!(acquisition.is_dragging());

        acquisition.handle(InputEvent::DragLeave).unwrap();
        assert!(!acquisition.is_dragging());

        acquisition.handle(InputEvent::DragEnter).unwrap();
        acquisition.handle(InputEvent::Drop(vec![])).unwrap();
        assert!(!acquisition.is_dragging());
    }

    #[test]
    fn test_valid_drop_and_pick_are_unified() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);

        let dropped = acquisition
            .handle(InputEvent::Drop(vec![file("a.png", "image/png")]))
            .unwrap()
            .unwrap();
        let picked = acquisition
            .handle(InputEvent::FilePicked(vec![file("b.jpg", "image/jpeg")]))
            .unwrap()
            .unwrap();

        assert_eq!(dropped.chosen.filename, "a.png");
        assert_eq!(dropped.chosen.mime_type, "image/png");
        assert_eq!(picked.chosen.filename, "b.jpg");
        assert_ne!(dropped.ticket, picked.ticket);
    }

    #[test]
    fn test_only_first_file_is_used() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);

        let pending = acquisition
            .handle(InputEvent::FilePicked(vec![
                file("first.jpg", "image/jpeg"),
                file("second.jpg", "image/jpeg"),
            ]))
            .unwrap()
            .unwrap();

        assert_eq!(pending.chosen.filename, "first.jpg");
    }

    #[test]
    fn test_non_image_is_silently_ignored() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);

        let outcome = acquisition
            .handle(InputEvent::Drop(vec![file("notes.pdf", "application/pdf")]))
            .unwrap();

        assert!(outcome.is_none());
    }

    #[test]
    fn test_non_image_is_surfaced_when_configured() {
        let mut acquisition = acquisition(InvalidInputPolicy::Surface);

        let err = acquisition
            .handle(InputEvent::FilePicked(vec![file("clip.mp4", "video/mp4")]))
            .unwrap_err();

        assert!(matches!(
            err,
            AcquisitionError::NotAnImage { ref mime_type, .. } if mime_type == "video/mp4"
        ));
    }

    #[tokio::test]
    async fn test_latest_conversion_wins() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);
        let first = acquisition
            .handle(InputEvent::FilePicked(vec![file("a.jpg", "image/jpeg")]))
            .unwrap()
            .unwrap();
        let second = acquisition
            .handle(InputEvent::FilePicked(vec![file("b.jpg", "image/jpeg")]))
            .unwrap()
            .unwrap();
        // a rejected input must not supersede a pending valid one
        acquisition
            .handle(InputEvent::FilePicked(vec![file("x.txt", "text/plain")]))
            .unwrap();

        let first_asset = convert(first.chosen).await.unwrap();
        let second_asset = convert(second.chosen).await.unwrap();

        assert!(acquisition.accept(first.ticket, first_asset).is_none());
        let accepted = acquisition.accept(second.ticket, second_asset).unwrap();
        assert_eq!(accepted.source_filename(), "b.jpg");
    }

    #[tokio::test]
    async fn test_invalidate_discards_pending_conversion() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);
        let pending = acquisition
            .handle(InputEvent::FilePicked(vec![file("a.jpg", "image/jpeg")]))
            .unwrap()
            .unwrap();

        acquisition.invalidate();

        let asset = convert(pending.chosen).await.unwrap();
        assert!(acquisition.accept(pending.ticket, asset).is_none());
    }

    #[tokio::test]
    async fn test_reserved_read_orders_by_issue_time() {
        let mut acquisition = acquisition(InvalidInputPolicy::Silent);
        let read_ticket = acquisition.reserve();
        let picked = acquisition
            .handle(InputEvent::FilePicked(vec![file("b.jpg", "image/jpeg")]))
            .unwrap()
            .unwrap();

        // the read issued first lands last
        let late = acquisition
            .complete(read_ticket, file("a.jpg", "image/jpeg"))
            .unwrap();
        assert!(late.is_none());

        let asset = convert(picked.chosen).await.unwrap();
        let accepted = acquisition.accept(picked.ticket, asset).unwrap();
        assert_eq!(accepted.source_filename(), "b.jpg");
    }

    #[test]
    fn test_complete_validates_and_keeps_drag_state() {
        let mut acquisition = acquisition(InvalidInputPolicy::Surface);
        acquisition.handle(InputEvent::Drop(vec![])).unwrap();
        let ticket = acquisition.reserve();
        acquisition.handle(InputEvent::DragEnter).unwrap();

        let pending = acquisition
            .complete(ticket, file("a.webp", "image/webp"))
            .unwrap()
            .unwrap();
        assert_eq!(pending.ticket, ticket);
        assert!(acquisition.is_dragging());

        let ticket = acquisition.reserve();
        let err = acquisition
            .complete(ticket, file("notes.txt", "text/plain"))
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn test_convert_builds_data_uri() {
        let chosen = ImageChosen {
            bytes: Bytes::from_static(b"hello"),
            filename: "hello.png".into(),
            mime_type: "image/png".into(),
        };

        let asset = convert(chosen).await.unwrap();

        assert_eq!(asset.display_encoding(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(&asset.raw_bytes()[..], b"hello");
        assert_eq!(asset.source_filename(), "hello.png");
    }

    #[tokio::test]
    async fn test_read_file_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("civic.jpeg");
        let text = dir.path().join("readme.txt");
        std::fs::write(&jpeg, b"\xff\xd8\xff").unwrap();
        std::fs::write(&text, b"not a car").unwrap();

        let jpeg = read_file(&jpeg).await.unwrap();
        let text = read_file(&text).await.unwrap();

        assert_eq!(jpeg.filename, "civic.jpeg");
        assert_eq!(jpeg.mime_type, "image/jpeg");
        assert_eq!(text.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let err = read_file(&dir.path().join("gone.jpg")).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::Read { .. }));
    }
}
