//! Error types for the img2any library.
//!
//! The taxonomy mirrors where in the conversion session a failure occurs:
//!
//! * **Intake** — the upload itself is unusable (`UnsupportedSource`,
//!   `UploadTooLarge`, `DownloadFailed`, `DownloadTimeout`). Recovered
//!   locally: the user is notified and no job is created.
//! * **Correlation** — a selection references a job that no longer exists
//!   (`UnknownOrExpiredJob`) or its payload does not parse
//!   (`MalformedPayload`). Recovered locally with a reply, no side effects.
//! * **Codec** — the transcode failed (`CorruptInput`,
//!   `UnsupportedConversion`). The job is marked failed, the user notified,
//!   and artifacts released. The two variants are deliberately distinct:
//!   `CorruptInput` means the bytes lied about their format,
//!   `UnsupportedConversion` means we have no encoder for the request.
//! * **Delivery** — the transport send failed (`DeliveryFailed`). Logged,
//!   the job is still cleaned up; never retried indefinitely.
//!
//! No error class leaves an artifact un-released or a job in a non-terminal
//! state; the orchestrator funnels every path through a single exit function.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the img2any library.
#[derive(Debug, Error)]
pub enum Img2AnyError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The declared mime type does not map to a supported source format.
    #[error("Unsupported source format '{mime}'\nSupported: image/png, image/jpeg, image/gif, image/bmp")]
    UnsupportedSource { mime: String },

    /// The uploaded artifact exceeds the configured size cap.
    #[error("Upload of {size} bytes exceeds the {limit}-byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    /// Remote artifact URL was valid but the download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Remote artifact download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Correlation errors ────────────────────────────────────────────────
    /// A selection referenced a job that is unknown, already handled,
    /// or expired. Idempotent rejection: the loser of a double-tap race
    /// sees this, never a second transcode.
    #[error("This conversion was already handled or has expired. Send the image again to restart.")]
    UnknownOrExpiredJob,

    /// A callback payload failed to parse or carried an unknown version
    /// or format token. The payload round-trips through the transport, so
    /// it is never trusted to index storage directly.
    #[error("Malformed selection payload: {detail}")]
    MalformedPayload { detail: String },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// The source bytes do not decode as the declared source format.
    #[error("The file does not decode as {declared}: {detail}\nMake sure you sent a valid image.")]
    CorruptInput { declared: String, detail: String },

    /// No conversion routine exists for the requested pair.
    #[error("Converting {source} to {target} is not supported")]
    UnsupportedConversion { r#source: String, target: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// An artifact was requested for a job whose storage is already
    /// released (or was never written).
    #[error("Artifact not found for job {job_id} (role: {role})")]
    ArtifactNotFound { job_id: String, role: &'static str },

    /// Reading or writing scratch storage failed.
    #[error("Artifact store I/O error at '{path}': {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Delivery errors ───────────────────────────────────────────────────
    /// The transport rejected a send. The job is still cleaned up.
    #[error("Delivery to chat {chat} failed: {reason}")]
    DeliveryFailed { chat: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Img2AnyError {
    /// True for errors a user can act on by sending a different input.
    ///
    /// Used by the router to decide between a friendly reply and a logged
    /// internal failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Img2AnyError::UnsupportedSource { .. }
                | Img2AnyError::UploadTooLarge { .. }
                | Img2AnyError::UnknownOrExpiredJob
                | Img2AnyError::MalformedPayload { .. }
                | Img2AnyError::CorruptInput { .. }
                | Img2AnyError::UnsupportedConversion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_source_names_the_mime() {
        let e = Img2AnyError::UnsupportedSource {
            mime: "application/pdf".into(),
        };
        assert!(e.to_string().contains("application/pdf"));
        assert!(e.is_user_facing());
    }

    #[test]
    fn corrupt_and_unsupported_are_distinct() {
        let corrupt = Img2AnyError::CorruptInput {
            declared: "png".into(),
            detail: "bad header".into(),
        };
        let unsupported = Img2AnyError::UnsupportedConversion {
            source: "png".into(),
            target: "svg".into(),
        };
        assert_ne!(corrupt.to_string(), unsupported.to_string());
        assert!(corrupt.to_string().contains("decode"));
        assert!(unsupported.to_string().contains("not supported"));
    }

    #[test]
    fn delivery_failure_is_not_user_facing() {
        let e = Img2AnyError::DeliveryFailed {
            chat: "42".into(),
            reason: "socket closed".into(),
        };
        assert!(!e.is_user_facing());
    }
}
