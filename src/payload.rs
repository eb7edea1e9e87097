//! Callback payload encoding: the string that round-trips through the
//! transport between "prompt sent" and "choice tapped".
//!
//! The payload crosses a trust boundary — it comes back from the outside
//! world attached to a button tap — so it is a versioned, tagged structure
//! parsed defensively, never positional string-splitting. Malformed,
//! wrong-version, or unknown-token payloads are rejected before any session
//! state is touched, and a rejected payload is never used to index storage.

use crate::error::Img2AnyError;
use crate::format::TargetFormat;
use crate::registry::JobId;
use serde::{Deserialize, Serialize};

/// Current wire version. Bumped whenever the payload shape changes, so a
/// stale button from a previous deployment is rejected cleanly instead of
/// being misread.
const PAYLOAD_VERSION: u8 = 1;

/// The decoded payload of a selection event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    pub job_id: JobId,
    pub target: TargetFormat,
}

/// Wire shape. Field names are short and the job id uses the 32-character
/// simple uuid form because some transports cap callback payloads at
/// 64 bytes.
#[derive(Serialize, Deserialize)]
struct WirePayload {
    v: u8,
    job: String,
    fmt: String,
}

/// Encode a selection payload for one choice button.
pub fn encode(job_id: JobId, target: TargetFormat) -> String {
    let wire = WirePayload {
        v: PAYLOAD_VERSION,
        job: job_id.as_uuid().simple().to_string(),
        fmt: target.token().to_string(),
    };
    // Serialization of a flat struct with no maps cannot fail.
    serde_json::to_string(&wire).unwrap_or_default()
}

/// Decode and validate a callback payload.
///
/// # Errors
/// [`Img2AnyError::MalformedPayload`] when the string is not valid JSON,
/// carries an unknown version, or names a format token outside the
/// enumerated set.
pub fn decode(raw: &str) -> Result<FormatSelection, Img2AnyError> {
    let wire: WirePayload =
        serde_json::from_str(raw).map_err(|e| Img2AnyError::MalformedPayload {
            detail: format!("not a valid payload: {e}"),
        })?;

    if wire.v != PAYLOAD_VERSION {
        return Err(Img2AnyError::MalformedPayload {
            detail: format!("unsupported payload version {}", wire.v),
        });
    }

    let job = uuid::Uuid::parse_str(&wire.job).map_err(|_| Img2AnyError::MalformedPayload {
        detail: "job id is not a valid uuid".into(),
    })?;

    let target =
        TargetFormat::from_token(&wire.fmt).ok_or_else(|| Img2AnyError::MalformedPayload {
            detail: format!("unknown format token '{}'", wire.fmt),
        })?;

    Ok(FormatSelection {
        job_id: JobId::from_uuid(job),
        target,
    })
}
