//! Queue message payload.

use serde::{Deserialize, Serialize};

use mailfit_models::{Provider, UploadId};

/// Snapshot of the fields the worker needs to start a job, taken at
/// enqueue time.
///
/// The job record, not this snapshot, is the source of truth: the record
/// may change between enqueue and pickup (an email correction, say), so
/// consumers treat `email` as a hint and fall back to a live lookup.
/// Every field except `upload_id` tolerates absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressMessage {
    /// Upload identifier; keys, record and scratch names derive from it
    pub upload_id: UploadId,

    /// Original filename, used for the download disposition
    #[serde(default)]
    pub filename: String,

    /// Source duration in seconds
    #[serde(default)]
    pub duration_sec: f64,

    /// Source size in bytes
    #[serde(default)]
    pub size_bytes: u64,

    /// Destination provider class
    #[serde(default)]
    pub provider: Provider,

    /// Owner email snapshot; may be empty
    #[serde(default)]
    pub email: String,

    /// Paid priority flag (advisory only)
    #[serde(default)]
    pub priority: bool,
}

impl CompressMessage {
    /// Filename to present in the download disposition and the email.
    pub fn attachment_name(&self) -> &str {
        if self.filename.trim().is_empty() {
            "video.mp4"
        } else {
            &self.filename
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_message_round_trip() {
        let message = CompressMessage {
            upload_id: UploadId::from_string("abc-123"),
            filename: "holiday.mp4".to_string(),
            duration_sec: 45.0,
            size_bytes: 105_000_000,
            provider: Provider::Gmail,
            email: "user@example.com".to_string(),
            priority: true,
        };

        let json = serde_json::to_string(&message).unwrap();
        let parsed: CompressMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_minimal_message_gets_defaults() {
        let parsed: CompressMessage =
            serde_json::from_str(r#"{"upload_id":"abc-123"}"#).unwrap();

        assert_eq!(parsed.upload_id.as_str(), "abc-123");
        assert_eq!(parsed.provider, Provider::Other);
        assert_eq!(parsed.duration_sec, 0.0);
        assert!(parsed.email.is_empty());
        assert!(!parsed.priority);
    }

    #[test]
    fn test_unknown_provider_degrades() {
        let parsed: CompressMessage =
            serde_json::from_str(r#"{"upload_id":"x","provider":"fastmail"}"#).unwrap();
        assert_eq!(parsed.provider, Provider::Other);
    }

    #[test]
    fn test_missing_upload_id_is_rejected() {
        let result = serde_json::from_str::<CompressMessage>(r#"{"filename":"a.mp4"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_attachment_name_fallback() {
        let mut message: CompressMessage =
            serde_json::from_str(r#"{"upload_id":"x"}"#).unwrap();
        assert_eq!(message.attachment_name(), "video.mp4");

        message.filename = "clip.mp4".to_string();
        assert_eq!(message.attachment_name(), "clip.mp4");
    }
}
