//! Object key and download header conventions shared with the upload API.

use mailfit_models::UploadId;

/// Key of the uploaded source object.
pub fn source_key(upload_id: &UploadId) -> String {
    format!("uploads/{}.mp4", upload_id)
}

/// Key of the compressed result object.
pub fn output_key(upload_id: &UploadId) -> String {
    format!("outputs/{}_compressed.mp4", upload_id)
}

/// `Content-Disposition` value forcing a download under the user's original
/// filename. Quotes, backslashes and control characters are stripped so the
/// header cannot be broken out of; an emptied filename falls back to a
/// generic one.
pub fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let safe = safe.trim();
    let name = if safe.is_empty() { "video.mp4" } else { safe };
    format!("attachment; filename=\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_conventions() {
        let id = UploadId::from_string("abc-123");
        assert_eq!(source_key(&id), "uploads/abc-123.mp4");
        assert_eq!(output_key(&id), "outputs/abc-123_compressed.mp4");
    }

    #[test]
    fn test_disposition_plain_filename() {
        assert_eq!(
            attachment_disposition("holiday.mp4"),
            "attachment; filename=\"holiday.mp4\""
        );
    }

    #[test]
    fn test_disposition_strips_header_breakers() {
        assert_eq!(
            attachment_disposition("a\"b\\c\r\n.mp4"),
            "attachment; filename=\"abc.mp4\""
        );
    }

    #[test]
    fn test_disposition_empty_falls_back() {
        assert_eq!(
            attachment_disposition("  "),
            "attachment; filename=\"video.mp4\""
        );
        assert_eq!(
            attachment_disposition("\"\""),
            "attachment; filename=\"video.mp4\""
        );
    }
}
