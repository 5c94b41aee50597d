use crate::types::{AppError, Attachment, Result};
use base64::Engine;

/// Limits applied to uploaded images before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            allowed_mime_types: ["image/png", "image/jpeg", "image/webp", "image/gif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl UploadLimits {
    pub fn check(&self, attachment: &Attachment) -> Result<()> {
        if attachment.bytes.is_empty() {
            return Err(AppError::InvalidInput("Image payload is empty".to_string()));
        }
        if !self
            .allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&attachment.mime))
        {
            return Err(AppError::InvalidInput(format!(
                "Unsupported image type: {}",
                attachment.mime
            )));
        }
        if attachment.bytes.len() > self.max_image_bytes {
            return Err(AppError::InvalidInput(format!(
                "Image is {} bytes, the limit is {}",
                attachment.bytes.len(),
                self.max_image_bytes
            )));
        }
        Ok(())
    }
}

/// Decode a base64 image from a request body.
///
/// Accepts bare base64 or a `data:<mime>;base64,` URL. A MIME type given in
/// the data URL is used when `mime` is absent.
pub fn decode_attachment(
    image_base64: Option<&str>,
    mime: Option<&str>,
) -> Result<Option<Attachment>> {
    let Some(raw) = image_base64.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let (url_mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| AppError::InvalidInput("Malformed image data URL".to_string()))?;
            let url_mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(url_mime.to_string()), payload)
        }
        None => (None, raw),
    };

    let mime = mime
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_lowercase)
        .or(url_mime)
        .ok_or_else(|| AppError::InvalidInput("image_mime is required with an image".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AppError::InvalidInput(format!("Invalid base64 image: {}", e)))?;

    Ok(Some(Attachment { bytes, mime }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(len: usize) -> Attachment {
        Attachment {
            bytes: vec![1; len],
            mime: "image/png".to_string(),
        }
    }

    #[test]
    fn test_accepts_allowed_image() {
        assert!(UploadLimits::default().check(&png(10)).is_ok());
    }

    #[test]
    fn test_rejects_disallowed_mime() {
        let att = Attachment {
            bytes: vec![1],
            mime: "application/pdf".to_string(),
        };
        assert!(matches!(
            UploadLimits::default().check(&att),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_image() {
        let limits = UploadLimits {
            max_image_bytes: 4,
            ..UploadLimits::default()
        };
        assert!(limits.check(&png(4)).is_ok());
        assert!(matches!(limits.check(&png(5)), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_decode_bare_base64() {
        let att = decode_attachment(Some("AQID"), Some("image/PNG")).unwrap().unwrap();
        assert_eq!(att.bytes, vec![1, 2, 3]);
        assert_eq!(att.mime, "image/png");
    }

    #[test]
    fn test_decode_data_url() {
        let att = decode_attachment(Some("data:image/webp;base64,AQID"), None)
            .unwrap()
            .unwrap();
        assert_eq!(att.mime, "image/webp");
        assert_eq!(att.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_attachment(Some("not base64!!"), Some("image/png")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            decode_attachment(Some("AQID"), None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_absent_image() {
        assert!(decode_attachment(None, None).unwrap().is_none());
        assert!(decode_attachment(Some("  "), Some("image/png")).unwrap().is_none());
    }
}
